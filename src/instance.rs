//! Instance state: one configured target and its transport
//!
//! An [`Instance`] owns at most one transport handle at a time. It is driven
//! from a single task: transport events are queued and applied one by one
//! through [`Instance::handle_event`], and user actions go through
//! [`Instance::run_action`].

use crate::actions::SendAction;
use crate::config::{ModuleConfig, Protocol, ResponseConversion};
use crate::network::payload::to_hex;
use crate::network::{
    event_channel, EventReceiver, EventSender, InstanceStatus, NetworkError, OnDemandSender,
    TcpTransport, TransportEvent, UdpTransport,
};
use crate::variables::{VariableDefinition, VariableStore, VariableValue};
use tokio::task::JoinHandle;

/// Name of the variable holding the last TCP response
pub const RESPONSE_VARIABLE: &str = "tcp_response";

/// What happened to a send request
#[derive(Debug)]
pub enum SendOutcome {
    /// Bytes handed to the transport
    Sent(usize),
    /// The command decoded to nothing, nothing was sent
    Empty,
    /// No usable transport, the command was dropped
    Dropped,
    /// An on-demand send is in flight
    Pending(PendingSend),
}

/// Handle to an in-flight on-demand send
#[derive(Debug)]
pub struct PendingSend {
    target: String,
    handle: JoinHandle<Result<Option<Vec<u8>>, NetworkError>>,
}

impl PendingSend {
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Wait for the send to resolve with the response, or reject
    pub async fn wait(self) -> Result<Option<Vec<u8>>, NetworkError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(NetworkError::Other(format!("on-demand send aborted: {}", e))),
        }
    }
}

pub struct Instance {
    label: String,
    config: ModuleConfig,
    status: InstanceStatus,
    tcp: Option<TcpTransport>,
    udp: Option<UdpTransport>,
    events_tx: EventSender,
    events: EventReceiver,
    variables: VariableStore,
}

impl Instance {
    pub fn new(label: impl Into<String>, config: ModuleConfig) -> Self {
        let (events_tx, events) = event_channel();
        Self {
            label: label.into(),
            config,
            status: InstanceStatus::Disconnected,
            tcp: None,
            udp: None,
            events_tx,
            events,
            variables: VariableStore::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn status(&self) -> &InstanceStatus {
        &self.status
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.variables
    }

    /// Last saved TCP response, if any
    pub fn response(&self) -> Option<&VariableValue> {
        self.variables.get(&self.label, RESPONSE_VARIABLE)
    }

    pub fn has_tcp(&self) -> bool {
        self.tcp.is_some()
    }

    pub fn has_udp(&self) -> bool {
        self.udp.is_some()
    }

    pub fn is_connected(&self) -> bool {
        match self.config.protocol {
            _ if self.config.uses_on_demand() => self.status.is_ok(),
            Protocol::Tcp => self.tcp.as_ref().is_some_and(|t| t.is_connected()),
            Protocol::Udp => self.udp.is_some() && self.status.is_ok(),
        }
    }

    /// Create the transport for the current configuration
    pub fn start(&mut self) {
        self.destroy_handles();

        // Fresh queue: events from destroyed handles are never seen
        let (events_tx, events) = event_channel();
        self.events_tx = events_tx;
        self.events = events;

        self.define_variables();
        self.set_status(InstanceStatus::Connecting);

        let port = match self.config.validate().and_then(|_| self.config.port_u16()) {
            Ok(port) => port,
            Err(e) => {
                tracing::warn!("Not connecting: {}", e);
                self.set_status(InstanceStatus::BadConfig(e.to_string()));
                return;
            }
        };
        let host = self.config.host.trim().to_string();

        match self.config.protocol {
            _ if self.config.uses_on_demand() => {
                tracing::debug!("On-demand mode, no persistent connection to {}:{}", host, port);
                self.set_status(InstanceStatus::Ok);
            }
            Protocol::Tcp => {
                self.tcp = Some(TcpTransport::connect(&host, port, self.events_tx.clone()));
            }
            Protocol::Udp => {
                self.udp = Some(UdpTransport::open(&host, port, self.events_tx.clone()));
            }
        }
    }

    /// Replace the configuration and recreate the transport.
    ///
    /// Existing handles are always destroyed, even if nothing changed.
    pub fn reconfigure(&mut self, config: ModuleConfig) {
        self.destroy_handles();
        self.config = config;
        self.start();
    }

    pub fn stop(&mut self) {
        self.destroy_handles();
        self.set_status(InstanceStatus::Disconnected);
        tracing::debug!("Instance {} stopped", self.label);
    }

    /// Stop, waiting for queued sends to go out first
    pub async fn shutdown(&mut self) {
        if let Some(udp) = self.udp.take() {
            udp.close().await;
        }
        if let Some(tcp) = self.tcp.take() {
            tcp.close().await;
        }
        self.set_status(InstanceStatus::Disconnected);
    }

    fn destroy_handles(&mut self) {
        if let Some(udp) = self.udp.take() {
            tracing::debug!("Destroying UDP socket for {}", udp.target());
            udp.destroy();
        }
        if let Some(tcp) = self.tcp.take() {
            tracing::debug!("Destroying TCP connection to {}", tcp.target());
            tcp.destroy();
        }
    }

    fn define_variables(&mut self) {
        let mut definitions = Vec::new();
        if self.config.saves_tcp_response() {
            definitions.push(VariableDefinition {
                name: RESPONSE_VARIABLE,
                description: "Last TCP Response",
            });
        }
        self.variables.set_definitions(&self.label, definitions);
    }

    fn set_status(&mut self, status: InstanceStatus) {
        if self.status != status {
            tracing::info!("[{}] status: {}", self.label, status);
            self.status = status;
        }
    }

    /// Wait for the next transport event
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }

    /// Apply one transport event to the instance state
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connect => {
                tracing::debug!("Connected");
                self.set_status(InstanceStatus::Ok);
            }
            TransportEvent::Listening => self.set_status(InstanceStatus::Ok),
            TransportEvent::StatusChange(status) => self.set_status(status),
            TransportEvent::Error(message) => {
                tracing::error!("Network error: {}", message);
                self.set_status(InstanceStatus::ConnectionFailure(message));
            }
            TransportEvent::Data(data) => match self.config.protocol {
                // If we get data, things should be good
                Protocol::Udp => self.set_status(InstanceStatus::Ok),
                Protocol::Tcp => {
                    if self.config.saves_tcp_response() {
                        let value = convert_response(&data, self.config.convert_response);
                        self.variables.set(&self.label, RESPONSE_VARIABLE, value);
                    }
                }
            },
        }
    }

    /// Substitute variables, build the payload and dispatch it
    pub fn run_action(&mut self, action: &SendAction) -> SendOutcome {
        let command = self.variables.parse(action.command());
        let Some(buf) = action.build(&command) else {
            tracing::debug!("Empty command, nothing to send");
            return SendOutcome::Empty;
        };

        match action {
            SendAction::Send { .. } => tracing::debug!(
                "sending to {}: {}",
                self.config.host,
                String::from_utf8_lossy(&buf)
            ),
            SendAction::SendHex { .. } => {
                tracing::debug!("sending to {}: {}", self.config.host, to_hex(&buf))
            }
        }

        match self.config.protocol {
            _ if self.config.uses_on_demand() => self.send_on_demand(buf),
            Protocol::Tcp => match &self.tcp {
                Some(tcp) if tcp.is_connected() => {
                    let len = buf.len();
                    tcp.send(buf);
                    SendOutcome::Sent(len)
                }
                _ => {
                    tracing::debug!("Socket not connected :(");
                    SendOutcome::Dropped
                }
            },
            Protocol::Udp => match &self.udp {
                Some(udp) => {
                    let len = buf.len();
                    udp.send(buf);
                    SendOutcome::Sent(len)
                }
                None => {
                    tracing::debug!("No UDP socket, dropping command");
                    SendOutcome::Dropped
                }
            },
        }
    }

    fn send_on_demand(&mut self, buf: Vec<u8>) -> SendOutcome {
        let port = match self.config.validate().and_then(|_| self.config.port_u16()) {
            Ok(port) => port,
            Err(e) => {
                let err = NetworkError::from(e);
                tracing::warn!("Dropping on-demand send ({} error): {}", err.category(), err);
                return SendOutcome::Dropped;
            }
        };

        let sender = OnDemandSender::new(self.config.host.trim(), port);
        let target = sender.target();
        let events = self.events_tx.clone();

        let handle = tokio::spawn(async move {
            let result = sender.send(&buf).await;
            match &result {
                Ok(response) => {
                    let _ = events.send(TransportEvent::StatusChange(InstanceStatus::Ok));
                    if let Some(data) = response {
                        let _ = events.send(TransportEvent::Data(data.clone()));
                    }
                }
                Err(e) => {
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                }
            }
            result
        });

        SendOutcome::Pending(PendingSend { target, handle })
    }
}

/// Convert a received response per the configured format
pub fn convert_response(data: &[u8], conversion: ResponseConversion) -> VariableValue {
    match conversion {
        ResponseConversion::None => VariableValue::Bytes(data.to_vec()),
        ResponseConversion::Hex => VariableValue::Text(to_hex(data)),
        ResponseConversion::String => VariableValue::Text(String::from_utf8_lossy(data).into_owned()),
    }
}
