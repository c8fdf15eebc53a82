//! Application state management for bytecast
//!
//! Wires the command line into an [`Instance`] and runs one-shot sends.

use crate::actions::{action_definitions, SendAction};
use crate::cli::{parse_var, Args};
use crate::config::{config_fields, ModuleConfig};
use crate::instance::{Instance, SendOutcome, RESPONSE_VARIABLE};
use crate::network::on_demand::RESPONSE_LINGER;
use crate::network::payload::to_hex;
use crate::network::{ErrorContext, InstanceStatus};
use crate::variables::VariableValue;
use anyhow::{bail, Context, Result};
use std::time::{Duration, Instant};

pub struct App {
    pub args: Args,
    pub instance: Instance,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let base = match &args.config {
            Some(path) => ModuleConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ModuleConfig::default(),
        };
        let config = args.apply_overrides(base);
        let mut instance = Instance::new(args.label.clone(), config);

        for entry in &args.vars {
            let Some((label, name, value)) = parse_var(entry) else {
                bail!("Invalid --var '{}', expected label:name=value", entry);
            };
            instance
                .variables_mut()
                .set(label, name, VariableValue::Text(value.to_string()));
        }

        Ok(Self { args, instance })
    }

    /// JSON description of the configuration form and the actions, with the
    /// ids of the fields shown for the current configuration
    pub fn describe(&self) -> Result<String> {
        let fields = config_fields();
        let visible: Vec<&str> = fields
            .iter()
            .filter(|f| f.is_visible(self.instance.config()))
            .map(|f| f.id)
            .collect();
        let doc = serde_json::json!({
            "config": fields,
            "visible": visible,
            "actions": action_definitions(),
        });
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Start the instance, send one command and report the response
    pub async fn run_once(&mut self, action: SendAction) -> Result<()> {
        let config = self.instance.config();
        if let Err(e) = config.validate() {
            let target = format!("{}:{}", config.host, config.port);
            return Err(ErrorContext::new(e.into(), "configure", target).into());
        }

        self.instance.start();
        if let InstanceStatus::BadConfig(reason) = self.instance.status() {
            bail!("Bad config: {}", reason);
        }

        self.wait_connected(Duration::from_millis(self.args.timeout))
            .await?;

        let started = Instant::now();
        match self.instance.run_action(&action) {
            SendOutcome::Empty => println!("Nothing to send"),
            SendOutcome::Dropped => bail!("Not connected, command dropped"),
            SendOutcome::Sent(len) => {
                println!("Sent {} bytes", len);
                if self.instance.config().saves_tcp_response() {
                    self.collect_events(RESPONSE_LINGER).await;
                    self.print_response();
                }
            }
            SendOutcome::Pending(pending) => {
                let target = pending.target().to_string();
                match pending.wait().await {
                    Ok(response) => {
                        self.drain_events();
                        match response {
                            Some(data) => println!("Sent, {} bytes back", data.len()),
                            None => println!("Sent, no response"),
                        }
                        if self.instance.config().saves_tcp_response() {
                            self.print_response();
                        }
                    }
                    Err(e) => {
                        self.drain_events();
                        let ctx = ErrorContext::new(e, "on-demand send", target)
                            .with_duration(started.elapsed());
                        return Err(ctx.into());
                    }
                }
            }
        }

        self.instance.shutdown().await;
        Ok(())
    }

    async fn wait_connected(&mut self, limit: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + limit;

        while !self.instance.is_connected() {
            let event = match tokio::time::timeout_at(deadline, self.instance.next_event()).await {
                Ok(Some(event)) => event,
                Ok(None) => bail!("Event queue closed"),
                Err(_) => bail!("Timed out after {:?} waiting for connection", limit),
            };
            self.instance.handle_event(event);

            if let InstanceStatus::ConnectionFailure(reason) = self.instance.status() {
                bail!("Connection failed: {}", reason);
            }
        }
        Ok(())
    }

    async fn collect_events(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        while let Ok(Some(event)) =
            tokio::time::timeout_at(deadline, self.instance.next_event()).await
        {
            self.instance.handle_event(event);
        }
    }

    fn drain_events(&mut self) {
        while let Some(event) = self.instance.try_next_event() {
            self.instance.handle_event(event);
        }
    }

    fn print_response(&self) {
        match self.instance.response() {
            Some(value) => println!("{} = {}", RESPONSE_VARIABLE, display_value(value)),
            None => println!("{} is empty", RESPONSE_VARIABLE),
        }
    }
}

/// Printable form of a variable; raw bytes are shown as hex
pub fn display_value(value: &VariableValue) -> String {
    match value {
        VariableValue::Text(text) => text.clone(),
        VariableValue::Bytes(bytes) => format!("<{}>", to_hex(bytes)),
    }
}
