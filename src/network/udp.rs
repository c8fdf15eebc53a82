//! UDP transport
//!
//! Binds an ephemeral local socket, connects it to the target and forwards
//! queued datagrams. Datagrams coming back are reported as data events.

use crate::network::errors::{from_io_error, NetworkError};
use crate::network::event::{EventSender, InstanceStatus, TransportEvent};
use std::net::SocketAddr;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const UDP_BUFFER_LENGTH: usize = 64 * 1024;

pub struct UdpTransport {
    target: String,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl UdpTransport {
    /// Open a socket towards `host:port`. Must be called inside a tokio runtime.
    pub fn open(host: &str, port: u16, events: EventSender) -> Self {
        let target = format!("{}:{}", host, port);
        let (outgoing, queue) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(host.to_string(), port, events, queue, cancel.clone()));

        Self {
            target,
            outgoing,
            cancel,
            task: Some(task),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Queue a datagram. Sends issued before the socket is bound are
    /// delivered once it is.
    pub fn send(&self, data: Vec<u8>) {
        if self.outgoing.send(data).is_err() {
            tracing::debug!("UDP task for {} has exited, dropping send", self.target);
        }
    }

    pub fn destroy(self) {}

    /// Stop the socket task once queued datagrams are sent
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, NetworkError> {
    let mut addrs = lookup_host((host, port))
        .await
        .map_err(|e| NetworkError::DnsResolution {
            host: host.to_string(),
            reason: e.to_string(),
        })?;

    addrs.next().ok_or_else(|| NetworkError::DnsResolution {
        host: host.to_string(),
        reason: "no addresses found".to_string(),
    })
}

async fn bind(host: &str, port: u16) -> Result<UdpSocket, NetworkError> {
    let target = format!("{}:{}", host, port);
    let remote = resolve(host, port).await?;
    let local: SocketAddr = if remote.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };

    let socket = UdpSocket::bind(local)
        .await
        .map_err(|e| from_io_error(e, &target))?;
    socket
        .connect(remote)
        .await
        .map_err(|e| from_io_error(e, &target))?;
    Ok(socket)
}

async fn run(
    host: String,
    port: u16,
    events: EventSender,
    mut queue: mpsc::UnboundedReceiver<Vec<u8>>,
    cancel: CancellationToken,
) {
    let target = format!("{}:{}", host, port);
    let _ = events.send(TransportEvent::StatusChange(InstanceStatus::Connecting));

    let socket = tokio::select! {
        _ = cancel.cancelled() => return,
        res = bind(&host, port) => res,
    };

    let socket = match socket {
        Ok(socket) => socket,
        Err(err) => {
            tracing::debug!("UDP setup for {} failed ({} error): {}", target, err.category(), err);
            let _ = events.send(TransportEvent::Error(err.to_string()));
            return;
        }
    };

    let _ = events.send(TransportEvent::Listening);
    tracing::info!("UDP socket ready for {}", target);

    let mut buf = vec![0u8; UDP_BUFFER_LENGTH];
    loop {
        tokio::select! {
            biased;
            Some(data) = queue.recv() => {
                if let Err(e) = socket.send(&data).await {
                    let err = from_io_error(e, &target);
                    let _ = events.send(TransportEvent::Error(err.to_string()));
                }
            }
            _ = cancel.cancelled() => break,
            res = socket.recv(&mut buf) => match res {
                Ok(n) => {
                    let _ = events.send(TransportEvent::Data(buf[..n].to_vec()));
                }
                Err(e) => {
                    // ICMP port unreachable surfaces here; the socket stays usable
                    let err = from_io_error(e, &target);
                    let _ = events.send(TransportEvent::Error(err.to_string()));
                }
            }
        }
    }

    tracing::debug!("UDP socket for {} destroyed", target);
}
