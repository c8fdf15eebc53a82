//! Persistent TCP transport
//!
//! Owns one connection to the configured target. The socket lives in a
//! spawned task; sends are queued to that task and inbound data is reported
//! as [`TransportEvent::Data`]. There is no automatic reconnect.

use crate::network::errors::from_io_error;
use crate::network::event::{EventSender, InstanceStatus, TransportEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Read buffer size for inbound data
pub const TCP_BUFFER_LENGTH: usize = 8 * 1024;

pub struct TcpTransport {
    target: String,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TcpTransport {
    /// Start connecting to `host:port`. Must be called inside a tokio runtime.
    pub fn connect(host: &str, port: u16, events: EventSender) -> Self {
        let target = format!("{}:{}", host, port);
        let (outgoing, queue) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            host.to_string(),
            port,
            events,
            queue,
            connected.clone(),
            cancel.clone(),
        ));

        Self {
            target,
            outgoing,
            connected,
            cancel,
            task: Some(task),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Queue bytes for transmission. Fire and forget.
    pub fn send(&self, data: Vec<u8>) {
        if self.outgoing.send(data).is_err() {
            tracing::debug!("TCP task for {} has exited, dropping send", self.target);
        }
    }

    /// Close the connection and stop the socket task, discarding queued or
    /// partially written sends
    pub fn destroy(self) {
        // Drop does the work
    }

    /// Like [`destroy`](Self::destroy), but wait until queued sends are
    /// written and the socket is closed
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
        // a write blocked on a peer that stopped reading never sees the token
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.connected.store(false, Ordering::Release);
    }
}

async fn run(
    host: String,
    port: u16,
    events: EventSender,
    mut queue: mpsc::UnboundedReceiver<Vec<u8>>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let target = format!("{}:{}", host, port);
    let _ = events.send(TransportEvent::StatusChange(InstanceStatus::Connecting));

    let stream = tokio::select! {
        _ = cancel.cancelled() => return,
        res = TcpStream::connect((host.as_str(), port)) => res,
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let err = from_io_error(e, &target);
            tracing::debug!("TCP connect to {} failed ({} error): {}", target, err.category(), err);
            let _ = events.send(TransportEvent::Error(err.to_string()));
            return;
        }
    };

    connected.store(true, Ordering::Release);
    let _ = events.send(TransportEvent::Connect);
    tracing::info!("Connected to {}", target);

    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; TCP_BUFFER_LENGTH];

    loop {
        tokio::select! {
            biased;
            // queued sends are flushed before a destroy takes effect
            Some(data) = queue.recv() => {
                if let Err(e) = writer.write_all(&data).await {
                    let err = from_io_error(e, &target);
                    let _ = events.send(TransportEvent::Error(err.to_string()));
                    break;
                }
            }
            _ = cancel.cancelled() => {
                tracing::debug!("TCP connection to {} destroyed", target);
                break;
            }
            res = reader.read(&mut buf) => match res {
                Ok(0) => {
                    tracing::info!("Connection closed by {}", target);
                    let _ = events.send(TransportEvent::StatusChange(InstanceStatus::Disconnected));
                    break;
                }
                Ok(n) => {
                    let _ = events.send(TransportEvent::Data(buf[..n].to_vec()));
                }
                Err(e) => {
                    let err = from_io_error(e, &target);
                    let _ = events.send(TransportEvent::Error(err.to_string()));
                    break;
                }
            }
        }
    }

    connected.store(false, Ordering::Release);
    let _ = writer.shutdown().await;
}
