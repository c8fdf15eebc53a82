//! Transport lifecycle events
//!
//! Transport tasks push events into an unbounded queue owned by the
//! instance, which drains it one event at a time.

use std::fmt;
use tokio::sync::mpsc;

/// Connection status reported to the user
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InstanceStatus {
    Ok,
    Connecting,
    #[default]
    Disconnected,
    ConnectionFailure(String),
    BadConfig(String),
}

impl InstanceStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, InstanceStatus::Ok)
    }

    pub fn name(&self) -> &'static str {
        match self {
            InstanceStatus::Ok => "ok",
            InstanceStatus::Connecting => "connecting",
            InstanceStatus::Disconnected => "disconnected",
            InstanceStatus::ConnectionFailure(_) => "connection_failure",
            InstanceStatus::BadConfig(_) => "bad_config",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::ConnectionFailure(msg) | InstanceStatus::BadConfig(msg) => {
                write!(f, "{}: {}", self.name(), msg)
            }
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// Events emitted by the TCP and UDP transports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// TCP connection established
    Connect,
    /// UDP socket bound and ready
    Listening,
    Error(String),
    StatusChange(InstanceStatus),
    /// Bytes received from the peer
    Data(Vec<u8>),
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(InstanceStatus::Ok.to_string(), "ok");
        assert_eq!(
            InstanceStatus::BadConfig("Missing host".into()).to_string(),
            "bad_config: Missing host"
        );
        assert_eq!(InstanceStatus::default(), InstanceStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_event_channel_order() {
        let (tx, mut rx) = event_channel();
        tx.send(TransportEvent::Connect).unwrap();
        tx.send(TransportEvent::Data(vec![1, 2])).unwrap();

        assert_eq!(rx.recv().await, Some(TransportEvent::Connect));
        assert_eq!(rx.recv().await, Some(TransportEvent::Data(vec![1, 2])));
    }
}
