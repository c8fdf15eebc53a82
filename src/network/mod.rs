//! Network module for building and sending raw command bytes
//!
//! - Payload building from literal or hex command text
//! - Persistent TCP and UDP transports reporting lifecycle events
//! - One-shot on-demand TCP sends with a bounded connect timeout
//! - Error types with categories and curl-style codes

pub mod errors;
pub mod event;
pub mod on_demand;
pub mod payload;
pub mod tcp;
pub mod udp;

// Re-export commonly used types
pub use errors::{ErrorCategory, ErrorContext, NetworkError};
pub use event::{event_channel, EventReceiver, EventSender, InstanceStatus, TransportEvent};
pub use on_demand::OnDemandSender;
pub use payload::Terminator;
pub use tcp::TcpTransport;
pub use udp::UdpTransport;
