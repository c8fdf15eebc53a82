//! bytecast library
//!
//! Builds raw command payloads and sends them to one configured target over
//! TCP or UDP, tracking connection status and the last TCP response.

pub mod actions;
pub mod app;
pub mod cli;
pub mod config;
pub mod instance;
pub mod logging;
pub mod network;
pub mod shell;
pub mod variables;

// Re-export commonly used types
pub use actions::SendAction;
pub use cli::Args;
pub use config::{ModuleConfig, Protocol, ResponseConversion};
pub use instance::{Instance, SendOutcome};
