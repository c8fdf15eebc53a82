//! Network error types with context and categories
//!
//! Every transport failure is reported through [`NetworkError`]. Failures on
//! the persistent transports only degrade the instance status; on-demand
//! sends surface them to the caller.

use crate::config::ConfigError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error categories for classification and status reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network connectivity issues
    Network,
    /// DNS resolution failures
    Dns,
    /// Connection establishment failures
    Connection,
    /// Timeout errors
    Timeout,
    /// Input validation errors
    Validation,
    /// Internal errors (bugs, unexpected states)
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Network => write!(f, "Network"),
            ErrorCategory::Dns => write!(f, "DNS"),
            ErrorCategory::Connection => write!(f, "Connection"),
            ErrorCategory::Timeout => write!(f, "Timeout"),
            ErrorCategory::Validation => write!(f, "Validation"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("DNS resolution failed for '{host}': {reason}")]
    DnsResolution { host: String, reason: String },

    #[error("Connection refused by {target}")]
    ConnectionRefused { target: String },

    #[error("Connection timeout to {target} after {elapsed:?}")]
    ConnectionTimeout { target: String, elapsed: Duration },

    #[error("Connection reset by {target}")]
    ConnectionReset { target: String },

    #[error("Host unreachable: {target}")]
    HostUnreachable { target: String },

    #[error("Not connected to {target}")]
    NotConnected { target: String },

    #[error("Invalid target: {message}")]
    InvalidTarget { message: String },

    #[error("Invalid port: {port}")]
    InvalidPort { port: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl NetworkError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            NetworkError::DnsResolution { .. } => ErrorCategory::Dns,
            NetworkError::ConnectionRefused { .. }
            | NetworkError::ConnectionReset { .. }
            | NetworkError::HostUnreachable { .. }
            | NetworkError::NotConnected { .. } => ErrorCategory::Connection,
            NetworkError::ConnectionTimeout { .. } => ErrorCategory::Timeout,
            NetworkError::InvalidTarget { .. } | NetworkError::InvalidPort { .. } => {
                ErrorCategory::Validation
            }
            NetworkError::Io(e) => match e.kind() {
                std::io::ErrorKind::TimedOut => ErrorCategory::Timeout,
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::NotConnected => ErrorCategory::Connection,
                _ => ErrorCategory::Network,
            },
            NetworkError::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error
    pub fn suggestion(&self) -> String {
        match self {
            NetworkError::DnsResolution { host, .. } => {
                format!(
                    "Check if '{}' is spelled correctly. Try using an IP address instead.",
                    host
                )
            }
            NetworkError::ConnectionRefused { target } => {
                format!(
                    "No service is listening on {}. Verify the port and that the device is on.",
                    target
                )
            }
            NetworkError::ConnectionTimeout { .. } => {
                "The device did not answer in time. It may be offline or behind a firewall.".to_string()
            }
            NetworkError::HostUnreachable { .. } => {
                "The host cannot be reached. Check cabling and routing.".to_string()
            }
            NetworkError::NotConnected { .. } => {
                "Wait for the connection to come up, or enable on-demand connections.".to_string()
            }
            NetworkError::InvalidTarget { message } => {
                format!("Fix the target configuration: {}", message)
            }
            NetworkError::InvalidPort { .. } => "Use a port between 1 and 65535.".to_string(),
            _ => "Check network connectivity and target availability.".to_string(),
        }
    }

    /// Get an error code for programmatic handling (curl-compatible values)
    pub fn code(&self) -> i32 {
        match self {
            NetworkError::DnsResolution { .. } => 6,      // CURLE_COULDNT_RESOLVE_HOST
            NetworkError::ConnectionRefused { .. } => 7,  // CURLE_COULDNT_CONNECT
            NetworkError::ConnectionTimeout { .. } => 28, // CURLE_OPERATION_TIMEDOUT
            NetworkError::ConnectionReset { .. } => 56,   // CURLE_RECV_ERROR
            NetworkError::HostUnreachable { .. } => 7,
            NetworkError::NotConnected { .. } => 55, // CURLE_SEND_ERROR
            NetworkError::InvalidTarget { .. } => 3, // CURLE_URL_MALFORMAT
            NetworkError::InvalidPort { .. } => 3,
            NetworkError::Io(_) => 1,
            NetworkError::Other(_) => 1,
        }
    }
}

impl From<ConfigError> for NetworkError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidPort(port) => NetworkError::InvalidPort {
                port: port.to_string(),
            },
            ConfigError::MissingHost | ConfigError::InvalidHost(_) => NetworkError::InvalidTarget {
                message: e.to_string(),
            },
            other => NetworkError::Other(other.to_string()),
        }
    }
}

/// Error context wrapper for reporting a failed operation
#[derive(Debug)]
pub struct ErrorContext {
    pub error: NetworkError,
    /// Operation being performed
    pub operation: String,
    /// Target address or identifier
    pub target: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// How long the operation took before failing
    pub duration: Duration,
}

impl ErrorContext {
    pub fn new(error: NetworkError, operation: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            error,
            operation: operation.into(),
            target: target.into(),
            timestamp: chrono::Utc::now(),
            duration: Duration::ZERO,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.error.category()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} error: {} failed for {} after {:?}",
            self.timestamp.format("%H:%M:%S"),
            self.category(),
            self.operation,
            self.target,
            self.duration
        )?;
        write!(f, "\nError: {}", self.error)?;
        write!(f, "\nSuggestion: {}", self.error.suggestion())
    }
}

impl std::error::Error for ErrorContext {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Convert std::io::Error to NetworkError with the target attached
pub fn from_io_error(e: std::io::Error, target: &str) -> NetworkError {
    let target = target.to_string();
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => NetworkError::ConnectionRefused { target },
        std::io::ErrorKind::ConnectionReset => NetworkError::ConnectionReset { target },
        std::io::ErrorKind::TimedOut => NetworkError::ConnectionTimeout {
            target,
            elapsed: Duration::ZERO,
        },
        std::io::ErrorKind::NotConnected => NetworkError::NotConnected { target },
        _ => match e.raw_os_error() {
            // EHOSTUNREACH / ENETUNREACH
            Some(113) | Some(101) => NetworkError::HostUnreachable { target },
            _ => NetworkError::Io(e),
        },
    }
}
