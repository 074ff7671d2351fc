//! Error types for the poller.
//!
//! Configuration problems are fatal and reported once before any network
//! activity. Everything that can go wrong while talking to a device is
//! recoverable: the cycle fails, the session is dropped and the next poll
//! starts over from `Disconnected`.

use std::time::Duration;

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PollerError>;

/// Failure to turn a configured node into a protocol address.
///
/// Stored per node at resolution time and only raised when the node is
/// actually registered with the device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid node id '{node_id}': {reason}")]
pub struct AddressError {
    /// The offending `ns=..;x=..` string.
    pub node_id: String,
    /// Why it could not be parsed.
    pub reason: String,
}

impl AddressError {
    pub(crate) fn new(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }
}

/// Main error type.
#[derive(Debug, Error)]
pub enum PollerError {
    /// Invalid configuration (empty names, bad enums, duplicate fields, bad endpoint).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A node's protocol address could not be parsed.
    #[error("Address error for field '{field}': {source}")]
    Address {
        /// Configured field name of the node.
        field: String,
        #[source]
        source: AddressError,
    },

    /// Opening the session failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Connect, register or read exceeded its deadline.
    #[error("{operation} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// Configured deadline.
        timeout: Duration,
    },

    /// The device rejected node registration.
    #[error("RegisterNodes failed: {0}")]
    Registration(String),

    /// The batched read request failed as a whole.
    #[error("Read failed: {0}")]
    Read(String),

    /// An operation needing a live session was called without one.
    #[error("Not connected")]
    NotConnected,

    /// The device answered with something that breaks the protocol contract.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O failure (config files, sinks).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PollerError {
    /// Whether the next poll cycle may succeed without changing configuration.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::Address { .. })
    }

    /// Whether this is a timeout-classed failure.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub(crate) fn timeout(operation: &'static str, timeout: Duration) -> Self {
        Self::Timeout { operation, timeout }
    }
}

impl From<toml::de::Error> for PollerError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(!PollerError::Config("x".into()).is_recoverable());
        assert!(!PollerError::Address {
            field: "f".into(),
            source: AddressError::new("ns=0;i=x", "bad"),
        }
        .is_recoverable());
        assert!(PollerError::Connection("refused".into()).is_recoverable());
        assert!(PollerError::Read("closed".into()).is_recoverable());
        assert!(PollerError::timeout("read", Duration::from_secs(5)).is_recoverable());
    }

    #[test]
    fn test_timeout_display() {
        let err = PollerError::timeout("connect", Duration::from_millis(1500));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "connect timed out after 1500ms");
    }
}
