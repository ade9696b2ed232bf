use std::time::Duration;

use crate::endpoint::Endpoint;

/// Errors that can occur while connecting to or talking over the socket.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Failed to connect to the configured endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        source: std::io::Error,
    },

    /// An I/O error occurred on the socket.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A connect, read or write did not finish before its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The connection was observed dead and can no longer be used.
    #[error("connection closed")]
    Closed,

    /// The connection manager has been disposed.
    #[error("connection manager disposed")]
    Disposed,
}

impl ConnectionError {
    /// Returns true if this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ConnectionError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, ConnectionError>;
