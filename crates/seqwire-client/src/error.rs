use seqwire_frame::FrameError;
use seqwire_transport::ConnectionError;

/// Why one queued payload was not written.
///
/// Delivered only to that payload's [`SendReceipt`](crate::SendReceipt);
/// other queued payloads are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Connecting or writing failed.
    #[error("send failed: {0}")]
    Connection(#[from] ConnectionError),

    /// The payload could not be framed.
    #[error("send failed: {0}")]
    Frame(#[from] FrameError),

    /// The transport shut down before the payload was written.
    #[error("transport shut down before the payload was sent")]
    Shutdown,
}

/// Errors surfaced by receive and other transport operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection-level error.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The transport has been disposed.
    #[error("transport shut down")]
    Shutdown,
}

impl ClientError {
    /// Whether the read side may no longer sit on a frame boundary.
    ///
    /// After such an error the caller should reconnect, e.g. with
    /// [`FramedTransport::reset_connection`](crate::FramedTransport::reset_connection).
    /// Connect failures and shutdown leave nothing misaligned.
    pub fn requires_reconnect(&self) -> bool {
        match self {
            ClientError::Frame(_) => true,
            ClientError::Connection(ConnectionError::Connect { .. })
            | ClientError::Connection(ConnectionError::Disposed)
            | ClientError::Shutdown => false,
            ClientError::Connection(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
