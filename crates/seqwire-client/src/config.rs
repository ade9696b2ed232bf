use seqwire_frame::FrameConfig;
use seqwire_transport::TransportConfig;

/// Configuration for a [`FramedTransport`](crate::FramedTransport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Connection deadlines and socket options.
    pub transport: TransportConfig,
    /// Frame size limits for both directions.
    pub frame: FrameConfig,
    /// Restart outgoing sequence numbers at 0 on every new connection.
    /// When false, one counter runs for the transport's whole lifetime.
    pub reset_sequence_on_reconnect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            frame: FrameConfig::default(),
            reset_sequence_on_reconnect: true,
        }
    }
}
