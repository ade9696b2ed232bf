//! Ordered, CRC-checked binary frame transport over a single TCP connection.
//!
//! seqwire is the transport layer of a binary-protocol client: it keeps one
//! outbound socket to a configurable endpoint, serializes concurrent sends
//! into an ordered, sequenced frame stream, and decodes inbound bytes into
//! checksum-verified frames.
//!
//! # Crate Structure
//!
//! - [`transport`]: Lazily (re)connecting connection management
//! - [`frame`]: Length-prefixed, sequenced, CRC-32 framing
//! - [`client`]: The ordered send / receive surface

/// Re-export transport types.
pub mod transport {
    pub use seqwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use seqwire_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use seqwire_client::*;
}

pub use seqwire_client::{ClientConfig, ClientError, FramedTransport, SendError, SendReceipt};
pub use seqwire_transport::{Endpoint, EndpointSource, Session};
