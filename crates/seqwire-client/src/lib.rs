//! Ordered, sequenced frame transport over a single TCP connection.
//!
//! This is the layer callers talk to. [`FramedTransport::send`] queues an
//! opaque payload and returns a [`SendReceipt`]; one dispatcher task frames
//! and writes queued payloads strictly in the order they were accepted.
//! [`FramedTransport::receive`] reads one checksum-verified frame.
//!
//! Failures stay local to the operation that hit them and come back as
//! distinguishable [`SendError`] / [`ClientError`] values. Nothing is
//! retried here.

pub mod config;
mod dispatcher;
pub mod error;
mod request;
pub mod transport;

pub use config::ClientConfig;
pub use error::{ClientError, Result, SendError};
pub use request::SendReceipt;
pub use transport::FramedTransport;
