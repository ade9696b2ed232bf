//! Lazily (re)connecting TCP connection management.
//!
//! This is the lowest layer of seqwire. A [`ConnectionManager`] owns at most
//! one outbound socket to the endpoint supplied by an [`EndpointSource`]:
//! - the socket is opened on first use
//! - a connection that died or whose endpoint changed is replaced
//! - reads and writes honor the deadlines in [`TransportConfig`]
//!
//! Everything else builds on the [`Connection`] and [`ConnectionReader`]
//! types provided here.

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod manager;

pub use connection::{Connection, ConnectionId, ConnectionReader};
pub use endpoint::{Endpoint, EndpointSource, Session};
pub use error::{ConnectionError, Result};
pub use manager::{ConnectionManager, TransportConfig};
