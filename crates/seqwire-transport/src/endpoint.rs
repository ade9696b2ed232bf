//! Server endpoint and the source it is read from.

use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// A `(host, port)` pair identifying the server.
///
/// Endpoints compare by exact host string and port; `"localhost"` and
/// `"127.0.0.1"` are different endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<std::net::SocketAddr> for Endpoint {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

/// Supplies the endpoint the connection should target.
///
/// Re-read on every connect check, so a change takes effect on the next
/// read or write.
pub trait EndpointSource: Send + Sync {
    fn endpoint(&self) -> Endpoint;
}

impl<F> EndpointSource for F
where
    F: Fn() -> Endpoint + Send + Sync,
{
    fn endpoint(&self) -> Endpoint {
        self()
    }
}

/// Thread-safe, updatable endpoint holder.
#[derive(Debug)]
pub struct Session {
    endpoint: RwLock<Endpoint>,
}

impl Session {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint: RwLock::new(endpoint),
        }
    }

    /// Point subsequent connections at a new endpoint.
    pub fn set_endpoint(&self, endpoint: Endpoint) {
        let mut current = match self.endpoint.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = endpoint;
    }
}

impl EndpointSource for Session {
    fn endpoint(&self) -> Endpoint {
        match self.endpoint.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_host_and_port() {
        assert_eq!(Endpoint::new("example.org", 443).to_string(), "example.org:443");
        assert_eq!(Endpoint::new("::1", 80).to_string(), "[::1]:80");
    }

    #[test]
    fn equality_is_exact() {
        assert_eq!(Endpoint::new("10.0.0.1", 443), Endpoint::new("10.0.0.1", 443));
        assert_ne!(Endpoint::new("10.0.0.1", 443), Endpoint::new("10.0.0.1", 80));
        assert_ne!(Endpoint::new("localhost", 80), Endpoint::new("127.0.0.1", 80));
    }

    #[test]
    fn session_update_is_visible() {
        let session = Session::new(Endpoint::new("a", 1));
        assert_eq!(session.endpoint(), Endpoint::new("a", 1));

        session.set_endpoint(Endpoint::new("b", 2));
        assert_eq!(session.endpoint(), Endpoint::new("b", 2));
    }

    #[test]
    fn closure_source() {
        let source = || Endpoint::new("fixed", 9);
        assert_eq!(EndpointSource::endpoint(&source), Endpoint::new("fixed", 9));
    }

    #[test]
    fn endpoint_from_session_store_json() {
        let endpoint: Endpoint =
            serde_json::from_str(r#"{"host":"149.154.167.50","port":443}"#).unwrap();
        assert_eq!(endpoint, Endpoint::new("149.154.167.50", 443));
    }
}
