use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::connection::{Connection, ConnectionId, ConnectionReader};
use crate::endpoint::{Endpoint, EndpointSource};
use crate::error::{ConnectionError, Result};

/// Deadlines and socket options for the managed connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Deadline for the TCP handshake. Default: 10 seconds.
    pub connect_timeout: Option<Duration>,
    /// Deadline for reading one complete frame. Default: none.
    pub read_timeout: Option<Duration>,
    /// Deadline for writing one complete frame. Default: 30 seconds.
    pub write_timeout: Option<Duration>,
    /// Disable Nagle's algorithm. Default: true.
    pub nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(10)),
            read_timeout: None,
            write_timeout: Some(Duration::from_secs(30)),
            nodelay: true,
        }
    }
}

#[derive(Debug, Default)]
struct ManagerState {
    current: Option<Arc<Connection>>,
    disposed: bool,
}

/// Owns the single outbound connection and hides (re)connect logic.
///
/// The socket is opened lazily on first use. Every use re-reads the
/// endpoint source; a connection that died or whose endpoint no longer
/// matches is discarded and replaced, never reused. All connect and
/// discard transitions happen under one async mutex, so concurrent callers
/// never open duplicate sockets.
pub struct ConnectionManager {
    source: Arc<dyn EndpointSource>,
    config: TransportConfig,
    state: Mutex<ManagerState>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    pub fn new(source: Arc<dyn EndpointSource>, config: TransportConfig) -> Self {
        Self {
            source,
            config,
            state: Mutex::new(ManagerState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// The endpoint the next connect check will target.
    pub fn endpoint(&self) -> Endpoint {
        self.source.endpoint()
    }

    /// Ensure a live, correctly addressed connection and return it.
    pub async fn connection(&self) -> Result<Arc<Connection>> {
        let mut state = self.state.lock().await;

        if state.disposed {
            return Err(ConnectionError::Disposed);
        }
        // Read under the lock: a caller that queued behind a reconnect must
        // not act on the endpoint it saw before waiting.
        let endpoint = self.source.endpoint();

        if let Some(conn) = state.current.take() {
            match conn.stale_reason(&endpoint) {
                None => {
                    state.current = Some(Arc::clone(&conn));
                    return Ok(conn);
                }
                Some(reason) => {
                    info!(
                        connection = %conn.id(),
                        old = %conn.endpoint(),
                        new = %endpoint,
                        reason,
                        "discarding connection"
                    );
                    conn.close().await;
                }
            }
        }

        let conn = Arc::new(self.open(endpoint).await?);
        state.current = Some(Arc::clone(&conn));
        Ok(conn)
    }

    /// Ensure a connection and take exclusive access to its read half.
    pub async fn reader(&self) -> Result<ConnectionReader> {
        let conn = self.connection().await?;
        conn.reader().await
    }

    /// Ensure a connection and write all bytes to it.
    pub async fn write(&self, bytes: &[u8]) -> Result<()> {
        let conn = self.connection().await?;
        conn.write_all(bytes).await
    }

    /// Id of the current connection, if one is open.
    pub async fn connection_id(&self) -> Option<ConnectionId> {
        self.state.lock().await.current.as_ref().map(|conn| conn.id())
    }

    /// Drop the current connection; the next use reconnects.
    pub async fn discard(&self) {
        let stale = self.state.lock().await.current.take();
        if let Some(conn) = stale {
            debug!(connection = %conn.id(), "discarding connection on request");
            conn.close().await;
        }
    }

    /// Release the socket and refuse further use. Idempotent.
    pub async fn dispose(&self) {
        let mut state = self.state.lock().await;
        if state.disposed {
            return;
        }
        state.disposed = true;
        if let Some(conn) = state.current.take() {
            conn.close().await;
        }
        debug!("connection manager disposed");
    }

    pub async fn is_disposed(&self) -> bool {
        self.state.lock().await.disposed
    }

    async fn open(&self, endpoint: Endpoint) -> Result<Connection> {
        let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
        let stream = match self.config.connect_timeout {
            Some(limit) => match tokio::time::timeout(limit, connect).await {
                Ok(stream) => stream,
                Err(_) => {
                    return Err(ConnectionError::Timeout {
                        operation: "connect",
                        after: limit,
                    })
                }
            },
            None => connect.await,
        };
        let stream = stream.map_err(|source| ConnectionError::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;

        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let conn = Connection::new(id, endpoint, stream, &self.config)?;
        info!(
            connection = %id,
            endpoint = %conn.endpoint(),
            peer = %conn.peer_addr(),
            "connected"
        );
        Ok(conn)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.source.endpoint())
            .field("config", &self.config)
            .finish()
    }
}
