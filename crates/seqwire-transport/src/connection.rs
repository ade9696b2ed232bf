use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{ConnectionError, Result};
use crate::manager::TransportConfig;

/// Identifies one connect attempt's socket; a reconnect yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl ConnectionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One live TCP socket plus the endpoint it was opened against.
///
/// The read and write halves are locked independently: the dispatcher
/// writes while a receiver reads. Any EOF, I/O error or deadline expiry
/// on either half marks the connection dead; the manager then replaces it.
/// Closing also wakes any reader parked on the read half.
pub struct Connection {
    id: ConnectionId,
    endpoint: Endpoint,
    peer_addr: SocketAddr,
    reader: Arc<Mutex<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    alive: Arc<AtomicBool>,
    closed: CancellationToken,
    write_timeout: Option<Duration>,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        endpoint: Endpoint,
        stream: TcpStream,
        config: &TransportConfig,
    ) -> Result<Self> {
        let peer_addr = stream.peer_addr()?;
        stream.set_nodelay(config.nodelay)?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            id,
            endpoint,
            peer_addr,
            reader: Arc::new(Mutex::new(read_half)),
            writer: Mutex::new(write_half),
            alive: Arc::new(AtomicBool::new(true)),
            closed: CancellationToken::new(),
            write_timeout: config.write_timeout,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The endpoint this connection was opened against.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The resolved remote address of the socket.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Flag the connection as unusable so the next connect check replaces it.
    pub fn mark_dead(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            debug!(connection = %self.id, endpoint = %self.endpoint, "connection marked dead");
        }
    }

    /// Why this connection must not serve `current`, if anything.
    pub(crate) fn stale_reason(&self, current: &Endpoint) -> Option<&'static str> {
        if !self.is_alive() {
            Some("disconnected")
        } else if self.endpoint != *current {
            Some("endpoint changed")
        } else {
            None
        }
    }

    /// Write all bytes and flush, honoring the configured write deadline.
    pub async fn write_all(&self, bytes: &[u8]) -> Result<()> {
        if !self.is_alive() {
            return Err(ConnectionError::Closed);
        }

        let mut writer = self.writer.lock().await;
        let write = async {
            match writer.write_all(bytes).await {
                Ok(()) => writer.flush().await,
                Err(err) => Err(err),
            }
        };

        let outcome = match self.write_timeout {
            Some(limit) => match tokio::time::timeout(limit, write).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.mark_dead();
                    return Err(ConnectionError::Timeout {
                        operation: "write",
                        after: limit,
                    });
                }
            },
            None => write.await,
        };

        outcome.map_err(|err| {
            self.mark_dead();
            ConnectionError::Io(err)
        })
    }

    /// Take exclusive access to the read half.
    ///
    /// Concurrent readers queue up here rather than interleaving partial reads.
    pub async fn reader(&self) -> Result<ConnectionReader> {
        if !self.is_alive() {
            return Err(ConnectionError::Closed);
        }
        let half = Arc::clone(&self.reader).lock_owned().await;
        Ok(ConnectionReader {
            id: self.id,
            half,
            alive: Arc::clone(&self.alive),
            closed: self.closed.clone(),
            consumed: 0,
        })
    }

    /// Mark dead, wake parked readers and send FIN if no write is in flight.
    ///
    /// The socket itself is released once the last handle is dropped.
    pub(crate) async fn close(&self) {
        self.mark_dead();
        self.closed.cancel();
        if let Ok(mut writer) = self.writer.try_lock() {
            if let Err(err) = writer.shutdown().await {
                debug!(connection = %self.id, error = %err, "write half shutdown failed");
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("peer_addr", &self.peer_addr)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Exclusive handle on a connection's read half.
///
/// Reaching EOF or hitting an I/O error through this handle marks the
/// owning connection dead. So does dropping it after bytes were read past
/// the last [`frame_boundary`](Self::frame_boundary): the next reader would
/// start in the middle of a frame.
pub struct ConnectionReader {
    id: ConnectionId,
    half: OwnedMutexGuard<OwnedReadHalf>,
    alive: Arc<AtomicBool>,
    closed: CancellationToken,
    consumed: usize,
}

impl ConnectionReader {
    pub fn connection_id(&self) -> ConnectionId {
        self.id
    }

    /// Flag the owning connection dead, e.g. after a read deadline expired mid-frame.
    pub fn mark_dead(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            debug!(connection = %self.id, "connection marked dead by reader");
        }
    }

    /// Record that everything read so far forms whole frames.
    pub fn frame_boundary(&mut self) {
        self.consumed = 0;
    }

    /// Token cancelled once the owning connection has been closed.
    ///
    /// Cloned out of the reader so it can be raced against a read that
    /// borrows the reader mutably.
    pub fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }
}

impl Drop for ConnectionReader {
    fn drop(&mut self) {
        if self.consumed > 0 && self.alive.swap(false, Ordering::AcqRel) {
            debug!(
                connection = %self.id,
                consumed = self.consumed,
                "reader dropped mid-frame, connection marked dead"
            );
        }
    }
}

impl AsyncRead for ConnectionReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let wanted = buf.remaining() > 0;
        let before = buf.filled().len();

        match Pin::new(&mut *this.half).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let read = buf.filled().len() - before;
                if wanted && read == 0 {
                    this.mark_dead();
                }
                this.consumed += read;
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(err)) => {
                this.mark_dead();
                Poll::Ready(Err(err))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl fmt::Debug for ConnectionReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionReader")
            .field("connection", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    async fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let conn = Connection::new(
            ConnectionId(1),
            Endpoint::from(addr),
            client,
            &TransportConfig::default(),
        )
        .unwrap();
        (conn, server)
    }

    #[tokio::test]
    async fn write_all_reaches_peer() {
        let (conn, mut server) = pair().await;

        conn.write_all(b"hello").await.unwrap();

        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        assert!(conn.is_alive());
    }

    #[tokio::test]
    async fn eof_marks_connection_dead() {
        let (conn, server) = pair().await;
        drop(server);

        let mut reader = conn.reader().await.unwrap();
        let mut buf = [0u8; 4];
        let read = reader.read(&mut buf).await.unwrap();
        drop(reader);

        assert_eq!(read, 0);
        assert!(!conn.is_alive());
        assert!(matches!(
            conn.write_all(b"x").await,
            Err(ConnectionError::Closed)
        ));
        assert!(matches!(conn.reader().await, Err(ConnectionError::Closed)));
    }

    #[tokio::test]
    async fn reader_sees_peer_bytes() {
        let (conn, mut server) = pair().await;
        server.write_all(b"pong").await.unwrap();

        let mut reader = conn.reader().await.unwrap();
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).await.unwrap();

        assert_eq!(&buf, b"pong");
        assert_eq!(reader.connection_id(), conn.id());
        assert!(conn.is_alive());
    }

    #[tokio::test]
    async fn stale_reason_reports_dead_and_moved() {
        let (conn, _server) = pair().await;
        let current = conn.endpoint().clone();

        assert_eq!(conn.stale_reason(&current), None);
        assert_eq!(
            conn.stale_reason(&Endpoint::new("elsewhere", 1)),
            Some("endpoint changed")
        );

        conn.mark_dead();
        assert_eq!(conn.stale_reason(&current), Some("disconnected"));
    }

    #[tokio::test]
    async fn close_wakes_parked_reader() {
        let (conn, _server) = pair().await;
        let reader = conn.reader().await.unwrap();
        let closed = reader.close_signal();
        assert!(!closed.is_cancelled());

        let waiter = tokio::spawn(async move { closed.cancelled().await });
        conn.close().await;

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        drop(reader);
    }

    #[tokio::test]
    async fn dropping_reader_mid_frame_marks_dead() {
        let (conn, mut server) = pair().await;
        server.write_all(b"abcdef").await.unwrap();

        let mut reader = conn.reader().await.unwrap();
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).await.unwrap();
        reader.frame_boundary();
        drop(reader);
        assert!(conn.is_alive());

        let mut reader = conn.reader().await.unwrap();
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).await.unwrap();
        drop(reader);
        assert!(!conn.is_alive());
    }

    #[tokio::test]
    async fn close_sends_fin() {
        let (conn, mut server) = pair().await;
        conn.close().await;

        let mut buf = [0u8; 1];
        assert_eq!(server.read(&mut buf).await.unwrap(), 0);
        assert!(!conn.is_alive());
    }
}
