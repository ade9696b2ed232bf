use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use seqwire_frame::{Frame, FrameConfig, FrameReader};
use seqwire_transport::{
    ConnectionError, ConnectionId, ConnectionManager, ConnectionReader, EndpointSource,
};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ClientError, Result, SendError};
use crate::request::{SendRequest, SendReceipt};

/// Ordered, sequenced frame transport over one managed TCP connection.
///
/// Any number of tasks may call [`send`](Self::send) concurrently; a single
/// background dispatcher writes the payloads in the order they were
/// accepted, numbering them from a per-connection counter.
/// [`receive`](Self::receive) reads one checksum-verified frame; concurrent
/// receivers are served one at a time.
///
/// Must be created inside a Tokio runtime. Dropping the transport stops the
/// dispatcher, fails whatever is still queued and releases the socket;
/// [`dispose`](Self::dispose) does the same and waits for it to finish.
pub struct FramedTransport {
    connections: Arc<ConnectionManager>,
    queue: mpsc::UnboundedSender<SendRequest>,
    pending: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    frame: FrameConfig,
}

impl FramedTransport {
    /// Create a transport targeting whatever `source` reports and start its
    /// dispatcher. No connection is opened until first use.
    pub fn new(source: Arc<dyn EndpointSource>, config: ClientConfig) -> Self {
        let connections = Arc::new(ConnectionManager::new(source, config.transport));
        let (queue, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let dispatcher = Dispatcher::new(
            Arc::clone(&connections),
            rx,
            Arc::clone(&pending),
            shutdown.clone(),
            config.frame.clone(),
            config.reset_sequence_on_reconnect,
        );
        let handle = tokio::spawn(dispatcher.run());

        Self {
            connections,
            queue,
            pending,
            shutdown,
            dispatcher: Mutex::new(Some(handle)),
            frame: config.frame,
        }
    }

    /// Queue a payload for transmission.
    ///
    /// Returns immediately; the receipt resolves once the frame has been
    /// fully written, or with the reason it was not. Payloads are written
    /// in the order `send` was called.
    pub fn send(&self, payload: impl Into<Bytes>) -> SendReceipt {
        let (request, receipt) = SendRequest::new(payload.into());
        self.pending.fetch_add(1, Ordering::AcqRel);
        if let Err(mpsc::error::SendError(request)) = self.queue.send(request) {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            request.complete(Err(SendError::Shutdown));
        }
        receipt
    }

    /// Read the next complete, checksum-verified frame.
    ///
    /// Waits for as long as the configured read timeout allows. After an
    /// error for which [`ClientError::requires_reconnect`] is true the
    /// stream may be misaligned. If the connection is discarded or replaced
    /// meanwhile, fails with [`ConnectionError::Closed`].
    ///
    /// # Cancel safety
    ///
    /// Dropping the future before any byte of a frame arrived loses nothing.
    /// Dropping it partway through a frame marks the connection dead, and
    /// the next send or receive reconnects.
    pub async fn receive(&self) -> Result<Frame> {
        if self.shutdown.is_cancelled() {
            return Err(ClientError::Shutdown);
        }

        let frame = tokio::select! {
            _ = self.shutdown.cancelled() => return Err(ClientError::Shutdown),
            frame = self.read_frame() => frame?,
        };
        debug!(
            sequence = frame.sequence,
            length = frame.total_length(),
            "received frame"
        );
        Ok(frame)
    }

    async fn read_frame(&self) -> Result<Frame> {
        let reader = self.connections.reader().await?;
        let closed = reader.close_signal();
        let limit = self.connections.config().read_timeout;
        let mut frames = FrameReader::with_config(reader, self.frame.clone());

        let outcome = tokio::select! {
            _ = closed.cancelled() => return Err(ConnectionError::Closed.into()),
            outcome = read_with_deadline(&mut frames, limit) => outcome,
        };
        // The read ran to completion; whether an error left the stream
        // misaligned is reported through `requires_reconnect`.
        frames.get_mut().frame_boundary();
        outcome
    }

    /// Drop the current connection so the next send or receive reconnects.
    pub async fn reset_connection(&self) {
        self.connections.discard().await;
    }

    /// Id of the currently open connection, if any.
    pub async fn connection_id(&self) -> Option<ConnectionId> {
        self.connections.connection_id().await
    }

    /// Payloads accepted but not yet picked up by the dispatcher.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop the dispatcher, fail outstanding sends and release the socket.
    ///
    /// Idempotent.
    pub async fn dispose(&self) {
        self.shutdown.cancel();
        let handle = self.dispatcher.lock().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "dispatcher task failed");
            }
        }
        self.connections.dispose().await;
    }
}

impl Drop for FramedTransport {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for FramedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedTransport")
            .field("connections", &self.connections)
            .field("pending", &self.pending())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

async fn read_with_deadline(
    frames: &mut FrameReader<ConnectionReader>,
    limit: Option<Duration>,
) -> Result<Frame> {
    let Some(limit) = limit else {
        return Ok(frames.read_frame().await?);
    };

    let outcome = tokio::time::timeout(limit, frames.read_frame()).await;
    match outcome {
        Ok(frame) => Ok(frame?),
        Err(_) => {
            // A partially consumed frame leaves the stream misaligned.
            frames.get_ref().mark_dead();
            Err(ConnectionError::Timeout {
                operation: "read",
                after: limit,
            }
            .into())
        }
    }
}
