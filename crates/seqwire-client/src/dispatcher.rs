//! The single writer that drains the send queue in order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use seqwire_frame::{encode_frame, FrameConfig, FrameError};
use seqwire_transport::{ConnectionId, ConnectionManager};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SendError;
use crate::request::SendRequest;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

pub(crate) struct Dispatcher {
    connections: Arc<ConnectionManager>,
    queue: mpsc::UnboundedReceiver<SendRequest>,
    pending: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    frame: FrameConfig,
    reset_sequence_on_reconnect: bool,
    sequence: u32,
    last_connection: Option<ConnectionId>,
    buf: BytesMut,
}

impl Dispatcher {
    pub(crate) fn new(
        connections: Arc<ConnectionManager>,
        queue: mpsc::UnboundedReceiver<SendRequest>,
        pending: Arc<AtomicUsize>,
        shutdown: CancellationToken,
        frame: FrameConfig,
        reset_sequence_on_reconnect: bool,
    ) -> Self {
        Self {
            connections,
            queue,
            pending,
            shutdown,
            frame,
            reset_sequence_on_reconnect,
            sequence: 0,
            last_connection: None,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Dispatch requests one at a time, in queue order, until shut down.
    ///
    /// A failed request is reported to its own receipt only. On shutdown the
    /// in-flight write is abandoned and every request still queued fails
    /// with [`SendError::Shutdown`].
    pub(crate) async fn run(mut self) {
        debug!("dispatcher started");
        let shutdown = self.shutdown.clone();

        loop {
            let request = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = self.queue.recv() => match next {
                    Some(request) => request,
                    None => break,
                },
            };
            self.pending.fetch_sub(1, Ordering::AcqRel);

            let payload = request.payload.clone();
            let outcome = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                outcome = self.dispatch(payload) => Some(outcome),
            };

            match outcome {
                Some(outcome) => {
                    if let Err(err) = &outcome {
                        warn!(error = %err, "send failed");
                    }
                    request.complete(outcome);
                }
                None => {
                    request.complete(Err(SendError::Shutdown));
                    break;
                }
            }
        }

        self.fail_outstanding();
        self.connections.dispose().await;
        debug!("dispatcher stopped");
    }

    async fn dispatch(&mut self, payload: Bytes) -> Result<(), SendError> {
        let max_body = self.frame.max_body_size();
        if payload.len() > max_body {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: max_body,
            }
            .into());
        }

        let connection = self.connections.connection().await?;
        if self.last_connection != Some(connection.id()) {
            if self.reset_sequence_on_reconnect {
                self.sequence = 0;
            }
            self.last_connection = Some(connection.id());
        }

        let sequence = self.sequence;
        self.buf.clear();
        encode_frame(sequence, &payload, &mut self.buf)?;
        self.sequence = self.sequence.wrapping_add(1);

        debug!(
            sequence,
            length = self.buf.len(),
            connection = %connection.id(),
            "sending frame"
        );
        connection.write_all(&self.buf).await?;
        Ok(())
    }

    fn fail_outstanding(&mut self) {
        self.queue.close();
        let mut abandoned = 0usize;
        while let Ok(request) = self.queue.try_recv() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            request.complete(Err(SendError::Shutdown));
            abandoned += 1;
        }
        if abandoned > 0 {
            info!(abandoned, "failed queued sends on shutdown");
        }
    }
}
