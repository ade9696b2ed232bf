use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::SendError;

/// One queued payload and the signal that reports its outcome.
///
/// Completed exactly once, by the dispatcher or by shutdown.
#[derive(Debug)]
pub(crate) struct SendRequest {
    pub(crate) payload: Bytes,
    completion: oneshot::Sender<Result<(), SendError>>,
}

impl SendRequest {
    pub(crate) fn new(payload: Bytes) -> (Self, SendReceipt) {
        let (completion, outcome) = oneshot::channel();
        (
            Self {
                payload,
                completion,
            },
            SendReceipt { outcome },
        )
    }

    pub(crate) fn complete(self, outcome: Result<(), SendError>) {
        // The caller may have dropped its receipt; nothing to report to then.
        let _ = self.completion.send(outcome);
    }
}

/// Resolves once the payload has been fully written, or with the reason it
/// was not.
///
/// Dropping a receipt does not cancel the send.
#[derive(Debug)]
#[must_use = "a receipt does nothing unless awaited; dropping it does not cancel the send"]
pub struct SendReceipt {
    outcome: oneshot::Receiver<Result<(), SendError>>,
}

impl Future for SendReceipt {
    type Output = Result<(), SendError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(SendError::Shutdown)))
    }
}
