//! Queued payloads and their completion signals.

use std::fmt;

use tokio::sync::{oneshot, watch};

use super::{ChunkSource, WriteError};

/// Something to send: a ready item or a lazily produced body.
pub enum Payload<T> {
    /// Written as is.
    Item(T),
    /// Pulled chunk by chunk and written as HTTP content.
    Chunks(Box<dyn ChunkSource>),
}

impl<T> Payload<T> {
    /// Box `source` as a chunked payload.
    pub fn chunks(source: impl ChunkSource + 'static) -> Self { Self::Chunks(Box::new(source)) }
}

impl<T: fmt::Debug> fmt::Debug for Payload<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(item) => f.debug_tuple("Item").field(item).finish(),
            Self::Chunks(_) => f.write_str("Chunks(..)"),
        }
    }
}

/// Writer side of a queued item's outcome.
///
/// Consumed by [`succeed`](Self::succeed) or [`fail`](Self::fail), so an
/// item completes at most once. Dropping it unresolved reports
/// [`WriteError::Closed`] to the handle.
#[derive(Debug)]
pub(crate) struct Completion {
    result: oneshot::Sender<Result<u64, WriteError>>,
    progress: watch::Sender<u64>,
    total: u64,
}

impl Completion {
    pub(crate) fn new() -> (Self, WriteHandle) {
        let (result_tx, result_rx) = oneshot::channel();
        let (progress_tx, progress_rx) = watch::channel(0);
        (
            Self {
                result: result_tx,
                progress: progress_tx,
                total: 0,
            },
            WriteHandle {
                result: result_rx,
                progress: progress_rx,
                outcome: None,
            },
        )
    }

    pub(crate) fn progress(&mut self, amount: u64) {
        self.total += amount;
        self.progress.send_replace(self.total);
    }

    pub(crate) fn succeed(self) {
        // The receiver may be gone; the outcome is then nobody's concern.
        let _ = self.result.send(Ok(self.total));
    }

    pub(crate) fn fail(self, error: WriteError) { let _ = self.result.send(Err(error)); }
}

/// An item waiting in the writer together with its completion.
#[derive(Debug)]
pub(crate) struct PendingWrite<T> {
    pub(crate) payload: Payload<T>,
    pub(crate) completion: Completion,
}

/// Caller side of a queued item's outcome.
///
/// Resolves to the number of body bytes written: the total of all chunks
/// for a chunked payload, zero for a plain item.
#[derive(Debug)]
pub struct WriteHandle {
    result: oneshot::Receiver<Result<u64, WriteError>>,
    progress: watch::Receiver<u64>,
    outcome: Option<Result<u64, WriteError>>,
}

impl WriteHandle {
    /// Bytes written so far. Never decreases.
    #[must_use]
    pub fn progress(&self) -> u64 { *self.progress.borrow() }

    /// Outcome of the write, if it has completed.
    pub fn try_result(&mut self) -> Option<Result<u64, WriteError>> {
        if self.outcome.is_none() {
            self.outcome = match self.result.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => Some(Err(WriteError::Closed)),
            };
        }
        self.outcome.clone()
    }

    /// Wait for the write to complete.
    ///
    /// # Errors
    ///
    /// Returns the [`WriteError`] the item failed with. A writer dropped
    /// without resolving the item reports [`WriteError::Closed`].
    pub async fn wait(self) -> Result<u64, WriteError> {
        if let Some(outcome) = self.outcome {
            return outcome;
        }
        self.result.await.unwrap_or(Err(WriteError::Closed))
    }
}
