//! Failure reported for an individual queued write.

use std::{io, sync::Arc};

use thiserror::Error;

/// Why a queued write did not complete.
///
/// Cloneable so one cause can fail every item still queued.
#[derive(Clone, Debug, Error)]
pub enum WriteError {
    /// The connection became inactive before the item was written.
    #[error("connection closed")]
    Closed,
    /// The chunk source failed while producing data.
    #[error("chunk source failed: {0}")]
    Source(#[source] Arc<io::Error>),
    /// The sink rejected a write.
    #[error("sink rejected write: {0}")]
    Sink(#[source] Arc<io::Error>),
}

impl WriteError {
    /// Whether the write failed because the connection closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool { matches!(self, Self::Closed) }

    pub(crate) fn source_failed(error: io::Error) -> Self { Self::Source(Arc::new(error)) }

    pub(crate) fn sink_failed(error: io::Error) -> Self { Self::Sink(Arc::new(error)) }
}
