//! Error types for the translation layer.
//!
//! Protocol violations are not errors here: the decoder answers them with a
//! reset or an error reply for the affected stream and carries on. The
//! variants below are the conditions the caller has to act on.

use thiserror::Error;

use crate::{frame::StreamId, spill::SpillError};

/// Errors surfaced by [`SpdyHttpDecoder`](super::SpdyHttpDecoder).
///
/// The stream named by the error has already been removed from the table.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// An in-memory body grew past the configured cap, or a spilled body
    /// past its declared `Content-Length`.
    #[error("stream {stream_id} body too large: {attempted} bytes exceeds limit {limit}")]
    ContentTooLarge {
        stream_id: StreamId,
        /// Body size the rejected frame would have produced.
        attempted: usize,
        limit: usize,
    },
    /// A spill file could not be created, written or closed.
    #[error("stream {stream_id} spill failed: {source}")]
    Spill {
        stream_id: StreamId,
        #[source]
        source: SpillError,
    },
}

impl DecodeError {
    /// Stream whose state was discarded.
    #[must_use]
    pub const fn stream_id(&self) -> StreamId {
        match self {
            Self::ContentTooLarge { stream_id, .. } | Self::Spill { stream_id, .. } => *stream_id,
        }
    }
}

/// Errors raised by [`SpdyHttpEncoder`](super::SpdyHttpEncoder).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// The message carries no usable `X-SPDY-Stream-ID` header.
    #[error("message has no stream id")]
    MissingStreamId,
    /// A response with a server-initiated stream has no `X-SPDY-URL`.
    #[error("pushed response on stream {0} has no url")]
    MissingPushUrl(StreamId),
    /// Body content arrived before any head was encoded.
    #[error("content received with no active stream")]
    NoActiveStream,
}
