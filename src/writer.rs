//! Flow-controlled output.
//!
//! Outbound items and lazily produced bodies queue in a [`ChunkedWriter`],
//! which writes them in order while the [`OutboundSink`] reports itself
//! writable. Each queued item yields a [`WriteHandle`] that resolves once,
//! with the bytes written or a [`WriteError`]. A closed connection fails
//! everything pending with [`WriteError::Closed`].
//!
//! [`WriterDriver`] hosts the writer on a Tokio task so that producers on
//! other threads can enqueue work and resume suspended transfers.

mod chunked;
mod driver;
mod error;
mod pending;
mod sink;
mod source;

pub use chunked::ChunkedWriter;
pub use driver::{ResumeHandle, WriterDriver, WriterHandle};
pub use error::WriteError;
pub use pending::{Payload, WriteHandle};
pub use sink::OutboundSink;
pub use source::{BytesChunkSource, ChunkSource, FileChunkSource, StreamChunkSource};
