//! Disk spilling for large request bodies.
//!
//! A body is spilled when its declared length exceeds the configured memory
//! threshold. The decision is taken once, when the head arrives, and holds
//! for the whole body. Spilled bytes go straight from the inbound buffer to
//! the file and are never buffered a second time.
//!
//! - [`TempStore`] names and tracks temporary files.
//! - [`SpillFile`] owns one file and deletes it when dropped.
//! - [`BodySpill`] is the open, append-only writer for one body.
//! - [`MultipartSpiller`] applies the policy to plain HTTP request pieces.

mod body;
mod error;
mod file;
mod multipart;
mod store;

use crate::message::RequestHead;

pub use body::BodySpill;
pub use error::SpillError;
pub use file::SpillFile;
pub use multipart::{MultipartSpiller, SpillOutput};
pub use store::TempStore;

/// Observer notified while a request body is received.
///
/// Notifications fire whether the body is spilled or kept in memory, so
/// observers do not need to know which mode was chosen. Implementations are
/// called on the connection's execution context and must not block.
pub trait ProgressListener: Send + Sync {
    /// The body of `request` is about to be received.
    fn upload_started(&self, request: &RequestHead);

    /// `count` more body bytes were accepted.
    fn bytes_written(&self, count: u64);

    /// The final body byte was accepted.
    fn upload_finished(&self);
}
