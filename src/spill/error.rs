//! Errors raised while spilling a body to disk.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure of a temporary-file operation.
///
/// Every variant names the file involved so operators can find leftovers.
#[derive(Debug, Error)]
pub enum SpillError {
    /// The temporary file could not be created.
    #[error("failed to create spill file in {}: {source}", .dir.display())]
    Create {
        /// Directory the file was to be created in.
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Writing body bytes failed. The file handle has been closed.
    #[error("failed to write spill file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Flushing the file on completion failed.
    #[error("failed to close spill file {}: {source}", .path.display())]
    Close {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A write arrived after the handle was closed by an earlier failure.
    #[error("spill file {} is already closed", .path.display())]
    Closed { path: PathBuf },
}
