//! Owned handle to a finished spill file.

use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use log::warn;

use super::store::LiveFiles;

/// Ownership of one spill file on disk.
///
/// The file is deleted when this value is dropped. Consumers that need the
/// file to outlive the message call [`SpillFile::keep`] and become
/// responsible for removing it.
#[derive(Debug)]
pub struct SpillFile {
    path: PathBuf,
    live: Option<LiveFiles>,
}

impl SpillFile {
    pub(super) fn tracked(path: PathBuf, live: LiveFiles) -> Self {
        Self {
            path,
            live: Some(live),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    /// Size of the file in bytes.
    ///
    /// # Errors
    ///
    /// Returns any error raised while reading the file metadata.
    pub fn size(&self) -> io::Result<u64> { fs::metadata(&self.path).map(|meta| meta.len()) }

    /// Take over the file; it will no longer be deleted automatically.
    #[must_use]
    pub fn keep(mut self) -> PathBuf {
        if let Some(live) = self.live.take() {
            live.release(&self.path);
        }
        std::mem::take(&mut self.path)
    }
}

impl Drop for SpillFile {
    fn drop(&mut self) {
        let Some(live) = self.live.take() else {
            return;
        };
        live.release(&self.path);
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(
                "failed to remove spill file: path={}, error={e}",
                self.path.display()
            );
        }
    }
}
