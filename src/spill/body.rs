//! Append-only writer for one spilled body.

use std::{
    fs::File,
    io::Write,
    path::Path,
    sync::Arc,
};

use super::{ProgressListener, SpillError, SpillFile, TempStore};
use crate::message::RequestHead;

/// A body being written to disk.
///
/// The spill exclusively owns its file handle. The handle is closed exactly
/// once: by [`BodySpill::finish`], by a failed [`BodySpill::write`], or by
/// dropping the spill, which also deletes the partial file.
pub struct BodySpill {
    file: SpillFile,
    handle: Option<File>,
    bytes_written: u64,
    listener: Option<Arc<dyn ProgressListener>>,
}

impl BodySpill {
    /// Create a fresh file for the body of `request`.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::Create`] if the temporary file cannot be created.
    pub fn create(
        store: &TempStore,
        request: &RequestHead,
        listener: Option<Arc<dyn ProgressListener>>,
    ) -> Result<Self, SpillError> {
        let (file, handle) = store.create()?;
        if let Some(listener) = &listener {
            listener.upload_started(request);
        }
        Ok(Self {
            file,
            handle: Some(handle),
            bytes_written: 0,
            listener,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path { self.file.path() }

    /// Bytes appended so far.
    #[must_use]
    pub const fn bytes_written(&self) -> u64 { self.bytes_written }

    /// Append `data` to the file.
    ///
    /// On failure the handle is closed before the error is returned; a
    /// failure while closing is dropped in favour of the write error.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::Write`] if the bytes cannot be written, or
    /// [`SpillError::Closed`] if an earlier write already failed.
    pub fn write(&mut self, data: &[u8]) -> Result<(), SpillError> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(SpillError::Closed {
                path: self.file.path().to_path_buf(),
            });
        };
        if let Err(source) = handle.write_all(data) {
            self.handle = None;
            return Err(SpillError::Write {
                path: self.file.path().to_path_buf(),
                source,
            });
        }
        let count = data.len() as u64;
        self.bytes_written += count;
        if let Some(listener) = &self.listener {
            listener.bytes_written(count);
        }
        Ok(())
    }

    /// Close the handle and hand over the finished file.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::Close`] if the data cannot be synced to disk, or
    /// [`SpillError::Closed`] if an earlier write already failed. The file is
    /// deleted in both cases.
    pub fn finish(mut self) -> Result<SpillFile, SpillError> {
        let Some(handle) = self.handle.take() else {
            return Err(SpillError::Closed {
                path: self.file.path().to_path_buf(),
            });
        };
        if let Err(source) = handle.sync_all() {
            return Err(SpillError::Close {
                path: self.file.path().to_path_buf(),
                source,
            });
        }
        drop(handle);
        if let Some(listener) = &self.listener {
            listener.upload_finished();
        }
        Ok(self.file)
    }
}

#[cfg(test)]
impl BodySpill {
    /// Create a tracked spill file but write through `handle` instead.
    pub(crate) fn with_handle(store: &TempStore, handle: File) -> Result<Self, SpillError> {
        let (file, _) = store.create()?;
        Ok(Self {
            file,
            handle: Some(handle),
            bytes_written: 0,
            listener: None,
        })
    }
}

impl std::fmt::Debug for BodySpill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodySpill")
            .field("path", &self.file.path())
            .field("open", &self.handle.is_some())
            .field("bytes_written", &self.bytes_written)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::fs::{self, OpenOptions};

    use http::{Method, Version};
    use spillframe_testing::TempDirGuard;

    use super::BodySpill;
    use crate::{
        message::RequestHead,
        spill::{SpillError, TempStore},
    };

    fn upload_head() -> RequestHead { RequestHead::new(Method::POST, "/upload", Version::HTTP_11) }

    #[test]
    fn finished_spill_contains_every_write() {
        let dir = TempDirGuard::new();
        let store = TempStore::new(dir.path());
        let mut spill = BodySpill::create(&store, &upload_head(), None).expect("create spill");
        spill.write(b"hello ").expect("first write");
        spill.write(b"world").expect("second write");
        assert_eq!(spill.bytes_written(), 11);

        let file = spill.finish().expect("finish spill");
        assert_eq!(fs::read(file.path()).expect("read spill"), b"hello world");
        assert_eq!(store.live_count(), 1);
        drop(file);
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn dropping_an_unfinished_spill_removes_the_file() {
        let dir = TempDirGuard::new();
        let store = TempStore::new(dir.path());
        let mut spill = BodySpill::create(&store, &upload_head(), None).expect("create spill");
        spill.write(b"partial").expect("write");
        let path = spill.path().to_path_buf();
        drop(spill);
        assert!(!path.exists());
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn kept_file_survives_drop() {
        let dir = TempDirGuard::new();
        let store = TempStore::new(dir.path());
        let spill = BodySpill::create(&store, &upload_head(), None).expect("create spill");
        let path = spill.finish().expect("finish").keep();
        assert!(path.exists());
        assert_eq!(store.live_count(), 0);
        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn sweep_removes_files_still_owned_by_messages() {
        let dir = TempDirGuard::new();
        let store = TempStore::new(dir.path());
        let file = BodySpill::create(&store, &upload_head(), None)
            .expect("create spill")
            .finish()
            .expect("finish");
        let path = file.path().to_path_buf();
        assert_eq!(store.sweep(), 1);
        assert!(!path.exists());
        drop(file);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_write_closes_the_handle() {
        let dir = TempDirGuard::new();
        let store = TempStore::new(dir.path());
        let full = OpenOptions::new()
            .write(true)
            .open("/dev/full")
            .expect("open /dev/full");
        let mut spill = BodySpill::with_handle(&store, full).expect("create spill");
        let path = spill.path().to_path_buf();

        let err = spill.write(b"no room").expect_err("device is full");
        assert!(matches!(err, SpillError::Write { path: ref failed, .. } if *failed == path));
        assert_eq!(spill.bytes_written(), 0);

        let again = spill.write(b"retry").expect_err("handle is closed");
        assert!(matches!(again, SpillError::Closed { .. }));
        assert!(matches!(spill.finish(), Err(SpillError::Closed { .. })));
        assert!(!path.exists());
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn creation_fails_for_missing_directory() {
        let dir = TempDirGuard::new();
        let store = TempStore::new(dir.path().join("missing"));
        let err = BodySpill::create(&store, &upload_head(), None).expect_err("should fail");
        assert!(err.to_string().contains("failed to create spill file"));
    }
}
