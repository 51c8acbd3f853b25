//! Temporary file naming and tracking.

use std::{
    collections::HashSet,
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use log::warn;
use uuid::Uuid;

use super::{SpillError, SpillFile};

const FILE_PREFIX: &str = "spillframe-";
const FILE_SUFFIX: &str = ".multipart";

/// Set of spill files that have not yet been consumed.
#[derive(Clone, Debug, Default)]
pub(super) struct LiveFiles(Arc<Mutex<HashSet<PathBuf>>>);

impl LiveFiles {
    fn insert(&self, path: PathBuf) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path);
    }

    pub(super) fn release(&self, path: &Path) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
    }

    fn drain(&self) -> Vec<PathBuf> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect()
    }

    fn len(&self) -> usize { self.0.lock().unwrap_or_else(PoisonError::into_inner).len() }
}

/// Directory-backed factory for uniquely named spill files.
///
/// Clones share the same set of live files, so one store can serve every
/// connection of a server and [`TempStore::sweep`] can remove anything left
/// behind when the process shuts down.
#[derive(Clone, Debug)]
pub struct TempStore {
    dir: PathBuf,
    live: LiveFiles,
}

impl TempStore {
    /// Create a store writing into `dir`. The directory must already exist.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            live: LiveFiles::default(),
        }
    }

    /// Directory the files are created in.
    #[must_use]
    pub fn dir(&self) -> &Path { &self.dir }

    /// Create a new, empty file opened for writing.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::Create`] if the file cannot be created.
    pub fn create(&self) -> Result<(SpillFile, File), SpillError> {
        let path = self
            .dir
            .join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", Uuid::new_v4().simple()));
        let handle = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| SpillError::Create {
                dir: self.dir.clone(),
                source,
            })?;
        self.live.insert(path.clone());
        Ok((SpillFile::tracked(path, self.live.clone()), handle))
    }

    /// Number of files created by this store that still exist.
    #[must_use]
    pub fn live_count(&self) -> usize { self.live.len() }

    /// Delete every file that has been neither dropped nor kept.
    ///
    /// Call this at shutdown, after connections have been torn down.
    /// Returns the number of files removed.
    pub fn sweep(&self) -> usize {
        let mut removed = 0;
        for path in self.live.drain() {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("failed to sweep spill file: path={}, error={e}", path.display()),
            }
        }
        removed
    }
}
