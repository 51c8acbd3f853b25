//! Scratch directories for spill tests.

use std::{
    fs,
    path::{Path, PathBuf},
};

use rstest::fixture;

/// A fresh directory under the system temp dir, removed with its contents
/// when dropped.
#[derive(Debug)]
pub struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    /// Create a uniquely named directory.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("spillframe-test-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&path).expect("create temp test dir");
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    /// Number of entries currently in the directory.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be listed.
    #[must_use]
    pub fn file_count(&self) -> usize { fs::read_dir(&self.path).expect("list temp dir").count() }
}

impl Default for TempDirGuard {
    fn default() -> Self { Self::new() }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        // The directory may already be gone if a test removed it.
        let _ = fs::remove_dir_all(&self.path);
    }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn temp_dir() -> TempDirGuard { TempDirGuard::new() }
