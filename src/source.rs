//! Byte access for the output planner.
//!
//! Planning needs two things from a source file: its size (for the inlining
//! decision) and its bytes (for the content fingerprint). Both go through
//! [`AssetSource`] so the planner never touches the filesystem directly and
//! tests can substitute an in-memory source.

use std::io;
use std::path::{Path, PathBuf};

/// Read-only access to source file sizes and contents.
///
/// `Sync` so one source can be shared by every rayon worker.
pub trait AssetSource: Sync {
    /// Byte size of the file.
    fn size(&self, path: &str) -> io::Result<u64>;

    /// Full contents of the file.
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// Reads from disk, resolving relative paths against a root directory.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(Path::new(path))
    }
}

impl AssetSource for FsSource {
    fn size(&self, path: &str) -> io::Result<u64> {
        Ok(std::fs::metadata(self.full_path(path))?.len())
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.full_path(path))
    }
}
