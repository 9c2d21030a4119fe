//! Sidecar lock files for read-modify-write cycles.
//!
//! Data files are replaced by rename, so a lock held on the data file itself
//! would be lost with the old inode. Writers instead serialize on a stable
//! `<name>.lock` file next to it.

use crate::Result;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Exclusive lock on the sidecar of a data file, released on drop
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Block until the lock for `data_path` is held
    pub fn acquire(data_path: &Path) -> Result<Self> {
        let path = lock_path(data_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        file.lock_exclusive()?;

        tracing::trace!("Acquired {:?}", path);
        Ok(Self { file, path })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release {:?}: {}", self.path, e);
        }
    }
}

/// `registry.json` -> `registry.lock`, `doses.jsonl` -> `doses.lock`
pub fn lock_path(data_path: &Path) -> PathBuf {
    data_path.with_extension("lock")
}
