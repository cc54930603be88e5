//! Exclusive writer lock on an index location
//!
//! Advisory `fs2` lock on `<index>/write.lock`. The lock file itself is left
//! on disk after release; only the OS-level lock matters.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use docindex_core::{IndexError, Result};
use fs2::FileExt;
use tracing::{debug, warn};

/// Held writer lock; released on drop.
#[derive(Debug)]
pub struct IndexLock {
    file: File,
    path: PathBuf,
}

impl IndexLock {
    /// Try to take the lock without blocking.
    ///
    /// # Errors
    ///
    /// `LockHeld` if another writer owns it, `Io` if the lock file cannot be
    /// opened.
    pub fn acquire(lock_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(lock_path)?;

        if let Err(e) = file.try_lock_exclusive() {
            let index_path = lock_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| lock_path.to_path_buf());
            if e.kind() == fs2::lock_contended_error().kind() {
                warn!(target: "docindex::lock", path = %index_path.display(), "Index is locked by another writer");
                return Err(IndexError::LockHeld { path: index_path });
            }
            return Err(IndexError::Io(e));
        }

        debug!(target: "docindex::lock", path = %lock_path.display(), "Acquired writer lock");
        Ok(IndexLock {
            file,
            path: lock_path.to_path_buf(),
        })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(target: "docindex::lock", path = %self.path.display(), "Released writer lock");
    }
}
