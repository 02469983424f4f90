//! Cross-process install lock.
//!
//! Two invocations installing the same cache entry serialize on an
//! exclusive file lock at `<cache_root>/.locks/<key>.lock`, where `key` is
//! derived from the store entry id. The lock is released when the guard drops.

use super::cache::LOCKS_DIR;
use super::error::PkgError;
use blink_util::hash::short_key;
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Held exclusive lock on one cache entry.
#[derive(Debug)]
pub struct CacheLock {
    path: PathBuf,
    _file: File,
}

impl CacheLock {
    /// Lock file path for `entry` under `cache_root`.
    #[must_use]
    pub fn lock_path(cache_root: &Path, entry: &str) -> PathBuf {
        cache_root
            .join(LOCKS_DIR)
            .join(format!("{}.lock", short_key(entry)))
    }

    /// Block until the lock for `entry` is held.
    ///
    /// # Errors
    /// Returns an error if the lock file cannot be created or locked.
    pub fn acquire_blocking(cache_root: &Path, entry: &str) -> Result<Self, PkgError> {
        let path = Self::lock_path(cache_root, entry);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PkgError::lock_failed(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| PkgError::lock_failed(format!("Cannot open {}: {e}", path.display())))?;

        file.lock_exclusive()
            .map_err(|e| PkgError::lock_failed(format!("Cannot lock {}: {e}", path.display())))?;

        debug!(entry, lock = %path.display(), "Acquired cache lock");
        Ok(Self { path, _file: file })
    }

    /// Acquire the lock without blocking the async runtime.
    ///
    /// # Errors
    /// Returns an error if the lock cannot be taken.
    pub async fn acquire(cache_root: &Path, entry: &str) -> Result<Self, PkgError> {
        let cache_root = cache_root.to_path_buf();
        let entry = entry.to_string();
        tokio::task::spawn_blocking(move || Self::acquire_blocking(&cache_root, &entry))
            .await
            .map_err(|e| PkgError::lock_failed(format!("Lock task failed: {e}")))?
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
