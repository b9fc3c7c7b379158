//! Single-instance process guard backed by an advisory file lock.
//!
//! Gates an entry flow so that only one instance of a named workflow
//! runs on the host at a time. The lock is released when the guard is
//! dropped, and by the operating system if the process dies.

use fs2::FileExt;
use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error acquiring the process guard
#[derive(Error, Debug)]
pub enum GuardError {
    /// The lock file could not be created or opened
    #[error("failed to open guard file: {0}")]
    Io(#[from] io::Error),
}

/// Host-wide named mutual exclusion, held until dropped.
///
/// Backed by an exclusive advisory lock on a file in the system temp
/// directory; contending for the same name means contending for the
/// same file, across processes.
pub struct ProcessGuard {
    file: File,
    path: PathBuf,
}

impl ProcessGuard {
    /// Try to acquire the guard for `name`.
    ///
    /// Returns `Ok(Some(guard))` when this process now holds the guard,
    /// and `Ok(None)` when another instance already holds it. Never
    /// blocks waiting for the holder.
    pub fn acquire(name: &str) -> Result<Option<Self>, GuardError> {
        let path = Self::lock_path(name);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired process guard {:?}", path);
                Ok(Some(Self { file, path }))
            }
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                debug!("Process guard {:?} already held", path);
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Map a guard name to its lock file in the temp directory.
    ///
    /// Path separators and other unsafe characters collapse to `_` so a
    /// name can never escape the directory.
    fn lock_path(name: &str) -> PathBuf {
        let sanitized: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        std::env::temp_dir().join(format!("{}.lock", sanitized))
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            warn!("Failed to release process guard {:?}: {}", self.path, err);
        }
    }
}
