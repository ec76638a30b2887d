//! Cross-process single-flight guard.
//!
//! The scheduled foreground timer and the headless entry point may live in
//! different OS processes that share only durable storage, so the guard is
//! an advisory file lock on a fixed lock file, not an in-memory mutex. A
//! rejected acquisition means another cycle is mid-flight; the caller skips
//! without touching state.

use fs4::fs_std::FileExt;
use std::path::{Path, PathBuf};
use tracing::debug;

use fieldmark_common::{Error, Result};

/// Held for the duration of one cycle.
///
/// The advisory lock is tied to the open file descriptor and released
/// automatically when the guard is dropped.
#[derive(Debug)]
pub struct CycleGuard {
    _file: std::fs::File,
    path: PathBuf,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "Released cycle lock");
    }
}

/// Acquirer for the single-flight cycle lock.
pub struct CycleLock;

impl CycleLock {
    /// Try to acquire the exclusive cycle lock without waiting.
    ///
    /// # Errors
    /// - `LockContention` — another cycle (in this or another process) holds
    ///   the lock
    /// - `Io` — the lock file cannot be created
    pub async fn try_acquire(path: impl AsRef<Path>) -> Result<CycleGuard> {
        let path = path.as_ref().to_path_buf();

        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::File::create(&path)?;
            file.try_lock_exclusive().map_err(|_| {
                Error::LockContention(format!(
                    "Another sync cycle holds the lock: {}",
                    path.display()
                ))
            })?;
            debug!(path = %path.display(), "Acquired cycle lock");
            Ok(CycleGuard { _file: file, path })
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cycle.lock");

        let guard = CycleLock::try_acquire(&path).await.unwrap();
        drop(guard);

        // Re-acquirable after release.
        assert!(CycleLock::try_acquire(&path).await.is_ok());
    }

    #[tokio::test]
    async fn test_second_acquisition_is_contention() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cycle.lock");

        let _guard = CycleLock::try_acquire(&path).await.unwrap();
        let err = CycleLock::try_acquire(&path).await.unwrap_err();
        assert!(matches!(err, Error::LockContention(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_creates_parent_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deep/nested/cycle.lock");
        assert!(CycleLock::try_acquire(&path).await.is_ok());
    }
}
