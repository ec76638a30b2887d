//! Durable storage for the sync state.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::fs;
use tracing::debug;

use fieldmark_common::{EmployeeCode, Error, Result};

use crate::state::SyncState;

/// Storage port for the sync state record.
///
/// Persistence failures are the only fatal condition for a cycle: the engine
/// aborts and makes no state claims, relying on the host OS to retry the
/// background task.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the record, or a fresh one if none has been written yet.
    async fn load(&self) -> Result<SyncState>;

    /// Flush the record durably. Must be atomic: a process kill mid-flush
    /// leaves the previously committed record intact.
    async fn save(&self, state: &SyncState) -> Result<()>;
}

/// File-backed store using write-to-temp-then-rename for atomic flushes.
pub struct FileStateStore {
    path: PathBuf,
    employee_code: EmployeeCode,
}

impl FileStateStore {
    /// Create a store persisting to `path`. A missing file loads as a fresh
    /// record for `employee_code`.
    pub fn new(path: impl AsRef<Path>, employee_code: EmployeeCode) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            employee_code,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "sync_state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<SyncState> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => SyncState::from_json(&content).map_err(|e| {
                Error::Persistence(format!(
                    "Corrupt state file {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file yet, starting fresh");
                Ok(SyncState::new(self.employee_code.clone()))
            }
            Err(e) => Err(Error::Persistence(format!(
                "Cannot read state file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::Persistence(format!("Cannot create state dir: {}", e))
            })?;
        }

        let json = state
            .to_json()
            .map_err(|e| Error::Persistence(format!("Cannot serialize state: {}", e)))?;

        // Write the sibling temp file first, then rename over the record, so
        // readers never observe a half-written state.
        let temp = self.temp_path();
        fs::write(&temp, json).await.map_err(|e| {
            Error::Persistence(format!("Cannot write {}: {}", temp.display(), e))
        })?;
        fs::rename(&temp, &self.path).await.map_err(|e| {
            Error::Persistence(format!(
                "Cannot commit state to {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(path = %self.path.display(), "Flushed sync state");
        Ok(())
    }
}

/// In-memory store for testing, with failure injection.
pub struct MemoryStateStore {
    employee_code: EmployeeCode,
    state: Mutex<Option<SyncState>>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    save_count: AtomicUsize,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new(employee_code: EmployeeCode) -> Self {
        Self {
            employee_code,
            state: Mutex::new(None),
            fail_loads: AtomicBool::new(false),
            fail_saves: AtomicBool::new(false),
            save_count: AtomicUsize::new(0),
        }
    }

    /// Seed the store with an existing record.
    pub fn with_state(self, state: SyncState) -> Self {
        *self.state.lock().unwrap() = Some(state);
        self
    }

    /// Make subsequent loads fail.
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent saves fail.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    /// Snapshot of the stored record.
    pub fn snapshot(&self) -> Option<SyncState> {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<SyncState> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(Error::Persistence("Injected load failure".to_string()));
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| SyncState::new(self.employee_code.clone())))
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Persistence("Injected save failure".to_string()));
        }
        *self.state.lock().unwrap() = Some(state.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FailureReason;
    use fieldmark_common::RegionId;
    use tempfile::TempDir;

    fn employee() -> EmployeeCode {
        EmployeeCode::new("EMP-042").unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_loads_fresh_state() {
        let temp = TempDir::new().unwrap();
        let store = FileStateStore::new(temp.path().join("state.json"), employee());
        let state = store.load().await.unwrap();
        assert_eq!(state.employee_code, employee());
        assert!(state.last_fix.is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = FileStateStore::new(temp.path().join("state.json"), employee());

        let mut state = store.load().await.unwrap();
        let region = RegionId::new("hq").unwrap();
        state.entry_mut(&region).mark_submitted("k1".to_string());
        state.last_failure = Some(FailureReason::TransientNetwork);
        store.save(&state).await.unwrap();

        let restored = store.load().await.unwrap();
        assert_eq!(
            restored.entry(&region).unwrap().last_submitted_key.as_deref(),
            Some("k1")
        );
        assert_eq!(restored.last_failure, Some(FailureReason::TransientNetwork));
    }

    #[tokio::test]
    async fn test_save_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let store = FileStateStore::new(
            temp.path().join("nested/dir/state.json"),
            employee(),
        );
        store.save(&SyncState::new(employee())).await.unwrap();
        assert!(store.load().await.is_ok());
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        let store = FileStateStore::new(&path, employee());
        store.save(&SyncState::new(employee())).await.unwrap();

        assert!(path.exists());
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_interrupted_flush_preserves_committed_record() {
        // A crash between the temp write and the rename leaves a stray temp
        // file; the committed record must read back unchanged.
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        let store = FileStateStore::new(&path, employee());

        let mut state = SyncState::new(employee());
        let region = RegionId::new("hq").unwrap();
        state.entry_mut(&region).mark_submitted("k1".to_string());
        store.save(&state).await.unwrap();

        fs::write(store.temp_path(), b"{ half-written garbage").await.unwrap();

        let restored = store.load().await.unwrap();
        assert_eq!(
            restored.entry(&region).unwrap().last_submitted_key.as_deref(),
            Some("k1")
        );
    }

    #[tokio::test]
    async fn test_corrupt_state_file_is_persistence_failure() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        fs::write(&path, "not json").await.unwrap();

        let store = FileStateStore::new(&path, employee());
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }

    #[tokio::test]
    async fn test_memory_store_failure_injection() {
        let store = MemoryStateStore::new(employee());
        store.fail_loads(true);
        assert!(matches!(
            store.load().await.unwrap_err(),
            Error::Persistence(_)
        ));

        store.fail_loads(false);
        store.fail_saves(true);
        let state = store.load().await.unwrap();
        assert!(store.save(&state).await.is_err());
        assert_eq!(store.save_count(), 0);
    }
}
