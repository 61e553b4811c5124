//! Durable backends for the state snapshot.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use marquee_common::{Snapshot, StateError};
use tracing::{debug, warn};

/// Where the State Manager keeps its document of record.
///
/// `store` must not return until the snapshot is durable; the manager only
/// commits a mutation in memory after it succeeds.
pub trait Storage: Send + Sync {
    fn load(&self) -> Result<Option<Snapshot>, StateError>;

    fn store(&self, snapshot: &Snapshot) -> Result<(), StateError>;
}

/// Keeps the snapshot in memory. Used by tests and `--ephemeral` hosts.
#[derive(Default)]
pub struct MemoryStorage {
    snapshot: Mutex<Option<Snapshot>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    /// The last stored snapshot.
    pub fn stored(&self) -> Option<Snapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Option<Snapshot>, StateError> {
        Ok(self.stored())
    }

    fn store(&self, snapshot: &Snapshot) -> Result<(), StateError> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        Ok(())
    }
}

/// JSON file on disk, replaced atomically on every store.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn load(&self) -> Result<Option<Snapshot>, StateError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No state file yet");
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            StateError::Storage(format!("failed to read {}: {e}", self.path.display()))
        })?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let snapshot = serde_json::from_str(&content).map_err(|e| {
            StateError::Serialize(format!("failed to parse {}: {e}", self.path.display()))
        })?;
        Ok(Some(snapshot))
    }

    fn store(&self, snapshot: &Snapshot) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| StateError::Serialize(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StateError::Storage(format!(
                    "failed to create state directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| {
            StateError::Storage(format!("failed to write {}: {e}", tmp_path.display()))
        })?;

        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            warn!("atomic rename failed ({}), falling back to direct write", e);
            std::fs::write(&self.path, &json).map_err(|e2| {
                StateError::Storage(format!("failed to write {}: {e2}", self.path.display()))
            })?;
        }

        debug!(path = %self.path.display(), "State persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_common::NamespaceSnapshot;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        let mut ns = NamespaceSnapshot::default();
        ns.state.insert("todos".into(), json!([{ "id": 1 }]));
        let mut snapshot = Snapshot::new();
        snapshot.insert("widgets.todo".into(), ns);
        snapshot
    }

    #[test]
    fn memory_storage_starts_empty() {
        assert!(MemoryStorage::new().load().unwrap().is_none());
    }

    #[test]
    fn file_storage_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("state.json"));
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn file_storage_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deep").join("state.json");
        let storage = FileStorage::new(&path);

        storage.store(&sample()).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(storage.load().unwrap(), Some(sample()));
    }

    #[test]
    fn file_storage_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = FileStorage::new(&path).load().unwrap_err();
        assert!(matches!(err, StateError::Serialize(_)));
    }

    #[test]
    fn file_storage_store_into_a_file_path_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let storage = FileStorage::new(blocker.join("state.json"));
        assert!(matches!(
            storage.store(&sample()).unwrap_err(),
            StateError::Storage(_)
        ));
    }
}
