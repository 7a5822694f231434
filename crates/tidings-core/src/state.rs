//! Persistence for pipeline state.
//!
//! Two independent records live behind the [`StateStore`] interface:
//! [`SEEN_KEY`] (the dedup key list) and [`LAST_RUN_KEY`] (the run gate
//! timestamp). [`JsonFileStore`] keeps each record in its own JSON file so
//! that corruption of one never affects the other.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::AppError;
use crate::traits::StateStore;

/// Record holding the ordered list of published dedup keys.
pub const SEEN_KEY: &str = "seen";

/// Record holding the timestamp of the last cycle that ran.
pub const LAST_RUN_KEY: &str = "last_run";

#[derive(Debug, Default)]
struct FileStoreInner {
    cache: HashMap<String, serde_json::Value>,
    dirty: HashSet<String>,
}

/// File-backed store: one `<dir>/<key>.json` file per record.
///
/// Writes are buffered until [`flush`](StateStore::flush), which replaces
/// each dirty file atomically (temp file + rename).
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    inner: Arc<Mutex<FileStoreInner>>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            inner: Arc::new(Mutex::new(FileStoreInner::default())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn lock_inner(&self) -> MutexGuard<'_, FileStoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(dir = %self.dir.display(), "Recovered from poisoned state lock");
            poisoned.into_inner()
        })
    }

    /// Remove a record from disk and from the cache.
    pub fn remove(&self, key: &str) -> Result<(), AppError> {
        validate_key(key)?;
        let mut inner = self.lock_inner();
        inner.cache.remove(key);
        inner.dirty.remove(key);
        match fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::StateError(format!(
                "Failed to remove {}: {e}",
                self.record_path(key).display()
            ))),
        }
    }

    fn write_record(&self, key: &str, value: &serde_json::Value) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::StateError(format!(
                "Failed to create state dir {}: {e}",
                self.dir.display()
            ))
        })?;

        let path = self.record_path(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        let body = serde_json::to_vec_pretty(value)?;

        // The temp file must be on disk before the rename publishes it.
        write_synced(&tmp, &body)
            .map_err(|e| AppError::StateError(format!("Failed to write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path).map_err(|e| {
            AppError::StateError(format!("Failed to replace {}: {e}", path.display()))
        })?;

        tracing::debug!(path = %path.display(), "State record written");
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AppError> {
        validate_key(key)?;
        let mut inner = self.lock_inner();
        if let Some(value) = inner.cache.get(key) {
            return Ok(Some(value.clone()));
        }

        let path = self.record_path(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::StateError(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let value: serde_json::Value = serde_json::from_str(&raw)?;
        inner.cache.insert(key.to_string(), value.clone());
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), AppError> {
        validate_key(key)?;
        let mut inner = self.lock_inner();
        inner.cache.insert(key.to_string(), value);
        inner.dirty.insert(key.to_string());
        Ok(())
    }

    fn flush(&self) -> Result<(), AppError> {
        let mut inner = self.lock_inner();
        let mut keys: Vec<String> = inner.dirty.iter().cloned().collect();
        keys.sort();

        for key in keys {
            if let Some(value) = inner.cache.get(&key) {
                self.write_record(&key, value)?;
            }
            inner.dirty.remove(&key);
        }
        Ok(())
    }
}

/// In-memory store, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<String, serde_json::Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, serde_json::Value>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of a record, bypassing the trait (for assertions).
    pub fn snapshot(&self, key: &str) -> Option<serde_json::Value> {
        self.lock().get(key).cloned()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AppError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), AppError> {
        self.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn flush(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Keys become file names, so only a conservative character set is allowed.
fn write_synced(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(body)?;
    file.sync_all()
}

fn validate_key(key: &str) -> Result<(), AppError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::StateError(format!("Invalid state key '{key}'")))
    }
}
