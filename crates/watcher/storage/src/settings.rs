use crate::{Metrics, SettingsStore, StorageError};
use paywatch_metrics::observe_call;
use serde_json::Value;
use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, RwLock},
};
use tracing::{debug, error};

/// Settings kept in memory only. Used in tests and when no data directory is configured.
#[derive(Debug, Default)]
pub struct MemorySettings {
    records: RwLock<HashMap<String, Value>>,
}

impl MemorySettings {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        records.insert(key.to_string(), value);
        Ok(())
    }
}

/// Settings persisted as one JSON file per key below a directory.
///
/// Writes go to a temporary file which is then renamed over the record, so a crash never leaves
/// a truncated record behind.
#[derive(Debug)]
pub struct FileSettings {
    dir: PathBuf,
    metrics_enabled: bool,
    write_lock: Mutex<()>,
}

impl FileSettings {
    /// Opens the store at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).inspect_err(|err| {
            error!(target: "paywatch::storage", %err, dir = %dir.display(), "Failed to create settings directory");
        })?;
        Ok(Self { dir, metrics_enabled: false, write_lock: Mutex::new(()) })
    }

    /// Enables call metrics.
    pub fn with_metrics(mut self) -> Self {
        Metrics::init();
        self.metrics_enabled = true;
        self
    }

    fn path_of(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty() &&
            key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn observe<T, F: FnOnce() -> Result<T, StorageError>>(
        &self,
        call: &'static str,
        f: F,
    ) -> Result<T, StorageError> {
        if self.metrics_enabled {
            observe_call!(
                Metrics::SETTINGS_CALLS_TOTAL,
                Metrics::SETTINGS_CALL_DURATION_SECONDS,
                call,
                f()
            )
        } else {
            f()
        }
    }

    fn read(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.path_of(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn write(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let path = self.path_of(key)?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(value)?;

        let _guard = self.write_lock.lock().map_err(|_| StorageError::LockPoisoned)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        debug!(target: "paywatch::storage", key, "Settings record written");
        Ok(())
    }
}

impl SettingsStore for FileSettings {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.observe(Metrics::CALL_GET, || self.read(key)).inspect_err(|err| {
            error!(target: "paywatch::storage", key, %err, "Failed to read settings record");
        })
    }

    fn put(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.observe(Metrics::CALL_PUT, || self.write(key, &value)).inspect_err(|err| {
            error!(target: "paywatch::storage", key, %err, "Failed to write settings record");
        })
    }
}
