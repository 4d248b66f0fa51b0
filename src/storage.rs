//! Key-value JSON persistence.
//!
//! Every stateful container reads and writes one named JSON document through
//! the [`Storage`] trait. The disk implementation keeps one file per key in
//! the data directory and writes atomically (temp file + rename) so a crash
//! never leaves a half-written collection behind. [`MemoryStorage`] backs
//! tests.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Well-known collection keys.
pub mod keys {
    pub const TASKS: &str = "tasks";
    pub const PROJECTS: &str = "projects";
    pub const CUSTOMERS: &str = "customers";
    pub const DEALS: &str = "deals";
    pub const INTERACTIONS: &str = "interactions";
    pub const POMODORO_SESSIONS: &str = "pomodoro-sessions";
    pub const POMODORO_SETTINGS: &str = "pomodoro-settings";
    pub const STREAK_DATA: &str = "streak-data";
    pub const DAILY_STATS: &str = "daily-stats";
    pub const SYNCED_TASKS: &str = "synced-tasks";
    pub const CALENDAR_EVENTS: &str = "calendar-events";
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document exists but does not parse. Callers that fall back
    /// to defaults can distinguish this from "no prior data" (`Ok(None)`).
    #[error("corrupt data under key '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize value for key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable key-value store for JSON documents.
///
/// Object-safe core: raw strings in and out. Typed access goes through
/// [`StorageExt`], which every `Storage` gets for free.
pub trait Storage: Send + Sync {
    /// `Ok(None)` means no document has ever been written under this key.
    fn load_raw(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn save_raw(&self, key: &str, json: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Typed load/save over any [`Storage`].
pub trait StorageExt {
    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError>;
    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError>;
}

impl<S: Storage + ?Sized> StorageExt for S {
    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.load_raw(key)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StorageError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json =
            serde_json::to_string_pretty(value).map_err(|source| StorageError::Serialize {
                key: key.to_string(),
                source,
            })?;
        self.save_raw(key, &json)
    }
}

/// How a store obtained its initial collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    /// Loaded from a previously persisted document.
    Persisted,
    /// No prior document; seeded with built-in sample data.
    Fresh,
    /// Prior document was unreadable; serving sample data instead.
    CorruptFallback,
}

/// Load a collection, falling back to `sample` when nothing was stored (the
/// sample is persisted back, matching first-run behavior) or when the stored
/// document is corrupt (logged, nothing overwritten).
pub fn load_or_sample<T>(
    storage: &dyn Storage,
    key: &str,
    sample: impl FnOnce() -> T,
) -> (T, DataOrigin)
where
    T: Serialize + DeserializeOwned,
{
    match storage.load::<T>(key) {
        Ok(Some(value)) => (value, DataOrigin::Persisted),
        Ok(None) => {
            let value = sample();
            if let Err(e) = storage.save(key, &value) {
                log::warn!("failed to seed '{}': {}", key, e);
            }
            (value, DataOrigin::Fresh)
        }
        Err(e) => {
            log::warn!("unreadable data under '{}', using sample data: {}", key, e);
            (sample(), DataOrigin::CorruptFallback)
        }
    }
}

// =============================================================================
// Disk implementation
// =============================================================================

/// One pretty-printed JSON file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Write via temp file + rename so readers never observe partial content.
    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("json.tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

impl Storage for JsonFileStorage {
    fn load_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn save_raw(&self, key: &str, json: &str) -> Result<(), StorageError> {
        self.write_atomic(&self.path_for(key), json.as_bytes())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

// =============================================================================
// In-memory implementation (tests, ephemeral sessions)
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: parking_lot::Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.inner.lock().get(key).cloned())
    }

    fn save_raw(&self, key: &str, json: &str) -> Result<(), StorageError> {
        self.inner.lock().insert(key.to_string(), json.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.lock().remove(key);
        Ok(())
    }
}
