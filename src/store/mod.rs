//! Process-wide key/value storage for resume instructions and session ids.
//!
//! The store is deliberately dumb: string keys, string values, no logic.
//! `FileStore` keeps the map in `<state>/store.json` so it survives
//! restarts; `MemoryStore` is the in-process variant used by tests and
//! short-lived tools.

pub mod session;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

pub use session::Session;

/// Key holding the one-shot resume instruction
pub const RESUME_KEY: &str = "onboarding_resume";
/// Key holding the bearer token of a signed-in user
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Key holding the case currently being worked on
pub const CASE_ID_KEY: &str = "case_id";
/// Key holding the signed-in user's id
pub const USER_ID_KEY: &str = "user_id";

/// Errors raised by store backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access store file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {path} is not a valid JSON object: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("store lock poisoned")]
    Poisoned,
}

/// String key/value storage shared by the step controller and the bridge
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Read a key and delete it in the same call.
    fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self.get(key)?;
        if value.is_some() {
            self.remove(key)?;
        }
        Ok(value)
    }
}

/// JSON-file backed store
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// File name used inside the state directory
    pub const FILE_NAME: &'static str = "store.json";

    /// Open (or lazily create) the store inside `state_dir`
    pub fn open(state_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(state_dir).map_err(|source| StoreError::Io {
            path: state_dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: state_dir.join(Self::FILE_NAME),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(map).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, contents).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }

    fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        // Read and delete under one lock
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut map = self.read_map()?;
        let value = map.remove(key);
        if value.is_some() {
            self.write_map(&map)?;
        }
        Ok(value)
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-seeded with entries
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.entries.lock() {
            for (k, v) in entries {
                map.insert(k.to_string(), v.to_string());
            }
        }
        store
    }

    /// Whether a key is currently present
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|m| m.contains_key(key))
            .unwrap_or(false)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        map.remove(key);
        Ok(())
    }

    fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut map = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(map.remove(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();

        assert_eq!(store.get(CASE_ID_KEY).unwrap(), None);
        store.set(CASE_ID_KEY, "case-42").unwrap();
        assert_eq!(store.get(CASE_ID_KEY).unwrap().as_deref(), Some("case-42"));

        // A second handle over the same directory sees the same data
        let reopened = FileStore::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.get(CASE_ID_KEY).unwrap().as_deref(), Some("case-42"));
    }

    #[test]
    fn test_file_store_take_deletes() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();
        store.set(RESUME_KEY, "payment").unwrap();

        assert_eq!(store.take(RESUME_KEY).unwrap().as_deref(), Some("payment"));
        assert_eq!(store.take(RESUME_KEY).unwrap(), None);
        assert_eq!(store.get(RESUME_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();
        fs::write(store.path(), "{not json").unwrap();

        assert!(matches!(
            store.get(RESUME_KEY),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_file_store_remove_missing_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();
        store.remove("nothing-here").unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_memory_store_take() {
        let store = MemoryStore::with_entries([(RESUME_KEY, "voice")]);
        assert!(store.contains(RESUME_KEY));
        assert_eq!(store.take(RESUME_KEY).unwrap().as_deref(), Some("voice"));
        assert!(!store.contains(RESUME_KEY));
    }
}
