//! Persistent key-value storage for client state.
//!
//! The guest cart and the auth tokens are kept as small JSON documents
//! under fixed keys. [`FileStore`] keeps one file per key in a state
//! directory; [`MemoryStore`] keeps everything in process.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// Errors that can occur when reading or writing stored state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be (de)serialized.
    #[error("Storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Key contains characters that cannot be used as a file name.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// A string-keyed store of JSON values.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Replace the value under a key.
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be written.
    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError>;

    /// Delete a key. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// =============================================================================
// FileStore
// =============================================================================

/// One `<key>.json` file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let path = self.path_for(key)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-process store, lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("state")).unwrap();

        assert!(store.get("guest_cart").unwrap().is_none());
        store.set("guest_cart", &json!([{"id": 1}])).unwrap();
        assert_eq!(store.get("guest_cart").unwrap(), Some(json!([{"id": 1}])));

        store.remove("guest_cart").unwrap();
        assert!(store.get("guest_cart").unwrap().is_none());
        store.remove("guest_cart").unwrap();
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.set("../escape", &json!(1)),
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_file_store_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("guest_cart.json"), b"{not json").unwrap();
        assert!(matches!(store.get("guest_cart"), Err(StoreError::Serde(_))));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.set("access_token", &json!("abc")).unwrap();
        assert_eq!(store.get("access_token").unwrap(), Some(json!("abc")));
        store.remove("access_token").unwrap();
        assert!(store.get("access_token").unwrap().is_none());
    }
}
