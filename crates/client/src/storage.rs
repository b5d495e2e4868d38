//! Key/value persistence for client state that must survive restarts.
//!
//! The cart and the session are stored as JSON documents under fixed keys.
//! Reads are forgiving: a missing key, an empty value, the literal strings
//! `undefined` / `null`, or malformed JSON all read as "nothing stored", and a
//! malformed value is removed so the next read starts clean. Writes never
//! fail the caller; errors are logged.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Storage keys.
pub mod keys {
    /// The persisted cart (JSON array of cart lines).
    pub const CART: &str = "cart";

    /// The signed-in session.
    pub const SESSION: &str = "session";
}

/// Raw string storage keyed by name.
pub trait KeyValueStorage: Send + Sync {
    /// Read the value under `key`, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the value exists but cannot be read.
    fn read(&self, key: &str) -> io::Result<Option<String>>;

    /// Replace the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the value cannot be written.
    fn write(&self, key: &str, value: &str) -> io::Result<()>;

    /// Delete the value under `key`. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the value exists but cannot be removed.
    fn remove(&self, key: &str) -> io::Result<()>;
}

// =============================================================================
// File storage
// =============================================================================

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// concurrent reader sees either the old or the new document. Two processes
/// writing the same key race with last-writer-wins.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStorage for FileStorage {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let tmp = self
            .dir
            .join(format!(".{key}.{}.tmp", uuid::Uuid::new_v4().simple()));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, self.path(key)).inspect_err(|_| {
            let _ = std::fs::remove_file(&tmp);
        })
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Memory storage
// =============================================================================

/// In-process storage, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}

// =============================================================================
// JSON helpers
// =============================================================================

/// Read and decode the JSON document under `key`.
///
/// Never fails: anything that is not a well-formed `T` reads as `None`.
pub fn read_json<T: DeserializeOwned>(storage: &dyn KeyValueStorage, key: &str) -> Option<T> {
    let raw = match storage.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read stored value");
            return None;
        }
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "undefined" || trimmed == "null" {
        return None;
    }

    match serde_json::from_str(trimmed) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding malformed stored value");
            if let Err(e) = storage.remove(key) {
                tracing::warn!(key, error = %e, "Failed to remove malformed stored value");
            }
            None
        }
    }
}

/// Encode `value` as JSON and store it under `key`. Errors are logged.
pub fn write_json<T: Serialize + ?Sized>(storage: &dyn KeyValueStorage, key: &str, value: &T) {
    let encoded = match serde_json::to_string(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::error!(key, error = %e, "Failed to encode value for storage");
            return;
        }
    };
    if let Err(e) = storage.write(key, &encoded) {
        tracing::error!(key, error = %e, "Failed to write stored value");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("campus-eats-storage-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_read_json_missing_key() {
        let storage = MemoryStorage::new();
        assert_eq!(read_json::<Vec<u32>>(&storage, "cart"), None);
    }

    #[test]
    fn test_read_json_sentinel_strings() {
        let storage = MemoryStorage::new();
        for raw in ["", "  ", "undefined", "null"] {
            storage.write("cart", raw).unwrap();
            assert_eq!(read_json::<Vec<u32>>(&storage, "cart"), None, "raw: {raw:?}");
        }
    }

    #[test]
    fn test_read_json_malformed_is_removed() {
        let storage = MemoryStorage::new();
        storage.write("cart", "[1, 2,").unwrap();
        assert_eq!(read_json::<Vec<u32>>(&storage, "cart"), None);
        assert_eq!(storage.read("cart").unwrap(), None);
    }

    #[test]
    fn test_write_then_read() {
        let storage = MemoryStorage::new();
        write_json(&storage, "cart", &vec![1u32, 2, 3]);
        assert_eq!(read_json::<Vec<u32>>(&storage, "cart"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = temp_dir();
        let storage = FileStorage::new(&dir);

        assert_eq!(storage.read("cart").unwrap(), None);
        storage.write("cart", "[]").unwrap();
        assert_eq!(storage.read("cart").unwrap().as_deref(), Some("[]"));
        assert!(dir.join("cart.json").exists());

        storage.write("cart", "[1]").unwrap();
        assert_eq!(storage.read("cart").unwrap().as_deref(), Some("[1]"));

        storage.remove("cart").unwrap();
        storage.remove("cart").unwrap();
        assert_eq!(storage.read("cart").unwrap(), None);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
