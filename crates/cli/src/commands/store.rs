//! JSON-file key-value store.
//!
//! Stands in for browser local storage: one JSON object of string keys to
//! string values. Every write rewrites the file through a temporary sibling
//! and a rename, so a crash never leaves half a file behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use simple_valley_core::cart::{KeyValueStore, StoreError};
use tracing::debug;

/// A [`KeyValueStore`] persisted to a JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a
    /// JSON object of strings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                StoreError::Backend(format!("{} is not a valid store: {e}", path.display()))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), entries = entries.len(), "Store opened");
        Ok(Self { path, entries })
    }

    fn flush(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// A fresh path under the system temp directory.
    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("sv-cli-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let store = JsonFileStore::open(temp_path()).unwrap();
        assert_eq!(store.get("simpleValleyCart").unwrap(), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let path = temp_path();

        let mut store = JsonFileStore::open(&path).unwrap();
        store.set("simpleValleyPopupShown", "true").unwrap();
        drop(store);

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            store.get("simpleValleyPopupShown").unwrap().as_deref(),
            Some("true")
        );

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let path = temp_path();
        let mut store = JsonFileStore::open(&path).unwrap();

        store.remove("nothing-here").unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_rejects_non_object_file() {
        let path = temp_path();
        fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(matches!(
            JsonFileStore::open(&path),
            Err(StoreError::Backend(_))
        ));

        fs::remove_file(path).ok();
    }
}
