//! Synchronous string stores behind the key-value adapter
//!
//! A `KeyValueStore` is a flat, string-only map shared by everything in the
//! process. Several adapters with different prefixes may sit on the same
//! store, so stores never interpret keys.
//!
//! - `MemoryStore`: in-process map; clones share the same map
//! - `FileStore`: map persisted to a JSON file with atomic writes

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::error::{StorageError, StorageResult};

/// Synchronous, string-only key-value store
pub trait KeyValueStore: Send + Sync {
    /// Read a raw string value
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a raw string value
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a key (no error if absent)
    fn remove_item(&self, key: &str) -> StorageResult<()>;

    /// List every key in the store, across all namespaces
    fn item_keys(&self) -> StorageResult<Vec<String>>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process string store
///
/// Cloning a `MemoryStore` yields a handle to the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: Arc<Mutex<BTreeMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryStore {
    /// Create an empty, unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that rejects writes past `limit` bytes
    ///
    /// Size is counted as the sum of key and value lengths.
    pub fn with_quota(limit: usize) -> Self {
        Self {
            items: Arc::default(),
            quota: Some(limit),
        }
    }

    /// Total bytes used by keys and values
    pub fn used_bytes(&self) -> usize {
        lock(&self.items)
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    /// Number of items across all namespaces
    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(lock(&self.items).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut items = lock(&self.items);

        if let Some(limit) = self.quota {
            let current: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if current + key.len() + value.len() > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    limit,
                });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        lock(&self.items).remove(key);
        Ok(())
    }

    fn item_keys(&self) -> StorageResult<Vec<String>> {
        Ok(lock(&self.items).keys().cloned().collect())
    }
}

/// String store persisted to a single JSON file
///
/// The whole map is held in memory and rewritten atomically after every
/// mutation, so the file is never left half-written.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();

        let items = if path.exists() {
            let content =
                fs::read_to_string(&path).map_err(|e| StorageError::from_io(e, path.clone()))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| StorageError::CorruptStore {
                    path: path.clone(),
                    details: e.to_string(),
                })?
            }
        } else {
            BTreeMap::new()
        };

        debug!("Opened file store {:?} with {} item(s)", path, items.len());

        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(items)
            .map_err(|e| StorageError::serialization(self.path.display().to_string(), e))?;
        atomic_write(&self.path, &json)
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(lock(&self.items).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut items = lock(&self.items);
        let previous = items.insert(key.to_string(), value.to_string());

        if let Err(e) = self.persist(&items) {
            // Keep memory consistent with what is on disk
            match previous {
                Some(old) => items.insert(key.to_string(), old),
                None => items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let mut items = lock(&self.items);
        let Some(previous) = items.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&items) {
            items.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn item_keys(&self) -> StorageResult<Vec<String>> {
        Ok(lock(&self.items).keys().cloned().collect())
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
        }
    }

    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_clones_share_items() {
        let store = MemoryStore::new();
        let other = store.clone();

        store.set_item("a", "1").unwrap();
        assert_eq!(other.get_item("a").unwrap(), Some("1".to_string()));

        other.remove_item("a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_quota(10);

        store.set_item("k", "12345").unwrap();
        // Overwriting the same key only counts the new value
        store.set_item("k", "123456789").unwrap();

        let err = store.set_item("other", "12345").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { limit: 10, .. }));
        assert_eq!(store.used_bytes(), 10);
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.set_item("win-note:app-data", "{}").unwrap();
            store.set_item("other:key", "\"x\"").unwrap();
            store.remove_item("other:key").unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(
            store.get_item("win-note:app-data").unwrap(),
            Some("{}".to_string())
        );
        assert_eq!(store.item_keys().unwrap(), vec!["win-note:app-data"]);
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path().join("nope.json")).unwrap();

        assert!(store.item_keys().unwrap().is_empty());
        assert!(store.get_item("anything").unwrap().is_none());
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        fs::write(&path, "not json at all").unwrap();

        let err = FileStore::open(&path).unwrap_err();
        assert!(matches!(err, StorageError::CorruptStore { .. }));
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("a").join("b").join("file.json");

        atomic_write(&nested_path, b"test data").unwrap();

        assert!(nested_path.exists());
        assert!(!nested_path.with_extension("tmp").exists());
        assert_eq!(fs::read_to_string(&nested_path).unwrap(), "test data");
    }
}
