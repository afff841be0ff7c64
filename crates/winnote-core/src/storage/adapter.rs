//! Storage adapter contract
//!
//! Every backend stores plain JSON values under string keys. Managers only
//! ever talk to `Arc<dyn StorageAdapter>`, so the backend is chosen once at
//! startup and can be swapped without touching them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::error::{StorageError, StorageResult};

/// Key-value storage backend
///
/// Implementations must:
/// - return `Ok(None)` from `get` for a missing key
/// - treat `delete` of a missing key as success
/// - only clear and list keys they own
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Short backend label, used in logs and status output
    fn name(&self) -> &'static str;

    /// Read a value
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Insert or overwrite a value
    async fn set(&self, key: &str, value: Value) -> StorageResult<()>;

    /// Remove a value (idempotent)
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Remove every key owned by this adapter
    async fn clear(&self) -> StorageResult<()>;

    /// Read every owned key and its value
    async fn get_all(&self) -> StorageResult<BTreeMap<String, Value>>;

    /// Write several values as one logical batch
    async fn set_multiple(&self, entries: BTreeMap<String, Value>) -> StorageResult<()>;

    /// List owned keys
    async fn keys(&self) -> StorageResult<Vec<String>>;

    /// Check whether a key is present
    async fn has(&self, key: &str) -> StorageResult<bool>;
}

/// Typed helpers on top of any adapter
#[async_trait]
pub trait AdapterExt: StorageAdapter {
    /// Read and deserialize a value
    async fn get_as<T>(&self, key: &str) -> StorageResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.get(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StorageError::serialization(key, e)),
            None => Ok(None),
        }
    }

    /// Serialize and write a value
    async fn set_as<T>(&self, key: &str, value: &T) -> StorageResult<()>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value).map_err(|e| StorageError::serialization(key, e))?;
        self.set(key, value).await
    }
}

impl<A: StorageAdapter + ?Sized> AdapterExt for A {}
