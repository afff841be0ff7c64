//! Prefix-namespaced adapter over a synchronous string store
//!
//! Logical key `k` is stored as `"<prefix>:k"` and values are kept as JSON
//! text. The backing store is shared with other namespaces, so `clear`,
//! `get_all` and `keys` always filter the full key list down to this
//! adapter's prefix before acting.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::adapter::StorageAdapter;
use super::backing::KeyValueStore;
use super::error::{StorageError, StorageResult};

/// Storage adapter over a `KeyValueStore`
#[derive(Clone)]
pub struct KeyValueAdapter {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl KeyValueAdapter {
    /// Create an adapter that owns every key under `prefix`
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// The namespace prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    /// Strip this adapter's namespace, or `None` if the key belongs elsewhere
    fn logical<'a>(&self, raw: &'a str) -> Option<&'a str> {
        raw.strip_prefix(self.prefix.as_str())?.strip_prefix(':')
    }

    fn owned_keys(&self) -> StorageResult<Vec<(String, String)>> {
        Ok(self
            .store
            .item_keys()?
            .into_iter()
            .filter_map(|raw| {
                let logical = self.logical(&raw)?.to_string();
                Some((raw, logical))
            })
            .collect())
    }

    fn decode(key: &str, text: &str) -> StorageResult<Value> {
        serde_json::from_str(text).map_err(|e| StorageError::serialization(key, e))
    }
}

#[async_trait]
impl StorageAdapter for KeyValueAdapter {
    fn name(&self) -> &'static str {
        "key-value"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        match self.store.get_item(&self.namespaced(key))? {
            Some(text) => Self::decode(key, &text).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let text = serde_json::to_string(&value).map_err(|e| StorageError::serialization(key, e))?;
        debug!("{}: set {} ({} bytes)", self.prefix, key, text.len());
        self.store.set_item(&self.namespaced(key), &text)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.store.remove_item(&self.namespaced(key))
    }

    async fn clear(&self) -> StorageResult<()> {
        let owned = self.owned_keys()?;
        debug!("{}: clearing {} key(s)", self.prefix, owned.len());
        for (raw, _) in owned {
            self.store.remove_item(&raw)?;
        }
        Ok(())
    }

    async fn get_all(&self) -> StorageResult<BTreeMap<String, Value>> {
        let mut result = BTreeMap::new();
        for (raw, logical) in self.owned_keys()? {
            // A key can vanish between listing and reading
            if let Some(text) = self.store.get_item(&raw)? {
                let value = Self::decode(&logical, &text)?;
                result.insert(logical, value);
            }
        }
        Ok(result)
    }

    async fn set_multiple(&self, entries: BTreeMap<String, Value>) -> StorageResult<()> {
        // The backing store has no multi-key transactions
        for (key, value) in entries {
            self.set(&key, value).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .owned_keys()?
            .into_iter()
            .map(|(_, logical)| logical)
            .collect())
    }

    async fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.store.get_item(&self.namespaced(key))?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backing::MemoryStore;
    use serde_json::json;

    fn adapter_on(store: &MemoryStore, prefix: &str) -> KeyValueAdapter {
        KeyValueAdapter::new(Arc::new(store.clone()), prefix)
    }

    #[tokio::test]
    async fn test_set_get_round_trip() {
        let store = MemoryStore::new();
        let adapter = adapter_on(&store, "win-note");

        adapter
            .set("app-data", json!({"notes": {"n1": {"id": "n1"}}}))
            .await
            .unwrap();

        let value = adapter.get("app-data").await.unwrap().unwrap();
        assert_eq!(value["notes"]["n1"]["id"], "n1");

        // Stored under the namespaced key as JSON text
        let raw = store.get_item("win-note:app-data").unwrap().unwrap();
        assert!(raw.starts_with('{'));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let adapter = adapter_on(&MemoryStore::new(), "win-note");

        assert!(adapter.get("missing").await.unwrap().is_none());
        assert!(!adapter.has("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let adapter = adapter_on(&MemoryStore::new(), "win-note");

        adapter.delete("never-written").await.unwrap();
        adapter.set("k", json!(1)).await.unwrap();
        adapter.delete("k").await.unwrap();
        adapter.delete("k").await.unwrap();

        assert!(!adapter.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_namespace_isolation() {
        let store = MemoryStore::new();
        let first = adapter_on(&store, "p1");
        let second = adapter_on(&store, "p2");

        first.set("k", json!("one")).await.unwrap();
        second.set("other", json!("two")).await.unwrap();

        assert!(second.get("k").await.unwrap().is_none());
        assert_eq!(second.keys().await.unwrap(), vec!["other"]);

        second.clear().await.unwrap();
        assert_eq!(first.get("k").await.unwrap(), Some(json!("one")));
        assert!(second.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_similar_prefix_is_not_owned() {
        let store = MemoryStore::new();
        let short = adapter_on(&store, "win");
        let long = adapter_on(&store, "win-note");

        long.set("k", json!(true)).await.unwrap();

        // "win-note:k" starts with "win" but not with "win:"
        assert!(short.keys().await.unwrap().is_empty());
        short.clear().await.unwrap();
        assert!(long.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_all_and_set_multiple() {
        let store = MemoryStore::new();
        let adapter = adapter_on(&store, "win-note");
        store.set_item("unrelated", "\"x\"").unwrap();

        let entries = BTreeMap::from([
            ("a".to_string(), json!(1)),
            ("b".to_string(), json!({"nested": [1, 2]})),
        ]);
        adapter.set_multiple(entries.clone()).await.unwrap();

        assert_eq!(adapter.get_all().await.unwrap(), entries);
        assert_eq!(adapter.keys().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_invalid_json_is_serialization_error() {
        let store = MemoryStore::new();
        store.set_item("win-note:broken", "{oops").unwrap();
        let adapter = adapter_on(&store, "win-note");

        let err = adapter.get("broken").await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_quota_failure_surfaces() {
        let store = MemoryStore::with_quota(32);
        let adapter = adapter_on(&store, "win-note");

        let err = adapter
            .set("app-data", json!({"content": "x".repeat(64)}))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
    }
}
