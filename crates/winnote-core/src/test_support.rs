//! Shared helpers for unit tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::events::StorageEvent;
use crate::storage::{KeyValueAdapter, MemoryStore, StorageAdapter, StorageResult};

/// Adapter wrapper that counts reads and writes
pub struct CountingAdapter {
    inner: Arc<dyn StorageAdapter>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingAdapter {
    pub fn new(inner: Arc<dyn StorageAdapter>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        })
    }

    /// Counting adapter over a fresh in-memory key-value store
    pub fn in_memory() -> Arc<Self> {
        Self::new(memory_adapter(&MemoryStore::new()))
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageAdapter for CountingAdapter {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn clear(&self) -> StorageResult<()> {
        self.inner.clear().await
    }

    async fn get_all(&self) -> StorageResult<BTreeMap<String, Value>> {
        self.inner.get_all().await
    }

    async fn set_multiple(&self, entries: BTreeMap<String, Value>) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_multiple(entries).await
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        self.inner.keys().await
    }

    async fn has(&self, key: &str) -> StorageResult<bool> {
        self.inner.has(key).await
    }
}

/// Adapter wrapper whose reads resolve only after `delay`
///
/// The value is read before the delay, so writes landing during it are
/// not reflected in the result.
pub struct SlowReadAdapter {
    inner: Arc<dyn StorageAdapter>,
    delay: Duration,
}

impl SlowReadAdapter {
    pub fn new(inner: Arc<dyn StorageAdapter>, delay: Duration) -> Arc<Self> {
        Arc::new(Self { inner, delay })
    }
}

#[async_trait]
impl StorageAdapter for SlowReadAdapter {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let value = self.inner.get(key).await;
        tokio::time::sleep(self.delay).await;
        value
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn clear(&self) -> StorageResult<()> {
        self.inner.clear().await
    }

    async fn get_all(&self) -> StorageResult<BTreeMap<String, Value>> {
        self.inner.get_all().await
    }

    async fn set_multiple(&self, entries: BTreeMap<String, Value>) -> StorageResult<()> {
        self.inner.set_multiple(entries).await
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        self.inner.keys().await
    }

    async fn has(&self, key: &str) -> StorageResult<bool> {
        self.inner.has(key).await
    }
}

/// Key-value adapter with the default prefix over `store`
pub fn memory_adapter(store: &MemoryStore) -> Arc<dyn StorageAdapter> {
    Arc::new(KeyValueAdapter::new(Arc::new(store.clone()), "win-note"))
}

/// Collects every event passed to it
pub fn event_log() -> (
    Arc<Mutex<Vec<StorageEvent>>>,
    impl Fn(&StorageEvent) + Send + Sync + 'static,
) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    (log, move |event: &StorageEvent| {
        sink.lock().unwrap().push(event.clone())
    })
}
