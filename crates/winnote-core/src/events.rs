//! Storage lifecycle events
//!
//! Managers report saves, loads, clears and failures to registered
//! listeners. Delivery is synchronous and in registration order; a listener
//! that panics is logged and skipped so the remaining listeners still run.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::models::now_millis;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageEventKind {
    Save,
    Load,
    Error,
    Clear,
}

impl fmt::Display for StorageEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StorageEventKind::Save => "save",
            StorageEventKind::Load => "load",
            StorageEventKind::Error => "error",
            StorageEventKind::Clear => "clear",
        };
        f.write_str(label)
    }
}

/// A single event delivered to listeners
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEvent {
    pub kind: StorageEventKind,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub key: Option<String>,
    pub error: Option<String>,
}

impl StorageEvent {
    pub fn new(kind: StorageEventKind) -> Self {
        Self {
            kind,
            timestamp: now_millis(),
            key: None,
            error: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Build an `Error` event carrying the failure message
    pub fn failure(error: impl fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(StorageEventKind::Error)
        }
    }
}

/// Handle returned by `add_listener`, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&StorageEvent) + Send + Sync>;

/// Registry of event listeners
#[derive(Default)]
pub struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Listener)>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StorageEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Unregister a listener; returns false if it was not registered
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deliver an event to every listener registered right now
    ///
    /// The list is snapshotted first, so listeners may add or remove
    /// listeners while being called.
    pub fn emit(&self, event: &StorageEvent) {
        let snapshot: Vec<Listener> = self
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!("Storage listener panicked while handling '{}' event", event.kind);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("count", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(listeners: &Listeners) -> Arc<Mutex<Vec<StorageEventKind>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        listeners.add(move |event| sink.lock().unwrap().push(event.kind));
        seen
    }

    #[test]
    fn test_emit_in_registration_order() {
        let listeners = Listeners::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            listeners.add(move |_| order.lock().unwrap().push(n));
        }

        listeners.emit(&StorageEvent::new(StorageEventKind::Save));

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_remove_listener() {
        let listeners = Listeners::new();
        let seen = recorder(&listeners);
        let id = listeners.add(|_| {});

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        assert_eq!(listeners.len(), 1);

        listeners.emit(&StorageEvent::new(StorageEventKind::Load));
        assert_eq!(*seen.lock().unwrap(), vec![StorageEventKind::Load]);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_delivery() {
        let listeners = Listeners::new();
        listeners.add(|_| panic!("listener bug"));
        let seen = recorder(&listeners);

        listeners.emit(&StorageEvent::new(StorageEventKind::Clear));

        assert_eq!(*seen.lock().unwrap(), vec![StorageEventKind::Clear]);
    }

    #[test]
    fn test_listener_can_register_during_emit() {
        let listeners = Arc::new(Listeners::new());
        let registry = Arc::clone(&listeners);
        listeners.add(move |_| {
            registry.add(|_| {});
        });

        listeners.emit(&StorageEvent::new(StorageEventKind::Save));

        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn test_failure_event_carries_message() {
        let event = StorageEvent::failure("disk full").with_key("app-data");

        assert_eq!(event.kind, StorageEventKind::Error);
        assert_eq!(event.error.as_deref(), Some("disk full"));
        assert_eq!(event.key.as_deref(), Some("app-data"));
        assert!(event.timestamp > 0);
    }
}
