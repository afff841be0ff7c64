//! Whole-document storage manager
//!
//! `StorageManager` owns the in-memory `StoredDocument` and persists it as a
//! single value under `app-data`. Changes are signalled explicitly through
//! `update_*`, `mutate` or `mark_dirty`; with autosave enabled those signals
//! feed the debounce task, and a periodic task saves on a fixed cadence.
//!
//! ## Failure handling
//!
//! | Operation | On failure |
//! |---|---|
//! | `initialize` | `Error` event, continue with defaults, returns `Ok` |
//! | `load` | `Error` event, memory untouched, returns `Err` |
//! | `save` / `clear` | `Error` event, returns `Err` |

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::autosave::{spawn_autosave, AutoSaveHandle, SaveTarget};
use crate::events::{ListenerId, Listeners, StorageEvent, StorageEventKind};
use crate::models::{
    now_millis, PartialDocument, Section, SectionKind, StoredDocument, DEFAULT_DATA_VERSION,
};
use crate::storage::{AdapterExt, StorageAdapter, StorageError, StorageResult, APP_DATA_KEY};

/// Default key namespace
pub const DEFAULT_PREFIX: &str = "win-note";

/// Default autosave interval
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_millis(3000);

/// Manager configuration
#[derive(Clone)]
pub struct StorageConfig {
    pub adapter: Arc<dyn StorageAdapter>,
    /// Namespace label, informational once the adapter is built
    pub prefix: String,
    /// Data version stamped on new documents
    pub version: String,
    pub auto_save: bool,
    pub save_interval: Duration,
    pub periodic_save: bool,
}

impl StorageConfig {
    /// Configuration with defaults and autosave off
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            adapter,
            prefix: DEFAULT_PREFIX.to_string(),
            version: DEFAULT_DATA_VERSION.to_string(),
            auto_save: false,
            save_interval: DEFAULT_SAVE_INTERVAL,
            periodic_save: true,
        }
    }

    /// Enable autosave with the given interval
    pub fn with_auto_save(mut self, interval: Duration, periodic: bool) -> Self {
        self.auto_save = true;
        self.save_interval = interval;
        self.periodic_save = periodic;
        self
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("adapter", &self.adapter.name())
            .field("prefix", &self.prefix)
            .field("version", &self.version)
            .field("auto_save", &self.auto_save)
            .field("save_interval", &self.save_interval)
            .field("periodic_save", &self.periodic_save)
            .finish()
    }
}

struct Inner {
    config: StorageConfig,
    document: Mutex<StoredDocument>,
    initialized: AtomicBool,
    init: OnceCell<()>,
    listeners: Listeners,
    autosave: Mutex<Option<AutoSaveHandle>>,
}

impl Inner {
    fn document(&self) -> MutexGuard<'_, StoredDocument> {
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn autosave_slot(&self) -> MutexGuard<'_, Option<AutoSaveHandle>> {
        self.autosave.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: StorageEvent) {
        self.listeners.emit(&event);
    }

    fn report(&self, context: &str, err: &StorageError) {
        warn!("{}: {}", context, err);
        self.emit(StorageEvent::failure(err).with_key(APP_DATA_KEY));
    }

    async fn read_stored(&self) -> StorageResult<Option<PartialDocument>> {
        self.config
            .adapter
            .get_as::<PartialDocument>(APP_DATA_KEY)
            .await
    }

    async fn save(&self) -> StorageResult<()> {
        let snapshot = {
            let mut doc = self.document();
            doc.version.timestamp = now_millis();
            serde_json::to_value(&*doc)
        };

        let result = match snapshot {
            Ok(value) => self.config.adapter.set(APP_DATA_KEY, value).await,
            Err(e) => Err(StorageError::serialization(APP_DATA_KEY, e)),
        };

        match result {
            Ok(()) => {
                debug!("Saved document to {} storage", self.config.adapter.name());
                self.emit(StorageEvent::new(StorageEventKind::Save).with_key(APP_DATA_KEY));
                Ok(())
            }
            Err(e) => {
                self.report("Failed to save document", &e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl SaveTarget for Inner {
    async fn autosave(&self) {
        // Already logged and reported as an event by `save`
        let _ = self.save().await;
    }
}

/// Owner of the persisted application document
///
/// Cloning yields another handle to the same manager.
#[derive(Clone)]
pub struct StorageManager {
    inner: Arc<Inner>,
}

impl StorageManager {
    /// Create a manager with a default document; performs no I/O
    pub fn new(config: StorageConfig) -> Self {
        let document = StoredDocument::new(config.version.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                document: Mutex::new(document),
                initialized: AtomicBool::new(false),
                init: OnceCell::new(),
                listeners: Listeners::new(),
                autosave: Mutex::new(None),
            }),
        }
    }

    /// Load the stored document and start autosave
    ///
    /// Runs once per manager; concurrent callers wait for the first run.
    /// A failed read is reported as an `Error` event and the manager
    /// carries on with the defaults.
    pub async fn initialize(&self) -> StorageResult<()> {
        self.inner
            .init
            .get_or_init(|| self.initialize_once())
            .await;
        Ok(())
    }

    async fn initialize_once(&self) {
        let loaded = match self.inner.read_stored().await {
            Ok(Some(stored)) => {
                self.inner.document().merge(stored);
                true
            }
            Ok(None) => true,
            Err(e) => {
                self.inner
                    .report("Failed to read stored document, using defaults", &e);
                false
            }
        };

        self.start_autosave();
        self.inner.initialized.store(true, Ordering::SeqCst);
        info!(
            "Storage initialized ({} backend, autosave {})",
            self.inner.config.adapter.name(),
            if self.inner.config.auto_save { "on" } else { "off" }
        );

        if loaded {
            self.inner
                .emit(StorageEvent::new(StorageEventKind::Load).with_key(APP_DATA_KEY));
        }
    }

    /// Persist the whole document
    pub async fn save(&self) -> StorageResult<()> {
        self.inner.save().await
    }

    /// Re-read the stored document and merge it over memory
    ///
    /// A missing document is not an error and emits nothing.
    pub async fn load(&self) -> StorageResult<()> {
        match self.inner.read_stored().await {
            Ok(Some(stored)) => {
                self.inner.document().merge(stored);
                self.inner
                    .emit(StorageEvent::new(StorageEventKind::Load).with_key(APP_DATA_KEY));
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                self.inner.report("Failed to load document", &e);
                Err(e)
            }
        }
    }

    /// Remove everything in the adapter's namespace and reset to defaults
    pub async fn clear(&self) -> StorageResult<()> {
        match self.inner.config.adapter.clear().await {
            Ok(()) => {
                *self.inner.document() = StoredDocument::new(self.inner.config.version.clone());
                info!("Cleared {} storage", self.inner.config.adapter.name());
                self.inner.emit(StorageEvent::new(StorageEventKind::Clear));
                Ok(())
            }
            Err(e) => {
                self.inner.report("Failed to clear storage", &e);
                Err(e)
            }
        }
    }

    /// Deep copy of the current document
    pub fn export_data(&self) -> StoredDocument {
        self.inner.document().clone()
    }

    /// Merge `data` over the document and save immediately
    pub async fn import_data(&self, data: impl Into<PartialDocument>) -> StorageResult<()> {
        self.inner.document().merge(data.into());
        self.save().await
    }

    /// Snapshot of one section
    pub fn section(&self, kind: SectionKind) -> Section {
        self.inner.document().section(kind).clone()
    }

    /// Replace one section and mark the document dirty
    pub fn update_section(&self, kind: SectionKind, section: Section) {
        *self.inner.document().section_mut(kind) = section;
        self.mark_dirty();
    }

    pub fn get_notes(&self) -> Section {
        self.section(SectionKind::Notes)
    }

    pub fn get_folders(&self) -> Section {
        self.section(SectionKind::Folders)
    }

    pub fn get_tags(&self) -> Section {
        self.section(SectionKind::Tags)
    }

    pub fn get_settings(&self) -> Section {
        self.section(SectionKind::Settings)
    }

    pub fn get_state(&self) -> Section {
        self.section(SectionKind::State)
    }

    pub fn update_notes(&self, notes: Section) {
        self.update_section(SectionKind::Notes, notes);
    }

    pub fn update_folders(&self, folders: Section) {
        self.update_section(SectionKind::Folders, folders);
    }

    pub fn update_tags(&self, tags: Section) {
        self.update_section(SectionKind::Tags, tags);
    }

    pub fn update_settings(&self, settings: Section) {
        self.update_section(SectionKind::Settings, settings);
    }

    pub fn update_state(&self, state: Section) {
        self.update_section(SectionKind::State, state);
    }

    /// Edit the document in place and mark it dirty
    pub fn mutate<R>(&self, f: impl FnOnce(&mut StoredDocument) -> R) -> R {
        let result = {
            let mut doc = self.inner.document();
            f(&mut doc)
        };
        self.mark_dirty();
        result
    }

    /// Signal that the document changed
    ///
    /// Ignored before initialization or when autosave is off.
    pub fn mark_dirty(&self) {
        if !self.is_initialized() {
            return;
        }
        if let Some(handle) = self.inner.autosave_slot().as_ref() {
            handle.notify_changed();
        }
    }

    /// Register a listener for storage events
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StorageEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Stop autosave and drop every listener
    ///
    /// Waits for a save already in progress to finish.
    pub async fn destroy(&self) {
        let handle = self.inner.autosave_slot().take();
        if let Some(handle) = handle {
            handle.join().await;
            debug!("Autosave stopped");
        }
        self.inner.listeners.clear();
    }

    /// The shared adapter, for building sibling managers
    pub fn adapter(&self) -> Arc<dyn StorageAdapter> {
        Arc::clone(&self.inner.config.adapter)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.inner.config
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    fn start_autosave(&self) {
        let config = &self.inner.config;
        if !config.auto_save {
            return;
        }

        let mut slot = self.inner.autosave_slot();
        if slot.is_none() {
            *slot = Some(spawn_autosave(
                Arc::downgrade(&self.inner),
                config.save_interval,
                config.periodic_save,
            ));
        }
    }
}

impl fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageManager")
            .field("config", &self.inner.config)
            .field("initialized", &self.is_initialized())
            .field("listeners", &self.inner.listeners)
            .finish()
    }
}
