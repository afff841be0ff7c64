//! Unified storage interface
//!
//! The `Store` reads the configuration, picks a storage backend and owns the
//! two managers that share it:
//! - `StorageManager` for the application document (folders, tags,
//!   settings, state)
//! - `NoteStorageManager` for notes, split into metadata and content
//!
//! ## Backend selection
//!
//! `auto` probes SQLite at the configured path and falls back to the
//! file-backed key-value store when the database cannot be used. The probe
//! runs before anything is read, so a broken backend never surfaces as a
//! failed first operation.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::open().await?;
//!
//! let mut note = Note::new(generate_id(IdKind::Note), "Groceries");
//! note.content = Some("<p>Milk</p>".into());
//! store.save_note(&note).await?;
//!
//! let notes = store.list_notes();
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::cleaner::{clean_metadata, clean_storage, CleanReport};
use crate::config::{Backend, Config};
use crate::manager::StorageManager;
use crate::models::{Note, NoteMetadata, PartialDocument, Section, StoredDocument};
use crate::notes::NoteStorageManager;
use crate::storage::{FileStore, KeyValueAdapter, MemoryStore, SqliteAdapter, StorageAdapter};

/// Everything the store holds, in one serializable value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportBundle {
    pub document: StoredDocument,
    /// Split-path notes with their content
    pub notes: BTreeMap<String, Note>,
}

/// Data accepted by `Store::import`
#[derive(Debug, Clone, Default)]
pub struct ImportBundle {
    pub document: Option<PartialDocument>,
    pub notes: BTreeMap<String, Note>,
}

impl ImportBundle {
    /// Parse either an export bundle or a bare document
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            bail!("Import data must be a JSON object");
        };

        if !map.contains_key("document") {
            let document: PartialDocument = serde_json::from_value(Value::Object(map))
                .context("Failed to parse document")?;
            return Ok(Self {
                document: Some(document),
                notes: BTreeMap::new(),
            });
        }

        let document = match map.remove("document") {
            Some(Value::Null) | None => None,
            Some(doc) => Some(serde_json::from_value(doc).context("Failed to parse document")?),
        };
        let notes = match map.remove("notes") {
            Some(Value::Null) | None => BTreeMap::new(),
            Some(notes) => serde_json::from_value(notes).context("Failed to parse notes")?,
        };

        Ok(Self { document, notes })
    }
}

/// Outcome of moving legacy document notes to the split path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Ids moved to the split path
    pub moved: Vec<String>,
    /// Ids already on the split path; the legacy copy was dropped
    pub duplicates: Vec<String>,
    /// Ids whose records could not be read as notes; left in place
    pub unreadable: Vec<String>,
}

/// Open the adapter selected by the configuration
pub fn open_adapter(config: &Config) -> Result<Arc<dyn StorageAdapter>> {
    match config.backend {
        Backend::Sqlite => {
            let path = config.sqlite_path();
            SqliteAdapter::probe(&path)
                .with_context(|| format!("SQLite storage unavailable at {:?}", path))?;
            Ok(Arc::new(SqliteAdapter::new(path, config.database_version)))
        }
        Backend::KeyValue => key_value_adapter(config),
        Backend::Memory => Ok(Arc::new(KeyValueAdapter::new(
            Arc::new(MemoryStore::new()),
            config.prefix.clone(),
        ))),
        Backend::Auto => {
            let path = config.sqlite_path();
            match SqliteAdapter::probe(&path) {
                Ok(()) => Ok(Arc::new(SqliteAdapter::new(path, config.database_version))),
                Err(e) => {
                    warn!("{}; falling back to key-value storage", e);
                    key_value_adapter(config)
                }
            }
        }
    }
}

fn key_value_adapter(config: &Config) -> Result<Arc<dyn StorageAdapter>> {
    let path = config.key_value_path();
    let store = FileStore::open(&path)
        .with_context(|| format!("Failed to open key-value store at {:?}", path))?;
    Ok(Arc::new(KeyValueAdapter::new(
        Arc::new(store),
        config.prefix.clone(),
    )))
}

/// Unified storage interface for WinNote
pub struct Store {
    config: Config,
    manager: StorageManager,
    notes: NoteStorageManager,
}

impl Store {
    /// Open the store with configuration from the default location
    pub async fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config).await
    }

    /// Open the store with a specific configuration
    ///
    /// Loads the application document and the notes metadata. Read
    /// failures in either are logged and leave that part empty.
    pub async fn open_with_config(config: Config) -> Result<Self> {
        let adapter = open_adapter(&config)?;
        let manager = StorageManager::new(config.storage_config(Arc::clone(&adapter)));
        manager
            .initialize()
            .await
            .context("Failed to initialize storage")?;

        // Unreadable metadata degrades to an empty map
        let notes = NoteStorageManager::new(adapter);
        if let Err(e) = notes.initialize_notes_metadata().await {
            warn!("Starting with no notes metadata: {}", e);
        }

        info!(
            "Opened store ({} backend, {} note(s))",
            manager.adapter().name(),
            notes.get_notes_list().len()
        );

        Ok(Self {
            config,
            manager,
            notes,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The document manager
    pub fn manager(&self) -> &StorageManager {
        &self.manager
    }

    /// The notes manager
    pub fn notes(&self) -> &NoteStorageManager {
        &self.notes
    }

    /// Label of the backend in use
    pub fn backend(&self) -> &'static str {
        self.manager.adapter().name()
    }

    // ==================== Note Operations ====================

    /// Create or replace a note
    pub async fn save_note(&self, note: &Note) -> Result<()> {
        self.notes
            .save_note(note)
            .await
            .with_context(|| format!("Failed to save note {}", note.id))
    }

    /// Get a note with its content
    pub async fn get_note(&self, id: &str) -> Result<Option<Note>> {
        self.notes
            .get_note(id)
            .await
            .with_context(|| format!("Failed to read note {}", id))
    }

    pub async fn delete_note(&self, id: &str) -> Result<()> {
        self.notes
            .delete_note(id)
            .await
            .with_context(|| format!("Failed to delete note {}", id))
    }

    /// All notes' metadata, ordered by id
    pub fn list_notes(&self) -> Vec<NoteMetadata> {
        self.notes.get_notes_list()
    }

    // ==================== Maintenance ====================

    /// Persist the application document
    pub async fn save(&self) -> Result<()> {
        self.manager.save().await.context("Failed to save document")
    }

    /// Move notes stored in the document's `notes` section to the split path
    ///
    /// Notes already present on the split path win. Records that cannot be
    /// read as notes stay in the document.
    pub async fn migrate_legacy_notes(&self) -> Result<MigrationReport> {
        let legacy = self.manager.get_notes();
        let mut report = MigrationReport::default();
        if legacy.is_empty() {
            return Ok(report);
        }

        let mut remaining = Section::new();
        for (id, record) in legacy {
            if self.notes.get_metadata(&id).is_some() {
                report.duplicates.push(id);
                continue;
            }

            match serde_json::from_value::<Note>(record.clone()) {
                Ok(mut note) => {
                    note.id = id.clone();
                    self.save_note(&note).await?;
                    report.moved.push(id);
                }
                Err(e) => {
                    warn!("Skipping unreadable legacy note {}: {}", id, e);
                    remaining.insert(id.clone(), record);
                    report.unreadable.push(id);
                }
            }
        }

        self.manager.update_notes(remaining);
        self.save().await?;
        info!(
            "Migrated {} legacy note(s), dropped {} duplicate(s)",
            report.moved.len(),
            report.duplicates.len()
        );
        Ok(report)
    }

    /// Repair invalid or dangling data in the document and notes metadata
    pub async fn clean(&self) -> Result<CleanReport> {
        let mut report = clean_storage(&self.manager)
            .await
            .context("Failed to clean document")?;

        let mut metadata = self.notes.get_notes_metadata();
        let meta_report = clean_metadata(
            &mut metadata,
            &self.manager.get_folders(),
            &self.manager.get_tags(),
        );
        if meta_report.cleaned() {
            self.notes
                .replace_notes_metadata(metadata)
                .await
                .context("Failed to save cleaned metadata")?;
            report.issues.extend(meta_report.issues);
            report.fixed.extend(meta_report.fixed);
        }

        Ok(report)
    }

    /// Snapshot of the document and every note with its content
    pub async fn export(&self) -> Result<ExportBundle> {
        let mut notes = BTreeMap::new();
        for meta in self.notes.get_notes_list() {
            let content = self
                .notes
                .get_note_content(&meta.id)
                .await
                .with_context(|| format!("Failed to read content of note {}", meta.id))?;
            notes.insert(meta.id.clone(), Note::from_parts(meta, content));
        }

        Ok(ExportBundle {
            document: self.manager.export_data(),
            notes,
        })
    }

    /// Merge imported data into the store and persist it
    pub async fn import(&self, bundle: ImportBundle) -> Result<()> {
        if let Some(document) = bundle.document {
            self.manager
                .import_data(document)
                .await
                .context("Failed to import document")?;
        }

        for (id, mut note) in bundle.notes {
            note.id = id;
            self.save_note(&note).await?;
        }
        Ok(())
    }

    /// Remove all stored data
    pub async fn clear(&self) -> Result<()> {
        self.manager.clear().await.context("Failed to clear storage")?;
        self.notes.reset();
        Ok(())
    }

    /// Stop background work
    pub async fn close(&self) {
        self.manager.destroy().await;
    }
}
