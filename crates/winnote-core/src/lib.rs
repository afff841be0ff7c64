//! WinNote Core Library
//!
//! This crate provides the persistence layer for WinNote, a note-taking
//! application: a pluggable key-value storage abstraction, a manager for the
//! whole application document with debounced autosave, and a notes manager
//! that keeps metadata resident while loading note bodies on demand.
//!
//! # Architecture
//!
//! - **Adapters**: SQLite (versioned, transactional) or a prefix-namespaced
//!   key-value store, both behind `StorageAdapter`
//! - **StorageManager**: the application document under `app-data`
//! - **NoteStorageManager**: `notes-metadata` plus one `note-content-<id>`
//!   key per note
//!
//! # Quick Start
//!
//! ```text
//! let store = Store::open().await?;
//!
//! let mut note = Note::new(generate_id(IdKind::Note), "Groceries");
//! note.content = Some("<p>Milk</p>".into());
//! store.save_note(&note).await?;
//!
//! for meta in store.list_notes() {
//!     println!("{} {}", meta.updated_at, meta.title);
//! }
//! ```
//!
//! # Modules
//!
//! - `store`: Unified storage interface (main entry point)
//! - `manager`: Document persistence, autosave and events
//! - `notes`: Metadata/content split for notes
//! - `storage`: Adapter trait and backends
//! - `models`: Document and note data structures
//! - `config`: Application configuration
//! - `ids`, `text`, `cleaner`: id generation, HTML text extraction, data repair

pub mod autosave;
pub mod cleaner;
pub mod config;
pub mod events;
pub mod ids;
pub mod manager;
pub mod models;
pub mod notes;
pub mod storage;
pub mod store;
pub mod text;

#[cfg(test)]
mod test_support;

pub use cleaner::CleanReport;
pub use config::{Backend, Config};
pub use events::{ListenerId, StorageEvent, StorageEventKind};
pub use ids::{generate_id, IdKind};
pub use manager::{StorageConfig, StorageManager};
pub use models::{DataVersion, Note, NoteMetadata, PartialDocument, Section, SectionKind, StoredDocument};
pub use notes::NoteStorageManager;
pub use storage::{StorageAdapter, StorageError, StorageResult};
pub use store::{ExportBundle, ImportBundle, MigrationReport, Store};
