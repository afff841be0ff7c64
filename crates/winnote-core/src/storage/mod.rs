//! Storage layer
//!
//! Pluggable key-value persistence behind the `StorageAdapter` trait.
//!
//! ## Backends
//!
//! - **SQLite** (`SqliteAdapter`): versioned, transactional, opened lazily
//! - **Key-value** (`KeyValueAdapter`): prefix-namespaced view over a
//!   synchronous string store (`MemoryStore` or `FileStore`)
//!
//! Managers hold an `Arc<dyn StorageAdapter>` and never know which backend
//! they are talking to.

pub mod adapter;
pub mod backing;
pub mod error;
pub mod key_value;
pub mod schema;
pub mod sqlite;

pub use adapter::{AdapterExt, StorageAdapter};
pub use backing::{FileStore, KeyValueStore, MemoryStore};
pub use error::{StorageError, StorageResult};
pub use key_value::KeyValueAdapter;
pub use sqlite::SqliteAdapter;

/// Key holding the whole application document
pub const APP_DATA_KEY: &str = "app-data";

/// Key holding the map of note metadata
pub const NOTES_METADATA_KEY: &str = "notes-metadata";

/// Key holding the content of one note
pub fn note_content_key(id: &str) -> String {
    format!("note-content-{}", id)
}
