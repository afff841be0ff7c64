//! Note storage with a metadata/content split
//!
//! Metadata for every note is small and kept resident; it is persisted as
//! one map under `notes-metadata`. Note bodies can be large, so each one is
//! stored under its own `note-content-<id>` key and only read the first
//! time it is asked for (hydration). After that the cached body is served
//! without touching the adapter.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{Note, NoteMetadata};
use crate::storage::{
    note_content_key, AdapterExt, StorageAdapter, StorageResult, NOTES_METADATA_KEY,
};

#[derive(Debug, Default)]
struct NoteState {
    metadata: BTreeMap<String, NoteMetadata>,
    content: HashMap<String, String>,
    hydrated: HashSet<String>,
}

/// Persistence for notes split into metadata and content
pub struct NoteStorageManager {
    adapter: Arc<dyn StorageAdapter>,
    state: Mutex<NoteState>,
}

impl NoteStorageManager {
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            adapter,
            state: Mutex::new(NoteState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, NoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the stored metadata map over the resident one
    pub async fn initialize_notes_metadata(&self) -> StorageResult<()> {
        let stored = self
            .adapter
            .get_as::<BTreeMap<String, NoteMetadata>>(NOTES_METADATA_KEY)
            .await
            .inspect_err(|e| warn!("Failed to load notes metadata: {}", e))?;

        if let Some(stored) = stored {
            debug!("Loaded metadata for {} note(s)", stored.len());
            self.state().metadata.extend(stored);
        }
        Ok(())
    }

    /// Snapshot of all resident metadata
    pub fn get_notes_metadata(&self) -> BTreeMap<String, NoteMetadata> {
        self.state().metadata.clone()
    }

    /// Metadata for one note
    pub fn get_metadata(&self, id: &str) -> Option<NoteMetadata> {
        self.state().metadata.get(id).cloned()
    }

    /// Content of a note, hydrating it on first access
    ///
    /// A note with no stored content yields an empty string. A failed read
    /// leaves the note unhydrated so the next call retries. Content saved
    /// while the read is in flight wins over what the read returns.
    pub async fn get_note_content(&self, id: &str) -> StorageResult<String> {
        {
            let state = self.state();
            if state.hydrated.contains(id) {
                return Ok(state.content.get(id).cloned().unwrap_or_default());
            }
        }

        let content = self
            .adapter
            .get_as::<String>(&note_content_key(id))
            .await?
            .unwrap_or_default();

        // A save that landed while we were reading is newer than what we read
        let mut state = self.state();
        if state.hydrated.contains(id) {
            return Ok(state.content.get(id).cloned().unwrap_or_default());
        }
        debug!("Hydrated content for note {} ({} bytes)", id, content.len());
        state.content.insert(id.to_string(), content.clone());
        state.hydrated.insert(id.to_string());
        Ok(content)
    }

    /// Full note: metadata plus hydrated content
    pub async fn get_note(&self, id: &str) -> StorageResult<Option<Note>> {
        let Some(meta) = self.get_metadata(id) else {
            return Ok(None);
        };
        let content = self.get_note_content(id).await?;
        Ok(Some(Note::from_parts(meta, content)))
    }

    /// Insert or replace metadata and persist the whole map
    pub async fn save_note_metadata(&self, meta: NoteMetadata) -> StorageResult<()> {
        let snapshot = {
            let mut state = self.state();
            state.metadata.insert(meta.id.clone(), meta);
            state.metadata.clone()
        };
        self.adapter.set_as(NOTES_METADATA_KEY, &snapshot).await
    }

    /// Replace the whole metadata map and persist it in one write
    pub async fn replace_notes_metadata(
        &self,
        metadata: BTreeMap<String, NoteMetadata>,
    ) -> StorageResult<()> {
        let snapshot = {
            let mut state = self.state();
            state.metadata = metadata;
            state.metadata.clone()
        };
        self.adapter.set_as(NOTES_METADATA_KEY, &snapshot).await
    }

    /// Cache content and persist it immediately
    pub async fn save_note_content(&self, id: &str, content: &str) -> StorageResult<()> {
        {
            let mut state = self.state();
            state.content.insert(id.to_string(), content.to_string());
            state.hydrated.insert(id.to_string());
        }
        self.adapter
            .set(&note_content_key(id), Value::String(content.to_string()))
            .await
    }

    /// Save a full note
    ///
    /// Content is written only when the note carries a non-empty body.
    pub async fn save_note(&self, note: &Note) -> StorageResult<()> {
        self.save_note_metadata(note.metadata()).await?;
        match note.content.as_deref() {
            Some(content) if !content.is_empty() => {
                self.save_note_content(&note.id, content).await
            }
            _ => Ok(()),
        }
    }

    /// Forget a note and blank its stored content
    pub async fn delete_note(&self, id: &str) -> StorageResult<()> {
        let snapshot = {
            let mut state = self.state();
            state.metadata.remove(id);
            state.content.remove(id);
            state.hydrated.remove(id);
            state.metadata.clone()
        };

        self.adapter.set_as(NOTES_METADATA_KEY, &snapshot).await?;
        self.adapter
            .set(&note_content_key(id), Value::String(String::new()))
            .await?;
        debug!("Deleted note {}", id);
        Ok(())
    }

    /// All resident metadata, ordered by id
    pub fn get_notes_list(&self) -> Vec<NoteMetadata> {
        self.state().metadata.values().cloned().collect()
    }

    pub fn is_note_content_loaded(&self, id: &str) -> bool {
        self.state().hydrated.contains(id)
    }

    /// Drop cached content so every note hydrates again
    pub fn evict_content_cache(&self) {
        let mut state = self.state();
        state.content.clear();
        state.hydrated.clear();
    }

    /// Forget all resident metadata and cached content
    pub fn reset(&self) {
        *self.state() = NoteState::default();
    }

    pub fn adapter(&self) -> Arc<dyn StorageAdapter> {
        Arc::clone(&self.adapter)
    }
}
