//! End-to-end storage scenarios through the public API

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tempfile::TempDir;

use winnote_core::storage::{KeyValueAdapter, MemoryStore, SqliteAdapter};
use winnote_core::{
    NoteMetadata, NoteStorageManager, StorageAdapter, StorageConfig, StorageError,
    StorageEventKind, StorageManager,
};

fn memory_adapter(store: &MemoryStore) -> Arc<dyn StorageAdapter> {
    Arc::new(KeyValueAdapter::new(Arc::new(store.clone()), "win-note"))
}

#[tokio::test]
async fn empty_environment_initializes_to_defaults() {
    let manager = StorageManager::new(StorageConfig::new(memory_adapter(&MemoryStore::new())));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    manager.add_listener(move |event| sink.lock().unwrap().push(event.kind));

    manager.initialize().await.unwrap();

    assert!(manager.get_notes().is_empty());
    assert!(manager.get_folders().is_empty());
    assert!(manager.get_tags().is_empty());
    assert!(manager.get_settings().is_empty());
    assert!(manager.get_state().is_empty());
    assert_eq!(*events.lock().unwrap(), vec![StorageEventKind::Load]);
}

#[tokio::test]
async fn note_written_by_one_manager_is_read_by_the_next() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("notes.sqlite3");

    {
        let adapter: Arc<dyn StorageAdapter> = Arc::new(SqliteAdapter::new(&path, 1));
        let notes = NoteStorageManager::new(adapter);
        let mut meta = NoteMetadata::new("n1", "Hello");
        meta.updated_at = "2025-01-01".to_string();
        notes.save_note_metadata(meta).await.unwrap();
        notes.save_note_content("n1", "<p>hi</p>").await.unwrap();
    }

    let adapter: Arc<dyn StorageAdapter> = Arc::new(SqliteAdapter::new(&path, 1));
    let notes = NoteStorageManager::new(adapter);
    notes.initialize_notes_metadata().await.unwrap();

    let list = notes.get_notes_list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].title, "Hello");
    assert_eq!(list[0].updated_at, "2025-01-01");
    assert_eq!(notes.get_note_content("n1").await.unwrap(), "<p>hi</p>");
}

#[tokio::test]
async fn deleted_note_disappears_and_content_is_blank() {
    let store = MemoryStore::new();
    let notes = NoteStorageManager::new(memory_adapter(&store));
    notes
        .save_note_metadata(NoteMetadata::new("n1", "Hello"))
        .await
        .unwrap();
    notes.save_note_content("n1", "<p>hi</p>").await.unwrap();

    notes.delete_note("n1").await.unwrap();
    notes.evict_content_cache();

    assert!(notes.get_notes_list().iter().all(|m| m.id != "n1"));
    assert_eq!(notes.get_note_content("n1").await.unwrap(), "");

    // A fresh session sees the same thing
    let fresh = NoteStorageManager::new(memory_adapter(&store));
    fresh.initialize_notes_metadata().await.unwrap();
    assert!(fresh.get_notes_list().is_empty());
    assert_eq!(fresh.get_note_content("n1").await.unwrap(), "");
}

#[tokio::test]
async fn failed_batch_commits_nothing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("batch.sqlite3");
    let adapter = SqliteAdapter::new(&path, 1);

    // Open the database so the table exists, then make writes of "b" fail
    adapter.set("warm-up", json!(true)).await.unwrap();
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER fail_b BEFORE INSERT ON data
         WHEN NEW.key = 'b'
         BEGIN SELECT RAISE(ABORT, 'forced failure'); END;",
    )
    .unwrap();
    drop(conn);

    let entries = BTreeMap::from([
        ("a".to_string(), json!({"value": 1})),
        ("b".to_string(), json!({"value": 2})),
    ]);
    let err = adapter.set_multiple(entries).await.unwrap_err();

    match err {
        StorageError::Transaction { key, .. } => assert_eq!(key, "b"),
        other => panic!("expected a transaction error, got {other:?}"),
    }
    assert!(adapter.get("a").await.unwrap().is_none());
    assert!(adapter.get("b").await.unwrap().is_none());
    assert!(adapter.has("warm-up").await.unwrap());
}

#[tokio::test]
async fn document_round_trips_through_sqlite_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("doc.sqlite3");

    let first = StorageManager::new(StorageConfig::new(Arc::new(SqliteAdapter::new(&path, 1))));
    first.initialize().await.unwrap();
    first.mutate(|doc| {
        doc.folders
            .insert("f1".into(), json!({"id": "f1", "label": "Work"}));
        doc.state.insert("activeNoteId".into(), json!("n1"));
    });
    first.save().await.unwrap();
    let expected = first.export_data();
    first.destroy().await;
    drop(first);

    let second = StorageManager::new(StorageConfig::new(Arc::new(SqliteAdapter::new(&path, 1))));
    second.initialize().await.unwrap();

    assert_eq!(second.export_data(), expected);
}

#[tokio::test]
async fn prefixes_share_a_store_without_interfering() {
    let store = MemoryStore::new();
    let first: Arc<dyn StorageAdapter> =
        Arc::new(KeyValueAdapter::new(Arc::new(store.clone()), "p1"));
    let second: Arc<dyn StorageAdapter> =
        Arc::new(KeyValueAdapter::new(Arc::new(store.clone()), "p2"));

    let manager = StorageManager::new(StorageConfig::new(Arc::clone(&first)));
    manager.initialize().await.unwrap();
    manager.save().await.unwrap();
    second.set("own", json!(1)).await.unwrap();

    second.clear().await.unwrap();

    assert!(first.has("app-data").await.unwrap());
    assert!(!second.has("app-data").await.unwrap());
}
