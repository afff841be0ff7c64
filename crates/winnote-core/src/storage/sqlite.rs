//! Transactional adapter on SQLite
//!
//! The database is opened lazily on the first operation and the connection
//! is cached for the adapter's lifetime. Concurrent first callers all await
//! the same open attempt. Every operation runs in its own transaction on a
//! blocking thread; `set_multiple` commits only after every put succeeded.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::adapter::StorageAdapter;
use super::error::{StorageError, StorageResult};
use super::schema::{get_schema_version, init_schema, needs_upgrade};

const BACKEND: &str = "sqlite";

/// Where the database lives
#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

type SharedConnection = Arc<Mutex<Connection>>;

/// Storage adapter backed by a versioned SQLite database
pub struct SqliteAdapter {
    location: Location,
    version: u32,
    conn: OnceCell<SharedConnection>,
    open_attempts: AtomicUsize,
}

impl SqliteAdapter {
    /// Create an adapter for the database file at `path`
    ///
    /// Nothing is opened until the first operation.
    pub fn new(path: impl Into<PathBuf>, version: u32) -> Self {
        Self::with_location(Location::File(path.into()), version)
    }

    /// Create an adapter on a private in-memory database
    pub fn in_memory(version: u32) -> Self {
        Self::with_location(Location::Memory, version)
    }

    fn with_location(location: Location, version: u32) -> Self {
        Self {
            location,
            version,
            conn: OnceCell::new(),
            open_attempts: AtomicUsize::new(0),
        }
    }

    /// Check whether a database can be used at `path`
    ///
    /// Returns `AdapterUnavailable` instead of the underlying error so
    /// callers can fall back to another backend.
    pub fn probe(path: &Path) -> StorageResult<()> {
        let unavailable = |reason: String| StorageError::AdapterUnavailable {
            backend: BACKEND,
            reason,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| unavailable(format!("cannot create {:?}: {}", parent, e)))?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| unavailable(format!("cannot open {:?}: {}", path, e)))?;
        get_schema_version(&conn)
            .map_err(|e| unavailable(format!("cannot query {:?}: {}", path, e)))?;

        Ok(())
    }

    /// Whether the connection has been opened yet
    pub fn is_open(&self) -> bool {
        self.conn.initialized()
    }

    /// Schema version requested by this adapter
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of times the database open step has run
    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    async fn connection(&self) -> StorageResult<SharedConnection> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                self.open_attempts.fetch_add(1, Ordering::SeqCst);
                let location = self.location.clone();
                let version = self.version;
                let conn =
                    tokio::task::spawn_blocking(move || open_database(&location, version))
                        .await??;
                Ok::<_, StorageError>(Arc::new(Mutex::new(conn)))
            })
            .await?;
        Ok(Arc::clone(conn))
    }

    /// Run `f` against the connection on a blocking thread
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection().await?;
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await?
    }
}

/// Open the database and run the upgrade step when needed
fn open_database(location: &Location, version: u32) -> StorageResult<Connection> {
    let mut conn = match location {
        Location::File(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)
                        .map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
                }
            }
            Connection::open(path)?
        }
        Location::Memory => Connection::open_in_memory()?,
    };

    let stored = get_schema_version(&conn)?;
    if stored > version {
        return Err(StorageError::VersionMismatch {
            stored,
            requested: version,
        });
    }

    if needs_upgrade(&conn, version) {
        info!("Upgrading storage schema from version {} to {}", stored, version);
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        init_schema(&tx, version)?;
        tx.commit()?;
    }

    debug!("Opened sqlite storage ({:?}, version {})", location, version);
    Ok(conn)
}

fn decode(key: &str, text: &str) -> StorageResult<Value> {
    serde_json::from_str(text).map_err(|e| StorageError::serialization(key, e))
}

fn encode(key: &str, value: &Value) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::serialization(key, e))
}

#[async_trait]
impl StorageAdapter for SqliteAdapter {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let text: Option<String> = tx
                .query_row("SELECT value FROM data WHERE key = ?1", [&key], |row| {
                    row.get(0)
                })
                .optional()?;
            tx.finish()?;
            text.map(|t| decode(&key, &t)).transpose()
        })
        .await
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let text = encode(key, &value)?;
        let key = key.to_string();
        debug!("sqlite: set {} ({} bytes)", key, text.len());
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            put(&tx, &key, &text)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute("DELETE FROM data WHERE key = ?1", [&key])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> StorageResult<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let removed = tx.execute("DELETE FROM data", [])?;
            tx.commit()?;
            debug!("sqlite: cleared {} record(s)", removed);
            Ok(())
        })
        .await
    }

    async fn get_all(&self) -> StorageResult<BTreeMap<String, Value>> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let rows: Vec<(String, String)> = {
                let mut stmt = tx.prepare("SELECT key, value FROM data ORDER BY key")?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                rows.collect::<Result<_, _>>()?
            };
            tx.finish()?;

            rows.into_iter()
                .map(|(key, text)| -> StorageResult<(String, Value)> {
                    let value = decode(&key, &text)?;
                    Ok((key, value))
                })
                .collect()
        })
        .await
    }

    async fn set_multiple(&self, entries: BTreeMap<String, Value>) -> StorageResult<()> {
        // Encode everything up front so a bad value never opens a transaction
        let encoded = entries
            .iter()
            .map(|(key, value)| -> StorageResult<(String, String)> {
                Ok((key.clone(), encode(key, value)?))
            })
            .collect::<StorageResult<Vec<_>>>()?;

        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            for (key, text) in &encoded {
                // Dropping `tx` on error rolls back every earlier put
                put(&tx, key, text).map_err(|source| StorageError::Transaction {
                    key: key.clone(),
                    source,
                })?;
            }
            tx.commit()?;
            debug!("sqlite: committed batch of {} record(s)", encoded.len());
            Ok(())
        })
        .await
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let keys = {
                let mut stmt = tx.prepare("SELECT key FROM data ORDER BY key")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<Result<Vec<String>, _>>()?
            };
            tx.finish()?;
            Ok(keys)
        })
        .await
    }

    async fn has(&self, key: &str) -> StorageResult<bool> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let exists = {
                let mut stmt = tx.prepare("SELECT 1 FROM data WHERE key = ?1")?;
                stmt.exists([&key])?
            };
            tx.finish()?;
            Ok(exists)
        })
        .await
    }
}

fn put(conn: &Connection, key: &str, text: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO data (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, text],
    )
}
