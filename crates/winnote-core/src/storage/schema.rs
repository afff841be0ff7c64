//! SQLite schema for the transactional adapter
//!
//! One table of JSON records keyed by `key`. The schema version lives in
//! `PRAGMA user_version`; the upgrade step runs only when the stored version
//! is lower than the version the adapter was opened with.

use rusqlite::{Connection, Result};

/// Name of the single record table
pub const STORE_TABLE: &str = "data";

/// Create the record table and stamp the schema version
pub fn init_schema(conn: &Connection, version: u32) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS data (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL
        ) WITHOUT ROWID;
        "#,
    )?;

    set_schema_version(conn, version)
}

/// Get the stored schema version (0 for a brand-new database)
pub fn get_schema_version(conn: &Connection) -> Result<u32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

fn set_schema_version(conn: &Connection, version: u32) -> Result<()> {
    // PRAGMA does not accept bound parameters
    conn.execute_batch(&format!("PRAGMA user_version = {}", version))
}

/// Check if the schema needs to be created or upgraded
pub fn needs_upgrade(conn: &Connection, version: u32) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1")
        .and_then(|mut stmt| stmt.exists([STORE_TABLE]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(stored) => stored < version,
        Err(_) => true,
    }
}
