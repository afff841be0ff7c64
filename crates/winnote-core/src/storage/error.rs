//! Storage error handling
//!
//! Provides typed errors for adapter operations with descriptive messages
//! and recovery suggestions.
//!
//! A missing key is never an error: adapters report it as `Ok(None)`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend cannot be used in this environment
    #[error("Storage backend '{backend}' is unavailable: {reason}")]
    AdapterUnavailable {
        backend: &'static str,
        reason: String,
    },

    /// A value could not be encoded to or decoded from JSON
    #[error("Failed to serialize value for key '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A write inside a batch failed; the whole batch was rolled back
    #[error("Batch write failed at key '{key}': {source}")]
    Transaction {
        key: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Database on disk was created by a newer schema version
    #[error("Database version {stored} is newer than the requested version {requested}")]
    VersionMismatch { stored: u32, requested: u32 },

    /// Key-value store is full
    #[error("Storage quota of {limit} bytes exceeded while writing '{key}'")]
    QuotaExceeded { key: String, limit: usize },

    /// Backing file cannot be parsed
    #[error("Store at '{path}' is corrupted: {details}")]
    CorruptStore { path: PathBuf, details: String },

    /// Failed to read or write a backing file
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Atomic write failed during rename
    #[error("Atomic write failed: could not rename '{from}' to '{to}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A blocking storage task panicked or was cancelled
    #[error("Storage task failed: {0}")]
    TaskFailed(String),
}

impl StorageError {
    /// Wrap a JSON error with the key it concerns
    pub fn serialization(key: impl Into<String>, source: serde_json::Error) -> Self {
        StorageError::Serialization {
            key: key.into(),
            source,
        }
    }

    /// Create an error from an I/O error with path context
    pub fn from_io(source: io::Error, path: PathBuf) -> Self {
        StorageError::Io { path, source }
    }

    /// Check if the caller can reasonably carry on after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StorageError::AdapterUnavailable { .. }
                | StorageError::QuotaExceeded { .. }
                | StorageError::Transaction { .. }
                | StorageError::CorruptStore { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::AdapterUnavailable { .. } => {
                Some("Switch to the key-value backend (backend = \"key-value\").")
            }
            StorageError::QuotaExceeded { .. } => {
                Some("Delete unused notes or switch to the sqlite backend.")
            }
            StorageError::Transaction { .. } => {
                Some("No part of the batch was written. Retry the operation.")
            }
            StorageError::CorruptStore { .. } => {
                Some("Move the corrupted file aside to start fresh, or repair the JSON manually.")
            }
            StorageError::VersionMismatch { .. } => {
                Some("The data was written by a newer version of WinNote. Upgrade and try again.")
            }
            _ => None,
        }
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::TaskFailed(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_recoverable() {
        let err = StorageError::AdapterUnavailable {
            backend: "sqlite",
            reason: "read-only filesystem".to_string(),
        };

        assert!(err.is_recoverable());
        assert!(err.recovery_suggestion().is_some());
        assert!(err.to_string().contains("sqlite"));
    }

    #[test]
    fn test_serialization_display_names_key() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = StorageError::serialization("app-data", source);

        let msg = err.to_string();
        assert!(msg.contains("app-data"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_quota_display() {
        let err = StorageError::QuotaExceeded {
            key: "win-note:app-data".to_string(),
            limit: 1024,
        };

        let msg = err.to_string();
        assert!(msg.contains("1024"));
        assert!(msg.contains("win-note:app-data"));
    }

    #[test]
    fn test_version_mismatch_has_suggestion() {
        let err = StorageError::VersionMismatch {
            stored: 3,
            requested: 1,
        };

        assert!(err.recovery_suggestion().is_some());
        assert!(err.to_string().contains('3'));
    }
}
