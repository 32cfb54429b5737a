//! Storage Error Types
//!
//! Errors raised by [`Repository`](crate::db::Repository) implementations.
//! Higher layers translate these into the [`DexError`](crate::services::DexError)
//! taxonomy.

use std::path::PathBuf;
use thiserror::Error;

/// Repository operation errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Node, blob, index or config record is absent
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// Target of a create/move is already occupied
    #[error("Node already exists: {key}")]
    AlreadyExists { key: String },

    /// Filesystem failure
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON encode/decode failure of a stored record
    #[error("Failed to (de)serialize {key}: {source}")]
    Serialization {
        key: String,
        source: serde_json::Error,
    },

    /// Failure requested through a test backend
    #[error("Injected failure for {key}")]
    Injected { key: String },
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Create an already exists error
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Create an I/O error with the path it happened at
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error
    pub fn serialization(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            key: key.into(),
            source,
        }
    }

    /// Create an injected failure
    pub fn injected(key: impl Into<String>) -> Self {
        Self::Injected { key: key.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Turn a `NotFound` into `Ok(None)`, keeping every other failure
///
/// Used wherever a missing record is a legitimate state (probing meta and
/// stats during reindex, loading absent index artifacts).
pub fn optional<T>(result: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
