//! Service Layer Error Types
//!
//! [`DexError`] is the taxonomy every [`NodeService`](crate::services::NodeService)
//! operation reports. Bulk operations (reindex, move and remove rewrite
//! scans) keep going after a node fails and report all failures at once as
//! [`DexError::Aggregate`].

use crate::db::StoreError;
use crate::index::TagExprError;
use crate::models::ValidationError;
use std::fmt;
use thiserror::Error;

/// Service operation errors
#[derive(Error, Debug)]
pub enum DexError {
    /// Node, config, index or record absent
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// Move target already occupied
    #[error("Destination already exists: {path}")]
    DestinationExists { path: String },

    /// Malformed identifier or operation on the reserved zero node
    #[error("Invalid operation: {reason}")]
    Invalid { reason: String },

    /// Exclusive section not acquired before the deadline
    #[error("Timed out after {waited_ms}ms waiting for lock on node {path}")]
    LockTimeout { path: String, waited_ms: u64 },

    /// Malformed tag query
    #[error("Tag query error: {0}")]
    Parse(#[from] TagExprError),

    /// Any other storage failure
    #[error("Storage error: {0}")]
    Store(StoreError),

    /// One or more nodes failed during a bulk operation
    #[error("{0}")]
    Aggregate(NodeErrors),
}

impl DexError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn destination_exists(path: impl Into<String>) -> Self {
        Self::DestinationExists { path: path.into() }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    pub fn lock_timeout(path: impl Into<String>, waited_ms: u64) -> Self {
        Self::LockTimeout {
            path: path.into(),
            waited_ms,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StoreError> for DexError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { key, .. } => Self::NotFound { path: key },
            StoreError::AlreadyExists { key } => Self::DestinationExists { path: key },
            other => Self::Store(other),
        }
    }
}

impl From<ValidationError> for DexError {
    fn from(err: ValidationError) -> Self {
        Self::invalid(err.to_string())
    }
}

/// Per-node failures collected during a bulk operation, in encounter order
#[derive(Debug, Default)]
pub struct NodeErrors {
    errors: Vec<(String, DexError)>,
}

impl NodeErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<String>, err: DexError) {
        self.errors.push((path.into(), err));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Paths of the failing nodes
    pub fn nodes(&self) -> Vec<&str> {
        self.errors.iter().map(|(path, _)| path.as_str()).collect()
    }

    pub fn errors(&self) -> &[(String, DexError)] {
        &self.errors
    }

    /// `Ok(value)` when nothing failed, `Aggregate` otherwise
    pub fn into_result<T>(self, value: T) -> Result<T, DexError> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(DexError::Aggregate(self))
        }
    }
}

impl fmt::Display for NodeErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} node(s) failed", self.errors.len())?;
        for (path, err) in &self.errors {
            write!(f, "\n{}: {}", path, err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        let err: DexError = StoreError::not_found("node", "7").into();
        assert!(matches!(err, DexError::NotFound { ref path } if path == "7"));

        let err: DexError = StoreError::already_exists("9").into();
        assert!(matches!(err, DexError::DestinationExists { ref path } if path == "9"));

        let err: DexError = StoreError::injected("3").into();
        assert!(matches!(err, DexError::Store(StoreError::Injected { .. })));
    }

    #[test]
    fn test_aggregate_lists_each_node() {
        let mut errors = NodeErrors::new();
        assert!(errors.is_empty());
        errors.push("3", DexError::not_found("3"));
        errors.push("8", DexError::lock_timeout("8", 50));

        assert_eq!(errors.nodes(), vec!["3", "8"]);
        let rendered = errors.to_string();
        assert_eq!(rendered.lines().count(), 3);
        assert!(rendered.contains("8: Timed out after 50ms"));

        let err = errors.into_result(()).unwrap_err();
        assert!(matches!(err, DexError::Aggregate(ref e) if e.len() == 2));
    }

    #[test]
    fn test_empty_aggregate_is_ok() {
        assert_eq!(NodeErrors::new().into_result(5).unwrap(), 5);
    }
}
