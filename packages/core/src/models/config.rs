//! Repository configuration
//!
//! `RepoConfig` is the whole-repository record persisted through
//! [`Repository::read_config`](crate::db::Repository::read_config). It carries
//! the reindex watermark, the custom tag-filtered indexes to maintain and the
//! per-node lock timings.
//!
//! All fields use `#[serde(default)]` so config files written by older
//! versions deserialize without error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whole-repository configuration record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfig {
    /// Watermark: indexes are consistent with content up to this instant
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<DateTime<Utc>>,

    /// Custom tag-filtered indexes
    #[serde(default)]
    pub indexes: Vec<IndexConfig>,

    #[serde(default)]
    pub lock: LockSettings,
}

/// One config-declared tag-filtered index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Artifact file, e.g. `todo`, `todo.md` or `dex/todo.md`
    pub file: String,

    /// Tag query selecting the members, e.g. `todo && !done`
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

impl IndexConfig {
    pub fn new(file: impl Into<String>, tags: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            tags: Some(tags.into()),
        }
    }

    /// Tag query if present and not blank
    pub fn query(&self) -> Option<&str> {
        self.tags.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_lock_retry_ms() -> u64 {
    50
}

/// Timing of per-node lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockSettings {
    /// Give up acquiring after this many milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,

    /// Pause between acquisition attempts
    #[serde(default = "default_lock_retry_ms")]
    pub retry_interval_ms: u64,
}

impl LockSettings {
    pub fn new(timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            timeout_ms: timeout.as_millis() as u64,
            retry_interval_ms: retry_interval.as_millis() as u64,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms.max(1))
    }
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_lock_timeout_ms(),
            retry_interval_ms: default_lock_retry_ms(),
        }
    }
}
