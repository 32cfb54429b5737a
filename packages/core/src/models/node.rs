//! Node Data Structures
//!
//! A node is a small text document plus two derived records kept beside it
//! in the repository:
//!
//! - [`NodeMeta`] - what the content says (title, lead, tags, outgoing links)
//! - [`NodeStats`] - bookkeeping about the content (hash, timestamps)
//!
//! Both are regenerated from content by the reindex protocol; the index
//! builders only ever look at the combined [`Node`].

use crate::models::NodeIdentifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Validation errors for node addressing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid node ID format: {0}")]
    InvalidId(String),
}

/// Metadata extracted from node content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMeta {
    /// First heading (or first line) of the content
    #[serde(default)]
    pub title: String,

    /// First paragraph of the content
    #[serde(default)]
    pub lead: String,

    /// Tags declared in the content's front matter
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Nodes referenced through `../<id>` links, ascending and deduped
    #[serde(default)]
    pub links: Vec<NodeIdentifier>,
}

/// Bookkeeping recorded for node content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    /// Lowercase hex SHA-256 of the content at the last refresh
    #[serde(default)]
    pub hash: String,

    /// When the node was first indexed
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,

    /// When the content last changed (or the node was touched)
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

impl NodeStats {
    /// True when every field the reindex protocol relies on is populated
    pub fn is_complete(&self) -> bool {
        !self.hash.is_empty() && self.created.is_some() && self.updated.is_some()
    }
}

/// A fully loaded node: identifier, content and derived records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeIdentifier,
    pub content: String,
    pub meta: NodeMeta,
    pub stats: NodeStats,
}

impl Node {
    pub fn new(id: NodeIdentifier, content: impl Into<String>, meta: NodeMeta, stats: NodeStats) -> Self {
        Self {
            id,
            content: content.into(),
            meta,
            stats,
        }
    }

    pub fn title(&self) -> &str {
        &self.meta.title
    }

    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.stats.updated
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.meta.tags.contains(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_stats_completeness() {
        let mut stats = NodeStats::default();
        assert!(!stats.is_complete());

        stats.hash = "abc".to_string();
        stats.created = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert!(!stats.is_complete());

        stats.updated = stats.created;
        assert!(stats.is_complete());
    }

    #[test]
    fn test_meta_deserializes_with_missing_fields() {
        let meta: NodeMeta = serde_json::from_str(r#"{"title":"Only title"}"#).unwrap();
        assert_eq!(meta.title, "Only title");
        assert!(meta.tags.is_empty());
        assert!(meta.links.is_empty());
    }

    #[test]
    fn test_meta_links_serialize_as_paths() {
        let meta = NodeMeta {
            links: vec![NodeIdentifier::new(3), "zk/4".parse().unwrap()],
            ..Default::default()
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["links"], serde_json::json!(["3", "zk/4"]));
    }
}
