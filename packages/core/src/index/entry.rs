//! Recency entries shared by the nodes, changes and tag-filtered indexes.

use crate::models::{Node, NodeIdentifier};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Timestamp layout used by every text index
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%SZ";

/// Serialized form of a missing (zero) timestamp
pub const ZERO_TIMESTAMP: &str = "0001-01-01 00:00:00Z";

static CHANGE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\* (\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}Z) \[(.*)\]\(\.\./([^)\s]+)\)$").unwrap()
});

/// Render a timestamp, `None` becoming the zero sentinel
pub fn format_timestamp(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(time) => time.format(TIMESTAMP_FORMAT).to_string(),
        None => ZERO_TIMESTAMP.to_string(),
    }
}

/// Parse a rendered timestamp; the zero sentinel yields `Some(None)`
pub fn parse_timestamp(raw: &str) -> Option<Option<DateTime<Utc>>> {
    let raw = raw.trim();
    if raw == ZERO_TIMESTAMP {
        return Some(None);
    }
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Some(Utc.from_utc_datetime(&naive)))
}

/// Titles are single-line in every index
pub(crate) fn flatten_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if c == '\t' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// One node as seen by a recency index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIndexEntry {
    pub id: NodeIdentifier,
    pub title: String,
    pub updated: Option<DateTime<Utc>>,
}

impl NodeIndexEntry {
    pub fn new(id: NodeIdentifier, title: impl Into<String>, updated: Option<DateTime<Utc>>) -> Self {
        Self {
            id,
            title: title.into(),
            updated,
        }
    }

    pub fn from_node(node: &Node) -> Self {
        Self::new(node.id.clone(), node.title(), node.updated())
    }

    /// `* YYYY-MM-DD HH:MM:SSZ [title](../id)`
    fn change_line(&self) -> String {
        format!(
            "* {} [{}](../{})\n",
            format_timestamp(self.updated),
            flatten_title(&self.title),
            self.id
        )
    }

    fn parse_change_line(line: &str) -> Option<Self> {
        let caps = CHANGE_LINE.captures(line)?;
        let updated = parse_timestamp(&caps[1])?;
        let id = caps[3].parse().ok()?;
        Some(Self::new(id, &caps[2], updated))
    }
}

/// Entries kept newest first
///
/// Sorting is stable, so entries sharing a timestamp keep their relative
/// insertion/update order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryList {
    entries: Vec<NodeIndexEntry>,
}

impl EntryList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry with the same id (or append) and re-sort
    pub fn upsert(&mut self, entry: NodeIndexEntry) {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self.entries.sort_by(|a, b| b.updated.cmp(&a.updated));
    }

    pub fn remove(&mut self, id: &NodeIdentifier) {
        self.entries.retain(|e| &e.id != id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[NodeIndexEntry] {
        &self.entries
    }

    pub fn contains(&self, id: &NodeIdentifier) -> bool {
        self.entries.iter().any(|e| &e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Markdown changelog form, newest first
    pub fn data(&self) -> Vec<u8> {
        self.entries
            .iter()
            .map(NodeIndexEntry::change_line)
            .collect::<String>()
            .into_bytes()
    }

    /// Lenient parse of the markdown changelog form
    ///
    /// Lines that do not match the changelog shape are skipped. The stored
    /// order is kept as is.
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match NodeIndexEntry::parse_change_line(line) {
                Some(entry) if !entries.iter().any(|e: &NodeIndexEntry| e.id == entry.id) => {
                    entries.push(entry)
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!("Skipped {} malformed changelog lines", skipped);
        }
        Self { entries }
    }
}
