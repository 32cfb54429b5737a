//! `dex/nodes.tsv`: every indexed node with its title and update time.
//!
//! Lines keep the order nodes were added in, one per node:
//! `<id>\t<updated-or-empty>\t<title>`.

use crate::index::entry::{flatten_title, format_timestamp, parse_timestamp, NodeIndexEntry};
use crate::index::{IndexBuilder, NODES_INDEX};
use crate::models::{Node, NodeIdentifier};

#[derive(Debug, Clone, Default)]
pub struct NodesIndex {
    entries: Vec<NodeIndexEntry>,
    max_id: u64,
}

impl NodesIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lenient parse; lines without both tabs or with a bad id or timestamp are skipped
    pub fn parse(data: &[u8]) -> Self {
        let mut index = Self::new();
        let text = String::from_utf8_lossy(data);
        let mut skipped = 0usize;

        for line in text.lines().filter(|l| !l.is_empty()) {
            let mut fields = line.splitn(3, '\t');
            let (Some(id), Some(updated), Some(title)) = (fields.next(), fields.next(), fields.next())
            else {
                skipped += 1;
                continue;
            };
            let Ok(id) = id.parse::<NodeIdentifier>() else {
                skipped += 1;
                continue;
            };
            let updated = if updated.is_empty() {
                None
            } else {
                match parse_timestamp(updated) {
                    Some(updated) => updated,
                    None => {
                        skipped += 1;
                        continue;
                    }
                }
            };
            index.upsert(NodeIndexEntry::new(id, title, updated));
        }

        if skipped > 0 {
            tracing::debug!("Skipped {} malformed lines in {}", skipped, NODES_INDEX);
        }
        index
    }

    fn upsert(&mut self, entry: NodeIndexEntry) {
        if entry.id.is_local() {
            self.max_id = self.max_id.max(entry.id.id);
        }
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, id: &NodeIdentifier) -> Option<&NodeIndexEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    pub fn contains(&self, id: &NodeIdentifier) -> bool {
        self.get(id).is_some()
    }

    pub fn entries(&self) -> &[NodeIndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest local id currently indexed
    pub fn max_id(&self) -> u64 {
        self.max_id
    }

    /// Hint for the next local id
    pub fn next_id(&self) -> u64 {
        self.max_id + 1
    }
}

impl IndexBuilder for NodesIndex {
    fn name(&self) -> &str {
        NODES_INDEX
    }

    fn add(&mut self, node: &Node) {
        self.upsert(NodeIndexEntry::from_node(node));
    }

    fn remove(&mut self, id: &NodeIdentifier) {
        self.entries.retain(|e| &e.id != id);
        self.max_id = self
            .entries
            .iter()
            .filter(|e| e.id.is_local())
            .map(|e| e.id.id)
            .max()
            .unwrap_or(0);
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.max_id = 0;
    }

    fn data(&self) -> Vec<u8> {
        let mut out = String::new();
        for entry in &self.entries {
            let updated = match entry.updated {
                Some(_) => format_timestamp(entry.updated),
                None => String::new(),
            };
            out.push_str(&format!(
                "{}\t{}\t{}\n",
                entry.id,
                updated,
                flatten_title(&entry.title)
            ));
        }
        out.into_bytes()
    }
}
