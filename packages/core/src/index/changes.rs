//! `dex/changes.md`: every node, most recently updated first.

use crate::index::entry::{EntryList, NodeIndexEntry};
use crate::index::{IndexBuilder, CHANGES_INDEX};
use crate::models::{Node, NodeIdentifier};

#[derive(Debug, Clone, Default)]
pub struct ChangesIndex {
    entries: EntryList,
}

impl ChangesIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(data: &[u8]) -> Self {
        Self {
            entries: EntryList::parse(data),
        }
    }

    /// Entries newest first
    pub fn entries(&self) -> &[NodeIndexEntry] {
        self.entries.entries()
    }
}

impl IndexBuilder for ChangesIndex {
    fn name(&self) -> &str {
        CHANGES_INDEX
    }

    fn add(&mut self, node: &Node) {
        self.entries.upsert(NodeIndexEntry::from_node(node));
    }

    fn remove(&mut self, id: &NodeIdentifier) {
        self.entries.remove(id);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn data(&self) -> Vec<u8> {
        self.entries.data()
    }
}
