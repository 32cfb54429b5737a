//! Config-declared indexes listing the nodes whose tags satisfy a query.
//!
//! Same markdown shape as `dex/changes.md`. Membership is re-evaluated on
//! every `add`, so a node that loses a required tag drops out.

use crate::index::entry::{EntryList, NodeIndexEntry};
use crate::index::{IndexBuilder, TagExpr};
use crate::models::{Node, NodeIdentifier};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct TagFilteredIndex {
    name: String,
    expr: TagExpr,
    entries: EntryList,
}

impl TagFilteredIndex {
    pub fn new(name: impl Into<String>, expr: TagExpr) -> Self {
        Self {
            name: name.into(),
            expr,
            entries: EntryList::new(),
        }
    }

    pub fn expr(&self) -> &TagExpr {
        &self.expr
    }

    /// Members, newest first
    pub fn entries(&self) -> &[NodeIndexEntry] {
        self.entries.entries()
    }

    pub fn contains(&self, id: &NodeIdentifier) -> bool {
        self.entries.contains(id)
    }

    fn selects(&self, node: &Node) -> bool {
        let path = node.id.path();
        let universe = BTreeSet::from([path.clone()]);
        let resolve = |tag: &str| {
            if node.has_tag(tag) {
                BTreeSet::from([path.clone()])
            } else {
                BTreeSet::new()
            }
        };
        !self.expr.evaluate(&universe, &resolve).is_empty()
    }
}

impl IndexBuilder for TagFilteredIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn add(&mut self, node: &Node) {
        if self.selects(node) {
            self.entries.upsert(NodeIndexEntry::from_node(node));
        } else {
            self.entries.remove(&node.id);
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeMeta, NodeStats};

    fn node(id: u64, tags: &[&str]) -> Node {
        let meta = NodeMeta {
            title: format!("Node {}", id),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        };
        Node::new(NodeIdentifier::new(id), "", meta, NodeStats::default())
    }

    #[test]
    fn test_membership_follows_tags() {
        let expr = TagExpr::parse("todo && !done").unwrap();
        let mut index = TagFilteredIndex::new("dex/todo.md", expr);

        index.add(&node(1, &["todo"]));
        index.add(&node(2, &["todo", "done"]));
        index.add(&node(3, &["misc"]));
        assert!(index.contains(&NodeIdentifier::new(1)));
        assert_eq!(index.entries().len(), 1);

        index.add(&node(1, &["todo", "done"]));
        assert!(index.entries().is_empty());
        assert_eq!(index.name(), "dex/todo.md");
    }

    #[test]
    fn test_negated_query_selects_untagged() {
        let mut index = TagFilteredIndex::new("dex/untagged.md", TagExpr::parse("!draft").unwrap());
        index.add(&node(4, &[]));
        index.add(&node(5, &["draft"]));

        assert_eq!(
            String::from_utf8(index.data()).unwrap(),
            "* 0001-01-01 00:00:00Z [Node 4](../4)\n"
        );
    }
}
