//! `dex/tags`: tag name to member nodes.
//!
//! One line per tag, tags in lexicographic order, members ascending:
//! `<tag> <id1> <id2> ...`. Tags without members are never written.

use crate::index::{IndexBuilder, TAGS_INDEX};
use crate::models::{Node, NodeIdentifier};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagsIndex {
    tags: BTreeMap<String, BTreeSet<NodeIdentifier>>,
}

impl TagsIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lenient parse; a line is dropped if it has no members or any bad id
    pub fn parse(data: &[u8]) -> Self {
        let mut index = Self::new();
        let text = String::from_utf8_lossy(data);
        let mut skipped = 0usize;

        for line in text.lines() {
            let mut fields = line.split_whitespace();
            let Some(tag) = fields.next() else {
                continue;
            };
            let members: Result<BTreeSet<NodeIdentifier>, _> =
                fields.map(str::parse::<NodeIdentifier>).collect();
            match members {
                Ok(members) if !members.is_empty() => {
                    index.tags.entry(tag.to_string()).or_default().extend(members);
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::debug!("Skipped {} malformed lines in {}", skipped, TAGS_INDEX);
        }
        index
    }

    /// Members of `tag`, ascending
    pub fn members(&self, tag: &str) -> BTreeSet<NodeIdentifier> {
        self.tags.get(tag).cloned().unwrap_or_default()
    }

    /// Tags with at least one member
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags
            .iter()
            .filter(|(_, members)| !members.is_empty())
            .map(|(tag, _)| tag.as_str())
    }

    /// Tags `id` is currently a member of
    pub fn tags_of(&self, id: &NodeIdentifier) -> BTreeSet<&str> {
        self.tags
            .iter()
            .filter(|(_, members)| members.contains(id))
            .map(|(tag, _)| tag.as_str())
            .collect()
    }
}

impl IndexBuilder for TagsIndex {
    fn name(&self) -> &str {
        TAGS_INDEX
    }

    fn add(&mut self, node: &Node) {
        // drop tags the node no longer carries; emptied tags stay in memory
        for (tag, members) in self.tags.iter_mut() {
            if !node.meta.tags.contains(tag) {
                members.remove(&node.id);
            }
        }
        for tag in &node.meta.tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(node.id.clone());
        }
    }

    fn remove(&mut self, id: &NodeIdentifier) {
        for members in self.tags.values_mut() {
            members.remove(id);
        }
        self.tags.retain(|_, members| !members.is_empty());
    }

    fn clear(&mut self) {
        self.tags.clear();
    }

    fn data(&self) -> Vec<u8> {
        let mut out = String::new();
        for (tag, members) in &self.tags {
            if members.is_empty() {
                continue;
            }
            out.push_str(tag);
            for member in members {
                out.push(' ');
                out.push_str(&member.path());
            }
            out.push('\n');
        }
        out.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeMeta, NodeStats};

    fn node(id: u64, tags: &[&str]) -> Node {
        let meta = NodeMeta {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        };
        Node::new(NodeIdentifier::new(id), "", meta, NodeStats::default())
    }

    fn text(index: &TagsIndex) -> String {
        String::from_utf8(index.data()).unwrap()
    }

    #[test]
    fn test_members_sorted_numerically() {
        let mut index = TagsIndex::new();
        index.add(&node(10, &["rust", "notes"]));
        index.add(&node(9, &["rust"]));
        index.add(&node(10, &["rust", "notes"]));

        assert_eq!(text(&index), "notes 10\nrust 9 10\n");
    }

    #[test]
    fn test_add_drops_removed_tags() {
        let mut index = TagsIndex::new();
        index.add(&node(1, &["todo", "work"]));
        index.add(&node(1, &["work"]));

        assert!(index.members("todo").is_empty());
        assert_eq!(text(&index), "work 1\n");
        assert_eq!(index.tag_names().collect::<Vec<_>>(), vec!["work"]);
    }

    #[test]
    fn test_remove_purges_everywhere() {
        let mut index = TagsIndex::new();
        index.add(&node(1, &["a", "b"]));
        index.add(&node(2, &["b"]));
        index.remove(&NodeIdentifier::new(1));
        index.remove(&NodeIdentifier::new(42));

        assert_eq!(text(&index), "b 2\n");
        assert!(index.tags_of(&NodeIdentifier::new(1)).is_empty());
    }

    #[test]
    fn test_lenient_parse() {
        let raw = "rust 3 1 2 2\nlonely\nbroken 1 two\n\nnotes notes/4 5\n";
        let index = TagsIndex::parse(raw.as_bytes());

        assert_eq!(text(&index), "notes notes/4 5\nrust 1 2 3\n");
        let data = index.data();
        assert_eq!(TagsIndex::parse(&data).data(), data);
    }
}
