//! `dex/links` and `dex/backlinks`: outgoing and incoming link adjacency.
//!
//! Both artifacts share one line shape, `<id>\t<id1> <id2> ...`, sources and
//! neighbours ascending. A node known to have no neighbours keeps an explicit
//! empty entry (the line still carries its tab).

use crate::index::{IndexBuilder, BACKLINKS_INDEX, LINKS_INDEX};
use crate::models::{Node, NodeIdentifier};
use std::collections::{BTreeMap, BTreeSet};

type Adjacency = BTreeMap<NodeIdentifier, BTreeSet<NodeIdentifier>>;

fn parse_adjacency(data: &[u8], name: &str) -> Adjacency {
    let mut map = Adjacency::new();
    let text = String::from_utf8_lossy(data);
    let mut skipped = 0usize;

    for line in text.lines().filter(|l| !l.is_empty()) {
        let Some((source, neighbours)) = line.split_once('\t') else {
            skipped += 1;
            continue;
        };
        let Ok(source) = source.parse::<NodeIdentifier>() else {
            skipped += 1;
            continue;
        };
        let neighbours: Result<BTreeSet<NodeIdentifier>, _> = neighbours
            .split_whitespace()
            .map(str::parse::<NodeIdentifier>)
            .collect();
        match neighbours {
            Ok(neighbours) => map.entry(source).or_default().extend(neighbours),
            Err(_) => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!("Skipped {} malformed lines in {}", skipped, name);
    }
    map
}

fn adjacency_data(map: &Adjacency) -> Vec<u8> {
    let mut out = String::new();
    for (source, neighbours) in map {
        out.push_str(&source.path());
        out.push('\t');
        let joined: Vec<String> = neighbours.iter().map(NodeIdentifier::path).collect();
        out.push_str(&joined.join(" "));
        out.push('\n');
    }
    out.into_bytes()
}

fn purge(map: &mut Adjacency, id: &NodeIdentifier) {
    map.remove(id);
    for neighbours in map.values_mut() {
        neighbours.remove(id);
    }
}

/// Node to the nodes it links to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinksIndex {
    links: Adjacency,
}

impl LinksIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(data: &[u8]) -> Self {
        Self {
            links: parse_adjacency(data, LINKS_INDEX),
        }
    }

    /// Outgoing links of `id`, `None` if the node has no entry
    pub fn targets(&self, id: &NodeIdentifier) -> Option<&BTreeSet<NodeIdentifier>> {
        self.links.get(id)
    }

    pub fn sources(&self) -> impl Iterator<Item = &NodeIdentifier> {
        self.links.keys()
    }
}

impl IndexBuilder for LinksIndex {
    fn name(&self) -> &str {
        LINKS_INDEX
    }

    fn add(&mut self, node: &Node) {
        self.links
            .insert(node.id.clone(), node.meta.links.iter().cloned().collect());
    }

    fn remove(&mut self, id: &NodeIdentifier) {
        purge(&mut self.links, id);
    }

    fn clear(&mut self) {
        self.links.clear();
    }

    fn data(&self) -> Vec<u8> {
        adjacency_data(&self.links)
    }
}

/// Node to the nodes linking to it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BacklinksIndex {
    backlinks: Adjacency,
}

impl BacklinksIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(data: &[u8]) -> Self {
        Self {
            backlinks: parse_adjacency(data, BACKLINKS_INDEX),
        }
    }

    /// Nodes linking to `id`, `None` if the node has no entry
    pub fn sources(&self, id: &NodeIdentifier) -> Option<&BTreeSet<NodeIdentifier>> {
        self.backlinks.get(id)
    }
}

impl IndexBuilder for BacklinksIndex {
    fn name(&self) -> &str {
        BACKLINKS_INDEX
    }

    fn add(&mut self, node: &Node) {
        for sources in self.backlinks.values_mut() {
            sources.remove(&node.id);
        }
        for target in &node.meta.links {
            self.backlinks
                .entry(target.clone())
                .or_default()
                .insert(node.id.clone());
        }
        self.backlinks.entry(node.id.clone()).or_default();
    }

    fn remove(&mut self, id: &NodeIdentifier) {
        purge(&mut self.backlinks, id);
    }

    fn clear(&mut self) {
        self.backlinks.clear();
    }

    fn data(&self) -> Vec<u8> {
        adjacency_data(&self.backlinks)
    }
}
