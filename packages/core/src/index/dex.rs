//! The Dex: every index builder of a repository behind one handle.
//!
//! A [`Dex`] owns the five core builders plus any tag-filtered indexes
//! declared in [`RepoConfig::indexes`](crate::models::RepoConfig). Node updates
//! fan out to all of them; [`Dex::write`] persists each artifact under its
//! name.
//!
//! The Dex has no lock of its own. It is meant to be owned by a single
//! coordinator per process (see [`NodeService`](crate::services::NodeService)),
//! which serializes `add`/`remove`/`write` against node-level locks. Two
//! processes writing index artifacts concurrently are not reconciled; the last
//! write wins.

use crate::db::{Repository, StoreResult};
use crate::index::{
    BacklinksIndex, ChangesIndex, IndexBuilder, LinksIndex, NodesIndex, TagExpr, TagExprError,
    TagFilteredIndex, TagsIndex,
};
use crate::models::{IndexConfig, Node, NodeIdentifier};
use tracing::{debug, warn};

pub const CHANGES_INDEX: &str = "dex/changes.md";
pub const NODES_INDEX: &str = "dex/nodes.tsv";
pub const LINKS_INDEX: &str = "dex/links";
pub const BACKLINKS_INDEX: &str = "dex/backlinks";
pub const TAGS_INDEX: &str = "dex/tags";

/// Artifact names no custom index may claim
pub const RESERVED_INDEX_NAMES: [&str; 5] = [
    CHANGES_INDEX,
    NODES_INDEX,
    LINKS_INDEX,
    BACKLINKS_INDEX,
    TAGS_INDEX,
];

const INDEX_DIR: &str = "dex/";

pub fn is_reserved_index_name(name: &str) -> bool {
    RESERVED_INDEX_NAMES.contains(&name)
}

/// Normalize a configured index file to its artifact name
///
/// `todo`, `todo.md`, `./todo.md` and `dex/todo.md` all become
/// `dex/todo.md`. Returns `None` for blank names and for names that resolve to
/// a core artifact, with or without the `.md` suffix.
pub fn custom_index_name(file: &str) -> Option<String> {
    let mut short = file.trim();
    while let Some(rest) = short.strip_prefix("./") {
        short = rest;
    }
    let short = short.strip_prefix(INDEX_DIR).unwrap_or(short);
    if short.is_empty() {
        return None;
    }

    let bare = format!("{}{}", INDEX_DIR, short);
    if is_reserved_index_name(&bare) {
        return None;
    }
    let name = if bare.ends_with(".md") {
        bare
    } else {
        format!("{}.md", bare)
    };
    if is_reserved_index_name(&name) {
        return None;
    }
    Some(name)
}

#[derive(Debug, Clone, Default)]
pub struct Dex {
    nodes: NodesIndex,
    tags: TagsIndex,
    links: LinksIndex,
    backlinks: BacklinksIndex,
    changes: ChangesIndex,
    custom: Vec<TagFilteredIndex>,
}

impl Dex {
    /// Empty Dex with no custom indexes
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the core artifacts from `repo`
    ///
    /// Missing or unreadable artifacts leave their builder empty, so a fresh
    /// or damaged repository still yields a usable Dex. Custom indexes have no
    /// load path; register them and feed every stored node through
    /// [`add_custom`](Self::add_custom) before the next [`write`](Self::write).
    pub async fn from_repository(repo: &dyn Repository) -> Self {
        Self {
            nodes: NodesIndex::parse(&load_artifact(repo, NODES_INDEX).await),
            tags: TagsIndex::parse(&load_artifact(repo, TAGS_INDEX).await),
            links: LinksIndex::parse(&load_artifact(repo, LINKS_INDEX).await),
            backlinks: BacklinksIndex::parse(&load_artifact(repo, BACKLINKS_INDEX).await),
            changes: ChangesIndex::parse(&load_artifact(repo, CHANGES_INDEX).await),
            custom: Vec::new(),
        }
    }

    /// Register the tag-filtered indexes declared in config
    ///
    /// Entries without a query or naming a core artifact are skipped. A
    /// malformed query fails the whole registration. Returns the number of
    /// indexes registered.
    pub fn register_custom_indexes(&mut self, configs: &[IndexConfig]) -> Result<usize, TagExprError> {
        let mut registered = 0;
        for config in configs {
            let Some(query) = config.query() else {
                debug!("Index {} has no tag query, skipping", config.file);
                continue;
            };
            let Some(name) = custom_index_name(&config.file) else {
                warn!("Index {} uses a reserved name, skipping", config.file);
                continue;
            };
            let expr = TagExpr::parse(query)?;
            debug!("Registering index {} for {}", name, expr);
            self.register_custom(TagFilteredIndex::new(name, expr));
            registered += 1;
        }
        Ok(registered)
    }

    /// Register one tag-filtered index, replacing any with the same name
    pub fn register_custom(&mut self, index: TagFilteredIndex) {
        if is_reserved_index_name(index.name()) {
            warn!("Index {} uses a reserved name, skipping", index.name());
            return;
        }
        self.custom.retain(|existing| existing.name() != index.name());
        self.custom.push(index);
    }

    /// Feed one node to every builder
    pub fn add(&mut self, node: &Node) {
        for builder in self.builders_mut() {
            builder.add(node);
        }
    }

    /// Feed one node to the custom builders only
    ///
    /// Used to populate freshly registered indexes from stored records while
    /// the core builders keep what was loaded.
    pub fn add_custom(&mut self, node: &Node) {
        for index in &mut self.custom {
            index.add(node);
        }
    }

    /// Erase one node from every builder
    pub fn remove(&mut self, id: &NodeIdentifier) {
        for builder in self.builders_mut() {
            builder.remove(id);
        }
    }

    /// Empty every builder, keeping custom registrations
    pub fn clear(&mut self) {
        for builder in self.builders_mut() {
            builder.clear();
        }
    }

    /// Persist every artifact under its name
    pub async fn write(&self, repo: &dyn Repository) -> StoreResult<()> {
        for builder in self.builders() {
            repo.write_index(builder.name(), &builder.data()).await?;
        }
        debug!("Wrote {} index artifacts", 5 + self.custom.len());
        Ok(())
    }

    pub fn contains(&self, id: &NodeIdentifier) -> bool {
        self.nodes.contains(id)
    }

    pub fn has_custom_indexes(&self) -> bool {
        !self.custom.is_empty()
    }

    /// Custom index by artifact name or by its configured file form
    pub fn custom(&self, name: &str) -> Option<&TagFilteredIndex> {
        let normalized = custom_index_name(name);
        self.custom
            .iter()
            .find(|c| c.name() == name || Some(c.name()) == normalized.as_deref())
    }

    pub fn custom_names(&self) -> Vec<&str> {
        self.custom.iter().map(|c| c.name()).collect()
    }

    pub fn nodes(&self) -> &NodesIndex {
        &self.nodes
    }

    pub fn tags(&self) -> &TagsIndex {
        &self.tags
    }

    pub fn links(&self) -> &LinksIndex {
        &self.links
    }

    pub fn backlinks(&self) -> &BacklinksIndex {
        &self.backlinks
    }

    pub fn changes(&self) -> &ChangesIndex {
        &self.changes
    }

    fn builders(&self) -> Vec<&dyn IndexBuilder> {
        let mut builders: Vec<&dyn IndexBuilder> = vec![
            &self.nodes,
            &self.tags,
            &self.links,
            &self.backlinks,
            &self.changes,
        ];
        builders.extend(self.custom.iter().map(|c| c as &dyn IndexBuilder));
        builders
    }

    fn builders_mut(&mut self) -> Vec<&mut dyn IndexBuilder> {
        let mut builders: Vec<&mut dyn IndexBuilder> = vec![
            &mut self.nodes,
            &mut self.tags,
            &mut self.links,
            &mut self.backlinks,
            &mut self.changes,
        ];
        builders.extend(self.custom.iter_mut().map(|c| c as &mut dyn IndexBuilder));
        builders
    }
}

async fn load_artifact(repo: &dyn Repository, name: &str) -> Vec<u8> {
    match repo.get_index(name).await {
        Ok(data) => data,
        Err(err) if err.is_not_found() => Vec::new(),
        Err(err) => {
            warn!("Failed to read {}, starting empty: {}", name, err);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRepository;
    use crate::models::{NodeMeta, NodeStats};

    fn node(id: u64, tags: &[&str], links: &[u64]) -> Node {
        let meta = NodeMeta {
            title: format!("Node {}", id),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            links: links.iter().map(|l| NodeIdentifier::new(*l)).collect(),
            ..Default::default()
        };
        let stats = NodeStats {
            updated: Some(format!("2025-01-{:02}T00:00:00Z", id).parse().unwrap()),
            ..Default::default()
        };
        Node::new(NodeIdentifier::new(id), "", meta, stats)
    }

    #[test]
    fn test_custom_index_name_normalization() {
        assert_eq!(custom_index_name("todo").as_deref(), Some("dex/todo.md"));
        assert_eq!(custom_index_name("todo.md").as_deref(), Some("dex/todo.md"));
        assert_eq!(custom_index_name("./dex/todo.md").as_deref(), Some("dex/todo.md"));
        assert_eq!(custom_index_name("  "), None);
        assert_eq!(custom_index_name("dex/tags"), None);
        assert_eq!(custom_index_name("changes"), None);
        assert_eq!(custom_index_name("nodes.tsv"), None);
        assert_eq!(custom_index_name("./links"), None);
    }

    #[test]
    fn test_reserved_names_never_register() {
        let mut dex = Dex::new();
        let configs = vec![
            IndexConfig::new("dex/tags", "todo"),
            IndexConfig::new("dex/changes.md", "todo"),
            IndexConfig {
                file: "empty".to_string(),
                tags: Some("   ".to_string()),
            },
        ];
        assert_eq!(dex.register_custom_indexes(&configs).unwrap(), 0);
        assert!(dex.custom_names().is_empty());
        assert!(!dex.has_custom_indexes());
    }

    #[test]
    fn test_malformed_query_fails_registration() {
        let mut dex = Dex::new();
        let err = dex
            .register_custom_indexes(&[IndexConfig::new("todo", "todo &")])
            .unwrap_err();
        assert!(matches!(err, TagExprError::LoneOperator { .. }));
    }

    #[test]
    fn test_add_and_remove_fan_out() {
        let mut dex = Dex::new();
        dex.register_custom_indexes(&[IndexConfig::new("todo", "todo")])
            .unwrap();

        dex.add(&node(1, &["todo"], &[2]));
        dex.add(&node(2, &[], &[]));
        assert!(dex.contains(&NodeIdentifier::new(1)));
        assert_eq!(dex.tags().members("todo").len(), 1);
        assert!(dex.custom("todo").unwrap().contains(&NodeIdentifier::new(1)));
        assert!(dex
            .backlinks()
            .sources(&NodeIdentifier::new(2))
            .unwrap()
            .contains(&NodeIdentifier::new(1)));

        dex.remove(&NodeIdentifier::new(1));
        assert!(!dex.contains(&NodeIdentifier::new(1)));
        assert!(dex.tags().members("todo").is_empty());
        assert!(dex.custom("dex/todo.md").unwrap().entries().is_empty());
        assert!(dex.changes().entries().iter().all(|e| e.id.id != 1));
        assert!(dex.backlinks().sources(&NodeIdentifier::new(2)).unwrap().is_empty());
    }

    #[test]
    fn test_clear_keeps_registrations() {
        let mut dex = Dex::new();
        dex.register_custom_indexes(&[IndexConfig::new("todo", "todo")])
            .unwrap();
        dex.add(&node(1, &["todo"], &[]));
        dex.clear();

        assert!(dex.nodes().is_empty());
        assert_eq!(dex.custom_names(), vec!["dex/todo.md"]);
        assert!(dex.custom("todo").unwrap().entries().is_empty());
    }

    #[test]
    fn test_add_custom_leaves_core_builders_alone() {
        let mut dex = Dex::new();
        dex.register_custom_indexes(&[IndexConfig::new("todo", "todo")])
            .unwrap();
        dex.add_custom(&node(3, &["todo"], &[1]));

        assert!(dex.custom("todo").unwrap().contains(&NodeIdentifier::new(3)));
        assert!(!dex.contains(&NodeIdentifier::new(3)));
        assert!(dex.tags().members("todo").is_empty());
        assert!(dex.links().targets(&NodeIdentifier::new(3)).is_none());
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let repo = MemoryRepository::new();
        let mut dex = Dex::new();
        dex.register_custom_indexes(&[IndexConfig::new("todo", "todo")])
            .unwrap();
        dex.add(&node(1, &["todo"], &[2]));
        dex.add(&node(2, &["misc"], &[]));
        dex.write(&repo).await.unwrap();

        let mut names = repo.list_indexes().await.unwrap();
        names.sort();
        assert_eq!(
            names,
            vec![
                "dex/backlinks",
                "dex/changes.md",
                "dex/links",
                "dex/nodes.tsv",
                "dex/tags",
                "dex/todo.md"
            ]
        );

        let loaded = Dex::from_repository(&repo).await;
        assert!(loaded.contains(&NodeIdentifier::new(2)));
        assert_eq!(loaded.tags().data(), dex.tags().data());
        assert_eq!(loaded.changes().data(), dex.changes().data());
        assert!(!loaded.has_custom_indexes());
    }

    #[tokio::test]
    async fn test_load_from_empty_repository() {
        let repo = MemoryRepository::new();
        repo.write_index(TAGS_INDEX, b"\xff\xfe garbage\n").await.unwrap();

        let dex = Dex::from_repository(&repo).await;
        assert!(dex.nodes().is_empty());
        assert!(dex.tags().tag_names().next().is_none());
    }
}
