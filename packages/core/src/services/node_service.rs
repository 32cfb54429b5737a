//! Node Service - Coordinator for Node Writes and the Dex
//!
//! [`NodeService`] is the single in-process owner of a repository's [`Dex`].
//! Every operation that changes a node (create, update, touch, move, remove,
//! reindex) goes through it, so index updates are serialized against the
//! per-node locks taken for the node writes themselves.
//!
//! # Dex cache
//!
//! The Dex is loaded lazily on first use and then kept for the lifetime of the
//! service; it is never refreshed in the background. That is only correct
//! while this service is the sole coordinator for the repository in this
//! process. Call [`NodeService::reload_dex`] after the repository's index
//! artifacts were changed behind its back.
//!
//! # Lock order
//!
//! Operations take the Dex cache first and node locks second. Internal helpers
//! that expect the cache to be held take `&mut Dex` explicitly.

use crate::db::{optional, Repository};
use crate::index::Dex;
use crate::models::time::{SystemTimeProvider, TimeProvider};
use crate::models::{LockSettings, Node, NodeIdentifier, NodeStats, RepoConfig};
use crate::services::{with_node_lock, DexError};
use crate::utils::{content_hash, ContentAnalyzer, MarkdownAnalyzer};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Coordinates node writes, the cached Dex and the reindex watermark
pub struct NodeService {
    pub(crate) repo: Arc<dyn Repository>,
    pub(crate) analyzer: Arc<dyn ContentAnalyzer>,
    pub(crate) clock: Arc<dyn TimeProvider>,
    pub(crate) lock_settings: LockSettings,
    pub(crate) dex: Mutex<Option<Dex>>,
}

impl NodeService {
    /// Create a service over `repo`
    ///
    /// Lock timings come from the repository config (defaults when the
    /// repository has none yet). Content is analyzed with
    /// [`MarkdownAnalyzer`] and timestamps come from the system clock.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use nodedex_core::db::MemoryRepository;
    /// # use nodedex_core::services::NodeService;
    /// # use std::sync::Arc;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let service = NodeService::new(Arc::new(MemoryRepository::new())).await?;
    /// let node = service.create("# Hello\n\nFirst note.\n").await?;
    /// assert_eq!(node.meta.title, "Hello");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(repo: Arc<dyn Repository>) -> Result<Self, DexError> {
        let config = load_config(repo.as_ref()).await?;
        Ok(Self {
            repo,
            analyzer: Arc::new(MarkdownAnalyzer::new()),
            clock: Arc::new(SystemTimeProvider),
            lock_settings: config.lock,
            dex: Mutex::new(None),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn ContentAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_lock_settings(mut self, settings: LockSettings) -> Self {
        self.lock_settings = settings;
        self
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn lock_settings(&self) -> &LockSettings {
        &self.lock_settings
    }

    /// Current repository config, defaults if none was written yet
    pub async fn config(&self) -> Result<RepoConfig, DexError> {
        load_config(self.repo.as_ref()).await
    }

    //
    // NODE OPERATIONS
    //

    /// Store new content under a freshly allocated id
    pub async fn create(&self, content: &str) -> Result<Node, DexError> {
        let mut cache = self.dex.lock().await;
        let dex = self.cached_dex(&mut cache).await?;

        let id = self.repo.next().await?;
        let node = with_node_lock(self.repo.as_ref(), &self.lock_settings, &id, || async {
            self.repo.write_content(&id, content).await?;
            self.refresh(&id).await
        })
        .await?;

        dex.add(&node);
        dex.write(self.repo.as_ref()).await?;
        info!("Created node {}", node.id);
        Ok(node)
    }

    /// Replace the content of an existing node
    pub async fn update(&self, id: &NodeIdentifier, content: &str) -> Result<Node, DexError> {
        let mut cache = self.dex.lock().await;
        let dex = self.cached_dex(&mut cache).await?;

        if !self.repo.has_node(id).await? {
            return Err(DexError::not_found(id.path()));
        }
        let node = with_node_lock(self.repo.as_ref(), &self.lock_settings, id, || async {
            self.repo.write_content(id, content).await?;
            self.refresh(id).await
        })
        .await?;

        dex.add(&node);
        dex.write(self.repo.as_ref()).await?;
        debug!("Updated node {}", id);
        Ok(node)
    }

    /// Mark a node as updated now without changing its content
    pub async fn touch(&self, id: &NodeIdentifier) -> Result<Node, DexError> {
        let mut cache = self.dex.lock().await;
        let dex = self.cached_dex(&mut cache).await?;

        let node = with_node_lock(self.repo.as_ref(), &self.lock_settings, id, || async {
            let content = self.repo.read_content(id).await?;
            let meta = optional(self.repo.read_meta(id).await)?;
            let stats = optional(self.repo.read_stats(id).await)?;
            let mut node = match (meta, stats) {
                (Some(meta), Some(stats)) if stats.hash == content_hash(&content) => {
                    Node::new(id.clone(), content, meta, stats)
                }
                (_, stats) => self.analyze(id, content, stats.as_ref()),
            };
            node.stats.updated = Some(self.clock.now());
            self.persist(&node).await?;
            Ok(node)
        })
        .await?;

        dex.add(&node);
        dex.write(self.repo.as_ref()).await?;
        debug!("Touched node {}", id);
        Ok(node)
    }

    /// Load content, meta and stats of a node
    pub async fn get(&self, id: &NodeIdentifier) -> Result<Node, DexError> {
        let content = self.repo.read_content(id).await?;
        let meta = self.repo.read_meta(id).await?;
        let stats = self.repo.read_stats(id).await?;
        Ok(Node::new(id.clone(), content, meta, stats))
    }

    //
    // DEX ACCESS
    //

    /// Snapshot of the cached Dex, loading it first if needed
    pub async fn dex(&self) -> Result<Dex, DexError> {
        self.with_dex(|dex| dex.clone()).await
    }

    /// Run `f` against the cached Dex, loading it first if needed
    pub async fn with_dex<R>(&self, f: impl FnOnce(&Dex) -> R) -> Result<R, DexError> {
        let mut cache = self.dex.lock().await;
        let dex = self.cached_dex(&mut cache).await?;
        Ok(f(dex))
    }

    /// Drop the cached Dex; the next operation reloads it from the repository
    pub async fn reload_dex(&self) {
        *self.dex.lock().await = None;
    }

    //
    // HELPERS
    //

    /// The cached Dex, loading artifacts and custom indexes on first use
    pub(crate) async fn cached_dex<'a>(
        &self,
        cache: &'a mut Option<Dex>,
    ) -> Result<&'a mut Dex, DexError> {
        let dex = match cache.take() {
            Some(dex) => dex,
            None => {
                let config = self.config().await?;
                let mut dex = Dex::from_repository(self.repo.as_ref()).await;
                let custom = dex.register_custom_indexes(&config.indexes)?;
                if custom > 0 {
                    let seeded = self.seed_custom_indexes(&mut dex).await?;
                    debug!("Loaded dex with {} custom indexes over {} nodes", custom, seeded);
                } else {
                    debug!("Loaded dex without custom indexes");
                }
                dex
            }
        };
        Ok(cache.insert(dex))
    }

    /// Populate freshly registered custom indexes from stored records
    ///
    /// Custom indexes have no stored form to load, and a write before they
    /// saw every node would truncate their artifacts. Nodes without meta or
    /// stats are skipped; the next reindex derives and adds them.
    async fn seed_custom_indexes(&self, dex: &mut Dex) -> Result<usize, DexError> {
        let mut seeded = 0;
        for id in self.repo.list_nodes().await? {
            let meta = optional(self.repo.read_meta(&id).await);
            let stats = optional(self.repo.read_stats(&id).await);
            match (meta, stats) {
                (Ok(Some(meta)), Ok(Some(stats))) => {
                    dex.add_custom(&Node::new(id, "", meta, stats));
                    seeded += 1;
                }
                (Err(err), _) | (_, Err(err)) => {
                    warn!("Skipping node {} while loading custom indexes: {}", id, err);
                }
                _ => debug!("Node {} has no derived records yet", id),
            }
        }
        Ok(seeded)
    }

    /// Derive meta and stats for `content`
    ///
    /// `created` survives from `previous`; `updated` moves to now only when
    /// the content hash changed.
    pub(crate) fn analyze(
        &self,
        id: &NodeIdentifier,
        content: String,
        previous: Option<&NodeStats>,
    ) -> Node {
        let meta = self.analyzer.analyze(&content);
        let hash = content_hash(&content);
        let now = self.clock.now();

        let created = previous.and_then(|stats| stats.created).or(Some(now));
        let updated = match previous {
            Some(stats) if stats.hash == hash => stats.updated.or(Some(now)),
            _ => Some(now),
        };

        Node::new(id.clone(), content, meta, NodeStats { hash, created, updated })
    }

    /// Recompute and store meta and stats from the stored content
    pub(crate) async fn refresh(&self, id: &NodeIdentifier) -> Result<Node, DexError> {
        let content = self.repo.read_content(id).await?;
        let previous = optional(self.repo.read_stats(id).await)?;
        let node = self.analyze(id, content, previous.as_ref());
        self.persist(&node).await?;
        Ok(node)
    }

    /// Write meta and stats inside the node's exclusive section
    pub(crate) async fn persist(&self, node: &Node) -> Result<(), DexError> {
        with_node_lock(self.repo.as_ref(), &self.lock_settings, &node.id, || async {
            self.repo.write_meta(&node.id, &node.meta).await?;
            self.repo.write_stats(&node.id, &node.stats).await?;
            Ok(())
        })
        .await
    }
}

async fn load_config(repo: &dyn Repository) -> Result<RepoConfig, DexError> {
    Ok(optional(repo.read_config().await)?.unwrap_or_default())
}

#[cfg(test)]
#[path = "node_service_test.rs"]
mod node_service_test;
