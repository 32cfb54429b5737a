//! In-memory repository
//!
//! Keeps every record in a single mutex-guarded map. Used by tests and by
//! tooling that wants a scratch repository; nothing survives the process.
//!
//! Besides the [`Repository`] contract it offers a few hooks for exercising
//! failure paths: injected write failures per node and dropping a node's
//! meta or stats record.

use crate::db::{Repository, StoreError, StoreResult};
use crate::models::{NodeIdentifier, NodeMeta, NodeStats, RepoConfig};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct StoredNode {
    content: String,
    meta: Option<NodeMeta>,
    stats: Option<NodeStats>,
}

#[derive(Debug, Default)]
struct MemoryState {
    nodes: BTreeMap<NodeIdentifier, StoredNode>,
    indexes: BTreeMap<String, Vec<u8>>,
    config: Option<RepoConfig>,
    locks: HashSet<NodeIdentifier>,
    last_allocated: u64,
    failing_writes: HashSet<NodeIdentifier>,
}

/// Repository held entirely in process memory
#[derive(Debug)]
pub struct MemoryRepository {
    key: String,
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            key: format!("memory:{}", Uuid::new_v4()),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Make every content/meta/stats write for `id` fail
    pub fn fail_writes_for(&self, id: &NodeIdentifier) {
        self.state().failing_writes.insert(id.clone());
    }

    /// Drop the node's meta record, keeping content and stats
    pub fn discard_meta(&self, id: &NodeIdentifier) {
        if let Some(node) = self.state().nodes.get_mut(id) {
            node.meta = None;
        }
    }

    /// Drop the node's stats record, keeping content and meta
    pub fn discard_stats(&self, id: &NodeIdentifier) {
        if let Some(node) = self.state().nodes.get_mut(id) {
            node.stats = None;
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryState {
    fn node(&self, id: &NodeIdentifier) -> StoreResult<&StoredNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| StoreError::not_found("node", id.path()))
    }

    fn writable_node(&mut self, id: &NodeIdentifier) -> StoreResult<&mut StoredNode> {
        if self.failing_writes.contains(id) {
            return Err(StoreError::injected(id.path()));
        }
        self.nodes
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("node", id.path()))
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    fn key(&self) -> &str {
        &self.key
    }

    async fn read_content(&self, id: &NodeIdentifier) -> StoreResult<String> {
        Ok(self.state().node(id)?.content.clone())
    }

    async fn write_content(&self, id: &NodeIdentifier, content: &str) -> StoreResult<()> {
        let mut state = self.state();
        if state.failing_writes.contains(id) {
            return Err(StoreError::injected(id.path()));
        }
        state.nodes.entry(id.clone()).or_default().content = content.to_string();
        Ok(())
    }

    async fn read_meta(&self, id: &NodeIdentifier) -> StoreResult<NodeMeta> {
        self.state()
            .node(id)?
            .meta
            .clone()
            .ok_or_else(|| StoreError::not_found("meta", id.path()))
    }

    async fn write_meta(&self, id: &NodeIdentifier, meta: &NodeMeta) -> StoreResult<()> {
        self.state().writable_node(id)?.meta = Some(meta.clone());
        Ok(())
    }

    async fn read_stats(&self, id: &NodeIdentifier) -> StoreResult<NodeStats> {
        self.state()
            .node(id)?
            .stats
            .clone()
            .ok_or_else(|| StoreError::not_found("stats", id.path()))
    }

    async fn write_stats(&self, id: &NodeIdentifier, stats: &NodeStats) -> StoreResult<()> {
        self.state().writable_node(id)?.stats = Some(stats.clone());
        Ok(())
    }

    async fn has_node(&self, id: &NodeIdentifier) -> StoreResult<bool> {
        Ok(self.state().nodes.contains_key(id))
    }

    async fn list_nodes(&self) -> StoreResult<Vec<NodeIdentifier>> {
        Ok(self.state().nodes.keys().cloned().collect())
    }

    async fn next(&self) -> StoreResult<NodeIdentifier> {
        let mut state = self.state();
        let highest = state
            .nodes
            .keys()
            .filter(|id| id.is_local())
            .map(|id| id.id)
            .max()
            .unwrap_or(0);
        let next = highest.max(state.last_allocated) + 1;
        state.last_allocated = next;
        Ok(NodeIdentifier::new(next))
    }

    async fn move_node(&self, src: &NodeIdentifier, dst: &NodeIdentifier) -> StoreResult<()> {
        let mut state = self.state();
        if state.nodes.contains_key(dst) {
            return Err(StoreError::already_exists(dst.path()));
        }
        let node = state
            .nodes
            .remove(src)
            .ok_or_else(|| StoreError::not_found("node", src.path()))?;
        state.nodes.insert(dst.clone(), node);
        Ok(())
    }

    async fn delete_node(&self, id: &NodeIdentifier) -> StoreResult<()> {
        let mut state = self.state();
        state
            .nodes
            .remove(id)
            .ok_or_else(|| StoreError::not_found("node", id.path()))?;
        Ok(())
    }

    async fn get_index(&self, name: &str) -> StoreResult<Vec<u8>> {
        self.state()
            .indexes
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("index", name))
    }

    async fn write_index(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        self.state()
            .indexes
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn list_indexes(&self) -> StoreResult<Vec<String>> {
        Ok(self.state().indexes.keys().cloned().collect())
    }

    async fn clear_indexes(&self) -> StoreResult<()> {
        self.state().indexes.clear();
        Ok(())
    }

    async fn read_config(&self) -> StoreResult<RepoConfig> {
        self.state()
            .config
            .clone()
            .ok_or_else(|| StoreError::not_found("config", "config"))
    }

    async fn write_config(&self, config: &RepoConfig) -> StoreResult<()> {
        self.state().config = Some(config.clone());
        Ok(())
    }

    async fn try_lock_node(&self, id: &NodeIdentifier) -> StoreResult<bool> {
        Ok(self.state().locks.insert(id.clone()))
    }

    async fn unlock_node(&self, id: &NodeIdentifier) -> StoreResult<()> {
        self.state().locks.remove(id);
        Ok(())
    }

    fn release_abandoned_lock(&self, id: &NodeIdentifier) {
        self.state().locks.remove(id);
    }
}
