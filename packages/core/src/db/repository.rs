//! Repository Trait - Storage Abstraction Layer
//!
//! The indexing engine never touches raw storage. Everything it persists or
//! reads goes through the [`Repository`] trait: node content and its meta and
//! stats records, named index blobs, the whole-repository config record and
//! a per-node exclusive section primitive.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: methods are async so filesystem and in-memory backends
//!    share one contract
//! 2. **Missing is an error**: absent records surface as
//!    [`StoreError::NotFound`]; callers that treat absence as a state use
//!    [`optional`](crate::db::optional)
//! 3. **Locks are try-only**: the backend offers a non-blocking
//!    `try_lock_node`; waiting, deadlines and reentrancy live in
//!    [`with_node_lock`](crate::services::with_node_lock)
//!
//! # Implementations
//!
//! - [`MemoryRepository`](crate::db::MemoryRepository) - in-process, for tests and tooling
//! - [`FsRepository`](crate::db::FsRepository) - directory per node with lock files

use crate::db::StoreError;
use crate::models::{NodeIdentifier, NodeMeta, NodeStats, RepoConfig};
use async_trait::async_trait;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage contract consumed by the indexing engine
///
/// Implementations must be `Send + Sync` so a repository can be shared as
/// `Arc<dyn Repository>`.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Stable identity of this repository, used to scope lock ownership
    fn key(&self) -> &str;

    //
    // NODE RECORDS
    //

    /// Read node content; `NotFound` if the node does not exist
    async fn read_content(&self, id: &NodeIdentifier) -> StoreResult<String>;

    /// Write node content, creating the node if needed
    async fn write_content(&self, id: &NodeIdentifier, content: &str) -> StoreResult<()>;

    /// Read node metadata; `NotFound` if the node or its meta is absent
    async fn read_meta(&self, id: &NodeIdentifier) -> StoreResult<NodeMeta>;

    /// Write node metadata; `NotFound` if the node does not exist
    async fn write_meta(&self, id: &NodeIdentifier, meta: &NodeMeta) -> StoreResult<()>;

    /// Read node stats; `NotFound` if the node or its stats are absent
    async fn read_stats(&self, id: &NodeIdentifier) -> StoreResult<NodeStats>;

    /// Write node stats; `NotFound` if the node does not exist
    async fn write_stats(&self, id: &NodeIdentifier, stats: &NodeStats) -> StoreResult<()>;

    //
    // NODE SET
    //

    async fn has_node(&self, id: &NodeIdentifier) -> StoreResult<bool>;

    /// All local nodes, ascending
    async fn list_nodes(&self) -> StoreResult<Vec<NodeIdentifier>>;

    /// Allocate a fresh local identifier
    async fn next(&self) -> StoreResult<NodeIdentifier>;

    /// Relocate a node with all its records
    ///
    /// `NotFound` if `src` is absent, `AlreadyExists` if `dst` is occupied.
    async fn move_node(&self, src: &NodeIdentifier, dst: &NodeIdentifier) -> StoreResult<()>;

    /// Delete a node with all its records; `NotFound` if absent
    async fn delete_node(&self, id: &NodeIdentifier) -> StoreResult<()>;

    //
    // INDEX BLOBS
    //

    /// Read a named index artifact (e.g. `dex/tags`); `NotFound` if absent
    async fn get_index(&self, name: &str) -> StoreResult<Vec<u8>>;

    async fn write_index(&self, name: &str, data: &[u8]) -> StoreResult<()>;

    /// Names of every stored index artifact, ascending
    async fn list_indexes(&self) -> StoreResult<Vec<String>>;

    /// Delete every stored index artifact
    async fn clear_indexes(&self) -> StoreResult<()>;

    //
    // CONFIGURATION
    //

    /// Read the config record; `NotFound` if none was ever written
    async fn read_config(&self) -> StoreResult<RepoConfig>;

    async fn write_config(&self, config: &RepoConfig) -> StoreResult<()>;

    //
    // EXCLUSIVE SECTIONS
    //

    /// Try to take the node's exclusive section without waiting
    ///
    /// Returns `Ok(false)` when another holder owns it.
    async fn try_lock_node(&self, id: &NodeIdentifier) -> StoreResult<bool>;

    /// Release the node's exclusive section; releasing a free section is a no-op
    async fn unlock_node(&self, id: &NodeIdentifier) -> StoreResult<()>;

    /// Release a section whose holder unwound or was dropped before `unlock_node`
    ///
    /// Runs inside `Drop`, so it must not block on async work. Best-effort:
    /// failures are logged, not returned.
    fn release_abandoned_lock(&self, id: &NodeIdentifier);
}
