//! Business Services
//!
//! This module contains the orchestration layer of NodeDex:
//!
//! - [`NodeService`] - single coordinator owning the cached [`Dex`](crate::index::Dex)
//! - `reindex` - per-node refresh decisions and the watermark protocol
//! - `relink` - move and remove with link rewriting
//! - [`with_node_lock`] - retrying, deadline-bounded, reentrant node locks
//! - [`DexError`] - error taxonomy shared by all of the above

pub mod error;
mod lock;
mod node_service;
mod reindex;
mod relink;

pub use error::{DexError, NodeErrors};
pub use lock::{holds_node_lock, with_node_lock};
pub use node_service::NodeService;
pub use reindex::{ReindexMode, ReindexReport};
pub use relink::rewrite_links;
