//! Index builder contract.

use crate::models::{Node, NodeIdentifier};

/// One derived, serializable artifact over the node set
///
/// Builders hold plain in-memory state and are not synchronized; the owning
/// [`Dex`](crate::index::Dex) is driven from a single coordinator. Updates are
/// infallible: every in-memory state a builder can reach serializes cleanly.
pub trait IndexBuilder: Send + Sync {
    /// Artifact name under which [`data`](Self::data) is persisted
    fn name(&self) -> &str;

    /// Incorporate or refresh one node's contribution
    fn add(&mut self, node: &Node);

    /// Erase one node's contribution; unknown ids are ignored
    fn remove(&mut self, id: &NodeIdentifier);

    /// Drop all in-memory state
    fn clear(&mut self);

    /// Canonical serialized form
    fn data(&self) -> Vec<u8>;
}
