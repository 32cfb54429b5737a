//! NodeDex Core Indexing Engine
//!
//! This crate keeps the derived indexes of a NodeDex knowledge base (recency,
//! tags, links, backlinks and config-declared tag queries) consistent with
//! the stored nodes across create, update, move, remove and reindex.
//!
//! # Architecture
//!
//! - **Repository trait**: all storage goes through [`db::Repository`]
//! - **Index builders**: one in-memory builder per artifact, driven together by [`index::Dex`]
//! - **Single coordinator**: [`services::NodeService`] owns the cached Dex and the node locks
//! - **Lenient loading**: damaged index artifacts lose lines, never the whole index
//!
//! # Modules
//!
//! - [`models`] - Node identifiers, nodes, config and clock
//! - [`db`] - Repository contract with in-memory and filesystem backends
//! - [`index`] - Tag queries, index builders and the Dex
//! - [`services`] - NodeService, reindexing, move/remove and locking
//! - [`utils`] - Markdown content analysis and hashing

pub mod db;
pub mod index;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use index::{Dex, TagExpr};
pub use models::*;
pub use services::{DexError, NodeService, ReindexMode, ReindexReport};
