//! Data Models
//!
//! This module contains the data structures shared by every layer:
//!
//! - [`NodeIdentifier`] - node addressing and ordering
//! - [`Node`], [`NodeMeta`], [`NodeStats`] - a node and its derived records
//! - [`RepoConfig`] - the whole-repository configuration record
//! - [`time`] - clock abstraction

mod config;
mod node;
mod node_id;
pub mod time;

pub use config::{IndexConfig, LockSettings, RepoConfig};
pub use node::{Node, NodeMeta, NodeStats, ValidationError};
pub use node_id::NodeIdentifier;
