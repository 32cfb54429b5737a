//! Utility functions for NodeDex Core
//!
//! Content analysis shared by the services layer.

mod markdown;

pub use markdown::{content_hash, ContentAnalyzer, MarkdownAnalyzer};
