//! Index Layer
//!
//! Derived, serializable views over a repository's node set:
//!
//! - `dex/nodes.tsv` - every node with title and update time ([`NodesIndex`])
//! - `dex/tags` - tag to member nodes ([`TagsIndex`])
//! - `dex/links` / `dex/backlinks` - link adjacency ([`LinksIndex`], [`BacklinksIndex`])
//! - `dex/changes.md` - recency changelog ([`ChangesIndex`])
//! - `dex/<name>.md` - config-declared tag queries ([`TagFilteredIndex`])
//!
//! All of them implement [`IndexBuilder`] and are driven together through the
//! [`Dex`]. Parsing a stored artifact is lenient: malformed lines are skipped
//! and a missing artifact yields an empty builder.

mod builder;
mod changes;
mod dex;
mod entry;
mod filtered;
mod links;
mod nodes;
mod tag_expr;
mod tags;

pub use builder::IndexBuilder;
pub use changes::ChangesIndex;
pub use dex::{
    custom_index_name, is_reserved_index_name, Dex, BACKLINKS_INDEX, CHANGES_INDEX, LINKS_INDEX,
    NODES_INDEX, RESERVED_INDEX_NAMES, TAGS_INDEX,
};
pub use entry::{format_timestamp, parse_timestamp, EntryList, NodeIndexEntry, ZERO_TIMESTAMP};
pub use filtered::TagFilteredIndex;
pub use links::{BacklinksIndex, LinksIndex};
pub use nodes::NodesIndex;
pub use tag_expr::{TagExpr, TagExprError};
pub use tags::TagsIndex;
