//! Property-based tests for the index builders
//!
//! Invariants that should hold for ANY sequence of adds and removes:
//! - tag members, link targets and backlink sources stay ascending and unique
//! - the changelog stays ordered newest first
//! - removed nodes are absent from every builder
//! - serializing, parsing and serializing again is byte-identical

use chrono::{TimeZone, Utc};
use nodedex_core::index::{
    BacklinksIndex, ChangesIndex, Dex, IndexBuilder, LinksIndex, TagsIndex,
};
use nodedex_core::models::{IndexConfig, Node, NodeIdentifier, NodeMeta, NodeStats};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::sample::subsequence;

const TAGS: [&str; 4] = ["alpha", "beta", "gamma", "delta"];
const MAX_ID: u64 = 12;

#[derive(Debug, Clone)]
enum Op {
    Add(Node),
    Remove(NodeIdentifier),
}

// ============================================================================
// Strategies
// ============================================================================

fn arb_node() -> impl Strategy<Value = Node> {
    (
        1..=MAX_ID,
        subsequence(TAGS.to_vec(), 0..=TAGS.len()),
        vec(1..=MAX_ID, 0..4),
        1u32..=28,
        0u32..24,
    )
        .prop_map(|(id, tags, links, day, hour)| {
            let id = NodeIdentifier::new(id);
            let meta = NodeMeta {
                title: format!("Node {}", id),
                tags: tags.into_iter().map(String::from).collect(),
                links: links.into_iter().map(NodeIdentifier::new).collect(),
                ..Default::default()
            };
            let stats = NodeStats {
                updated: Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).single(),
                ..Default::default()
            };
            Node::new(id, "", meta, stats)
        })
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => arb_node().prop_map(Op::Add),
        1 => (1..=MAX_ID).prop_map(|id| Op::Remove(NodeIdentifier::new(id))),
    ]
}

fn is_ascending<'a>(ids: impl Iterator<Item = &'a NodeIdentifier>) -> bool {
    let ids: Vec<_> = ids.collect();
    ids.windows(2).all(|w| w[0] < w[1])
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_dex_invariants_hold_after_every_step(ops in vec(arb_op(), 0..150)) {
        let mut dex = Dex::new();
        dex.register_custom_indexes(&[IndexConfig::new("picked", "alpha || (beta && !gamma)")])
            .unwrap();

        for op in &ops {
            match op {
                Op::Add(node) => {
                    dex.add(node);
                    prop_assert!(dex.contains(&node.id));
                }
                Op::Remove(id) => {
                    dex.remove(id);
                    prop_assert!(!dex.contains(id));
                    prop_assert!(dex.tags().tags_of(id).is_empty());
                    prop_assert!(dex.links().targets(id).is_none());
                    prop_assert!(dex.backlinks().sources(id).is_none());
                    prop_assert!(dex.changes().entries().iter().all(|e| &e.id != id));
                    prop_assert!(!dex.custom("picked").unwrap().contains(id));
                }
            }

            for tag in TAGS {
                prop_assert!(is_ascending(dex.tags().members(tag).iter()));
            }
            for source in dex.links().sources() {
                prop_assert!(is_ascending(dex.links().targets(source).unwrap().iter()));
                if let Some(sources) = dex.backlinks().sources(source) {
                    prop_assert!(is_ascending(sources.iter()));
                }
            }

            let changes = dex.changes().entries();
            prop_assert!(changes.windows(2).all(|w| w[0].updated >= w[1].updated));
        }
    }

    #[test]
    fn prop_serialization_round_trips(ops in vec(arb_op(), 0..150)) {
        let mut tags = TagsIndex::new();
        let mut links = LinksIndex::new();
        let mut backlinks = BacklinksIndex::new();
        let mut changes = ChangesIndex::new();

        for op in &ops {
            match op {
                Op::Add(node) => {
                    tags.add(node);
                    links.add(node);
                    backlinks.add(node);
                    changes.add(node);
                }
                Op::Remove(id) => {
                    tags.remove(id);
                    links.remove(id);
                    backlinks.remove(id);
                    changes.remove(id);
                }
            }
        }

        let data = tags.data();
        prop_assert_eq!(TagsIndex::parse(&data).data(), data);
        let data = links.data();
        prop_assert_eq!(LinksIndex::parse(&data).data(), data);
        let data = backlinks.data();
        prop_assert_eq!(BacklinksIndex::parse(&data).data(), data);
        let data = changes.data();
        prop_assert_eq!(ChangesIndex::parse(&data).data(), data);
    }
}
