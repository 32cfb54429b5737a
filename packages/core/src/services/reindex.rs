//! Reindexing
//!
//! A reindex pass walks every node of the repository and decides, per node,
//! whether its meta and stats must be recomputed from content:
//!
//! - **metaMissing / statsMissing**: the record is absent from the repository
//! - **contentChanged**: content hash differs from the hash in stats
//! - **stale**: stats carry no `updated`, the repository has no watermark, or
//!   `updated` is later than the watermark
//! - **incomplete**: stats lack a hash, `created` or `updated`
//!
//! A node is refreshed when a rebuild was requested, when a record is
//! missing, or (incremental mode only) when it changed, is stale or is
//! incomplete. Refreshed records are written inside the node's lock. The node
//! is fed to the Dex when it was refreshed, was unknown to the Dex, is stale,
//! or custom indexes are registered (those have no stored form to load, so
//! every node has to pass through them once per process).
//!
//! One node failing never stops the pass. After the pass the Dex is written
//! and the watermark advanced even if some nodes failed; the failures are then
//! reported together as [`DexError::Aggregate`].

use crate::db::optional;
use crate::index::Dex;
use crate::models::{Node, NodeIdentifier};
use crate::services::{DexError, NodeErrors, NodeService};
use crate::utils::content_hash;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// How aggressively a reindex pass refreshes node records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReindexMode {
    /// Refresh only nodes whose meta or stats record is missing
    MissingOnly,

    /// Also refresh nodes that changed or were updated since the watermark
    #[default]
    Incremental,

    /// Drop every index artifact and refresh every node
    Rebuild,
}

/// Outcome of a successful reindex pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexReport {
    pub mode: String,
    pub scanned: usize,
    pub refreshed: usize,
    pub persisted: usize,
    pub dex_updated: usize,
    pub removed: usize,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
struct NodeOutcome {
    refreshed: bool,
    persisted: bool,
    dex_updated: bool,
}

impl NodeService {
    /// Bring node records, the Dex and the watermark up to date
    pub async fn reindex(&self, mode: ReindexMode) -> Result<ReindexReport, DexError> {
        let mut cache = self.dex.lock().await;
        let dex = self.cached_dex(&mut cache).await?;

        let mut config = self.config().await?;
        let watermark = config.indexed_at;
        let ids = self.repo.list_nodes().await?;

        let mut report = ReindexReport {
            mode: format!("{:?}", mode),
            scanned: 0,
            refreshed: 0,
            persisted: 0,
            dex_updated: 0,
            removed: 0,
            indexed_at: self.clock.now(),
        };

        if mode == ReindexMode::Rebuild {
            dex.clear();
            self.repo.clear_indexes().await?;
        } else {
            report.removed = prune_missing(dex, &ids);
        }

        let mut errors = NodeErrors::new();
        for id in &ids {
            report.scanned += 1;
            match self.reindex_node(dex, id, mode, watermark).await {
                Ok(outcome) => {
                    report.refreshed += usize::from(outcome.refreshed);
                    report.persisted += usize::from(outcome.persisted);
                    report.dex_updated += usize::from(outcome.dex_updated);
                }
                Err(err) => {
                    warn!("Failed to reindex node {}: {}", id, err);
                    errors.push(id.path(), err);
                }
            }
        }

        dex.write(self.repo.as_ref()).await?;

        let now = self.clock.now();
        config.indexed_at = Some(now);
        self.repo.write_config(&config).await?;
        report.indexed_at = now;

        info!(
            "Reindex ({}) scanned {} nodes: {} refreshed, {} persisted, {} dex updates, {} removed, {} failed",
            report.mode,
            report.scanned,
            report.refreshed,
            report.persisted,
            report.dex_updated,
            report.removed,
            errors.len()
        );
        errors.into_result(report)
    }

    async fn reindex_node(
        &self,
        dex: &mut Dex,
        id: &NodeIdentifier,
        mode: ReindexMode,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<NodeOutcome, DexError> {
        let content = self.repo.read_content(id).await?;
        let meta = optional(self.repo.read_meta(id).await)?;
        let stats = optional(self.repo.read_stats(id).await)?;

        let meta_missing = meta.is_none();
        let stats_missing = stats.is_none();
        let content_changed = stats
            .as_ref()
            .map_or(true, |stats| stats.hash != content_hash(&content));
        let stale = match (stats.as_ref().and_then(|stats| stats.updated), watermark) {
            (Some(updated), Some(watermark)) => updated > watermark,
            _ => true,
        };
        let incomplete = stats.as_ref().map_or(true, |stats| !stats.is_complete());

        let needs_refresh = mode == ReindexMode::Rebuild
            || meta_missing
            || stats_missing
            || (mode == ReindexMode::Incremental && (content_changed || stale || incomplete));

        let node = match (needs_refresh, meta, stats) {
            (false, Some(meta), Some(stats)) => Node::new(id.clone(), content, meta, stats),
            (_, _, stats) => self.analyze(id, content, stats.as_ref()),
        };

        let mut outcome = NodeOutcome {
            refreshed: needs_refresh,
            ..Default::default()
        };
        if needs_refresh {
            self.persist(&node).await?;
            outcome.persisted = true;
        }

        if outcome.persisted || !dex.contains(id) || stale || dex.has_custom_indexes() {
            dex.add(&node);
            outcome.dex_updated = true;
        }

        debug!(
            "Reindexed {}: meta_missing={} stats_missing={} changed={} stale={} incomplete={} refreshed={}",
            id, meta_missing, stats_missing, content_changed, stale, incomplete, needs_refresh
        );
        Ok(outcome)
    }
}

/// Remove Dex entries for nodes the repository no longer lists
fn prune_missing(dex: &mut Dex, ids: &[NodeIdentifier]) -> usize {
    let listed: BTreeSet<&NodeIdentifier> = ids.iter().collect();
    let known: BTreeSet<NodeIdentifier> = dex
        .nodes()
        .entries()
        .iter()
        .map(|entry| entry.id.clone())
        .chain(dex.changes().entries().iter().map(|entry| entry.id.clone()))
        .chain(dex.links().sources().cloned())
        .collect();

    let mut removed = 0;
    for id in known.iter().filter(|id| !listed.contains(id)) {
        debug!("Removing vanished node {} from dex", id);
        dex.remove(id);
        removed += 1;
    }
    removed
}
