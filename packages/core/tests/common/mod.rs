//! Shared helpers for NodeDex integration tests

#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Utc};
use nodedex_core::db::{MemoryRepository, Repository};
use nodedex_core::models::time::MockTimeProvider;
use nodedex_core::{NodeIdentifier, NodeService};
use std::sync::Arc;

/// Install a test log writer once per test binary (`RUST_LOG` controls verbosity)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn start_time() -> DateTime<Utc> {
    "2025-03-01T12:00:00Z".parse().expect("valid timestamp")
}

pub fn id(n: u64) -> NodeIdentifier {
    NodeIdentifier::new(n)
}

/// Test helper: service over a fresh in-memory repository with a pinned clock
pub async fn create_test_env() -> Result<(Arc<MemoryRepository>, Arc<MockTimeProvider>, NodeService)> {
    init_tracing();
    let repo = Arc::new(MemoryRepository::new());
    let clock = Arc::new(MockTimeProvider::with_time(start_time()));
    let service = NodeService::new(repo.clone()).await?.with_clock(clock.clone());
    Ok((repo, clock, service))
}

/// Store raw content without meta or stats, as an external editor would
pub async fn seed(repo: &MemoryRepository, nodes: &[(u64, &str)]) -> Result<()> {
    for (n, content) in nodes {
        repo.write_content(&id(*n), content).await?;
    }
    Ok(())
}
