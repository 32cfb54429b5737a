//! Integration tests for NodeService over the filesystem backend
//!
//! Tests cover:
//! - On-disk index artifacts in their exact text form
//! - Reloading the Dex from disk in a fresh service
//! - Lock files blocking writers from another handle

mod common;

use anyhow::Result;
use common::{id, init_tracing, start_time};
use nodedex_core::db::{FsRepository, Repository};
use nodedex_core::models::time::MockTimeProvider;
use nodedex_core::models::LockSettings;
use nodedex_core::{DexError, NodeService, ReindexMode};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Test helper: Create a service over a repository in a temp directory
async fn create_fs_env() -> Result<(Arc<FsRepository>, NodeService, TempDir)> {
    init_tracing();
    let temp_dir = TempDir::new()?;
    let repo = Arc::new(FsRepository::open(temp_dir.path().join("kb")).await?);
    let clock = Arc::new(MockTimeProvider::with_time(start_time()));
    let service = NodeService::new(repo.clone()).await?.with_clock(clock);
    Ok((repo, service, temp_dir))
}

#[tokio::test]
async fn test_artifacts_written_to_disk() -> Result<()> {
    let (repo, service, _temp_dir) = create_fs_env().await?;
    service
        .create("---\ntags: [rust, notes]\n---\n# Ownership\n")
        .await?;
    service.create("# Borrowing\n\nSee [ownership](../1).\n").await?;

    let root = repo.root().to_path_buf();
    assert_eq!(
        std::fs::read_to_string(root.join("dex/nodes.tsv"))?,
        "1\t2025-03-01 12:00:00Z\tOwnership\n2\t2025-03-01 12:00:00Z\tBorrowing\n"
    );
    assert_eq!(
        std::fs::read_to_string(root.join("dex/tags"))?,
        "notes 1\nrust 1\n"
    );
    assert_eq!(std::fs::read_to_string(root.join("dex/links"))?, "1\t\n2\t1\n");
    assert_eq!(
        std::fs::read_to_string(root.join("dex/backlinks"))?,
        "1\t2\n2\t\n"
    );
    assert_eq!(
        std::fs::read_to_string(root.join("dex/changes.md"))?,
        "* 2025-03-01 12:00:00Z [Ownership](../1)\n* 2025-03-01 12:00:00Z [Borrowing](../2)\n"
    );
    assert!(!root.join(".locks/1.lock").exists());
    Ok(())
}

#[tokio::test]
async fn test_fresh_service_loads_dex_from_disk() -> Result<()> {
    let (repo, service, _temp_dir) = create_fs_env().await?;
    service.create("# One\n").await?;
    service.create("# Two\n\n[one](../1)\n").await?;
    service.reindex(ReindexMode::Incremental).await?;

    let reopened = Arc::new(FsRepository::open(repo.root()).await?);
    let fresh = NodeService::new(reopened).await?;
    let dex = fresh.dex().await?;

    assert!(dex.contains(&id(1)));
    assert!(dex.contains(&id(2)));
    assert_eq!(dex.nodes().next_id(), 3);
    assert!(dex.backlinks().sources(&id(1)).unwrap().contains(&id(2)));
    assert_eq!(fresh.config().await?.indexed_at, Some(start_time()));
    Ok(())
}

#[tokio::test]
async fn test_lock_file_blocks_other_writer() -> Result<()> {
    let (repo, service, _temp_dir) = create_fs_env().await?;
    let node = service.create("# Shared\n").await?;

    let other = FsRepository::open(repo.root()).await?;
    assert!(other.try_lock_node(&node.id).await?);

    let impatient = service.with_lock_settings(LockSettings::new(
        Duration::from_millis(30),
        Duration::from_millis(5),
    ));
    let err = impatient.update(&node.id, "# Changed\n").await.unwrap_err();
    assert!(matches!(err, DexError::LockTimeout { .. }));
    assert_eq!(repo.read_content(&node.id).await?, "# Shared\n");

    other.unlock_node(&node.id).await?;
    let updated = impatient.update(&node.id, "# Changed\n").await?;
    assert_eq!(updated.meta.title, "Changed");
    Ok(())
}
