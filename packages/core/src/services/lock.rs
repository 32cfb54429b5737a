//! Per-node exclusive sections.
//!
//! Any operation writing a node's content, meta or stats runs inside
//! [`with_node_lock`]. Acquisition polls the repository's non-blocking
//! [`try_lock_node`](crate::db::Repository::try_lock_node) every
//! `retry_interval` until it succeeds or `timeout` elapses. The section is
//! released whether the operation succeeds, fails, panics or is dropped
//! mid-flight.
//!
//! Locks are reentrant per task: the set of held `(repository, node)` pairs
//! travels with the running future, and a nested call for a pair already held
//! runs inline instead of waiting on itself.

use crate::db::Repository;
use crate::models::{LockSettings, NodeIdentifier};
use crate::services::DexError;
use std::collections::HashSet;
use std::future::Future;
use tokio::time::Instant;
use tracing::{debug, warn};

tokio::task_local! {
    static HELD_NODE_LOCKS: HashSet<String>;
}

fn lock_key(repo: &dyn Repository, id: &NodeIdentifier) -> String {
    format!("{}#{}", repo.key(), id)
}

/// True when the current task already holds the section for `id`
pub fn holds_node_lock(repo: &dyn Repository, id: &NodeIdentifier) -> bool {
    let key = lock_key(repo, id);
    HELD_NODE_LOCKS
        .try_with(|held| held.contains(&key))
        .unwrap_or(false)
}

/// Run `op` inside the exclusive section of node `id`
///
/// Fails with [`DexError::LockTimeout`] if the section stays taken past
/// `settings.timeout()`. Nested calls for the same node from within `op` do
/// not block.
pub async fn with_node_lock<T, F, Fut>(
    repo: &dyn Repository,
    settings: &LockSettings,
    id: &NodeIdentifier,
    op: F,
) -> Result<T, DexError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, DexError>>,
{
    if holds_node_lock(repo, id) {
        return op().await;
    }

    acquire(repo, settings, id).await?;
    let mut guard = AbandonGuard {
        repo,
        id,
        armed: true,
    };

    let mut held = HELD_NODE_LOCKS
        .try_with(|held| held.clone())
        .unwrap_or_default();
    held.insert(lock_key(repo, id));
    let result = HELD_NODE_LOCKS.scope(held, op()).await;

    let unlocked = repo.unlock_node(id).await;
    guard.armed = false;
    match unlocked {
        Ok(()) => result,
        Err(err) if result.is_ok() => Err(err.into()),
        Err(err) => {
            warn!("Failed to release lock on node {}: {}", id, err);
            result
        }
    }
}

/// Releases the section if the holding future unwinds or is dropped
struct AbandonGuard<'a> {
    repo: &'a dyn Repository,
    id: &'a NodeIdentifier,
    armed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Releasing abandoned lock on node {}", self.id);
            self.repo.release_abandoned_lock(self.id);
        }
    }
}

async fn acquire(
    repo: &dyn Repository,
    settings: &LockSettings,
    id: &NodeIdentifier,
) -> Result<(), DexError> {
    let started = Instant::now();
    let timeout = settings.timeout();
    let mut attempts = 0u32;

    loop {
        if repo.try_lock_node(id).await? {
            if attempts > 0 {
                debug!("Acquired lock on node {} after {} retries", id, attempts);
            }
            return Ok(());
        }

        let waited = started.elapsed();
        if waited >= timeout {
            warn!("Gave up waiting for lock on node {} after {:?}", id, waited);
            return Err(DexError::lock_timeout(id.path(), waited.as_millis() as u64));
        }

        attempts += 1;
        let pause = settings.retry_interval().min(timeout - waited);
        tokio::time::sleep(pause).await;
    }
}
