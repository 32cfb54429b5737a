//! Filesystem repository
//!
//! Layout under the repository root:
//!
//! ```text
//! <root>/config.json
//! <root>/dex/...            index artifacts (dex/tags, dex/changes.md, ...)
//! <root>/<id>/content.md
//! <root>/<id>/meta.json
//! <root>/<id>/stats.json
//! <root>/.locks/<id>.lock   present while a writer holds the node
//! ```
//!
//! Locks are best-effort: a lock file is created with `create_new`, so two
//! cooperating processes exclude each other per node. A holder that panics or
//! is cancelled removes its file on unwind, but a crashed process leaves a
//! stale file behind that has to be removed by hand.

use crate::db::{Repository, StoreError, StoreResult};
use crate::models::{NodeIdentifier, NodeMeta, NodeStats, RepoConfig};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const CONTENT_FILE: &str = "content.md";
const META_FILE: &str = "meta.json";
const STATS_FILE: &str = "stats.json";
const LOCK_DIR: &str = ".locks";
const CONFIG_FILE: &str = "config.json";
const INDEX_DIR: &str = "dex";

/// Repository stored as one directory per node
#[derive(Debug, Clone)]
pub struct FsRepository {
    root: PathBuf,
    key: String,
}

impl FsRepository {
    /// Open (creating if needed) a repository rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(&root, e))?;
        let key = format!("fs:{}", root.display());
        Ok(Self { root, key })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn node_dir(&self, id: &NodeIdentifier) -> PathBuf {
        self.root.join(id.path())
    }

    fn node_file(&self, id: &NodeIdentifier, file: &str) -> PathBuf {
        self.node_dir(id).join(file)
    }

    fn lock_path(&self, id: &NodeIdentifier) -> PathBuf {
        self.root.join(LOCK_DIR).join(format!("{}.lock", id.path()))
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    async fn require_node(&self, id: &NodeIdentifier) -> StoreResult<()> {
        if self.has_node(id).await? {
            Ok(())
        } else {
            Err(StoreError::not_found("node", id.path()))
        }
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        path: &Path,
        kind: &'static str,
        key: &str,
    ) -> StoreResult<T> {
        let bytes = read_file(path, kind, key).await?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::serialization(key, e))
    }

    async fn write_json<T: Serialize>(&self, path: &Path, key: &str, value: &T) -> StoreResult<()> {
        let bytes =
            serde_json::to_vec_pretty(value).map_err(|e| StoreError::serialization(key, e))?;
        write_file(path, &bytes).await
    }
}

async fn read_file(path: &Path, kind: &'static str, key: &str) -> StoreResult<Vec<u8>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::not_found(kind, key)),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Write via a temp file and rename so readers never see a torn file
async fn write_file(path: &Path, data: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }
    let temp = path.with_extension("tmp");
    fs::write(&temp, data)
        .await
        .map_err(|e| StoreError::io(&temp, e))?;
    fs::rename(&temp, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

#[async_trait]
impl Repository for FsRepository {
    fn key(&self) -> &str {
        &self.key
    }

    async fn read_content(&self, id: &NodeIdentifier) -> StoreResult<String> {
        let bytes = read_file(&self.node_file(id, CONTENT_FILE), "node", &id.path()).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn write_content(&self, id: &NodeIdentifier, content: &str) -> StoreResult<()> {
        write_file(&self.node_file(id, CONTENT_FILE), content.as_bytes()).await
    }

    async fn read_meta(&self, id: &NodeIdentifier) -> StoreResult<NodeMeta> {
        self.read_json(&self.node_file(id, META_FILE), "meta", &id.path())
            .await
    }

    async fn write_meta(&self, id: &NodeIdentifier, meta: &NodeMeta) -> StoreResult<()> {
        self.require_node(id).await?;
        self.write_json(&self.node_file(id, META_FILE), &id.path(), meta)
            .await
    }

    async fn read_stats(&self, id: &NodeIdentifier) -> StoreResult<NodeStats> {
        self.read_json(&self.node_file(id, STATS_FILE), "stats", &id.path())
            .await
    }

    async fn write_stats(&self, id: &NodeIdentifier, stats: &NodeStats) -> StoreResult<()> {
        self.require_node(id).await?;
        self.write_json(&self.node_file(id, STATS_FILE), &id.path(), stats)
            .await
    }

    async fn has_node(&self, id: &NodeIdentifier) -> StoreResult<bool> {
        let path = self.node_file(id, CONTENT_FILE);
        fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }

    async fn list_nodes(&self) -> StoreResult<Vec<NodeIdentifier>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| StoreError::io(&self.root, e))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.root, e))?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Ok(id) = name.parse::<NodeIdentifier>() else {
                continue;
            };
            if self.has_node(&id).await? {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn next(&self) -> StoreResult<NodeIdentifier> {
        let highest = self
            .list_nodes()
            .await?
            .iter()
            .map(|id| id.id)
            .max()
            .unwrap_or(0);

        // Reserve by creating the directory; a concurrent allocator that
        // got there first makes us move on to the following id.
        let mut candidate = highest + 1;
        loop {
            let id = NodeIdentifier::new(candidate);
            let dir = self.node_dir(&id);
            match fs::create_dir(&dir).await {
                Ok(()) => return Ok(id),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => candidate += 1,
                Err(e) => return Err(StoreError::io(&dir, e)),
            }
        }
    }

    async fn move_node(&self, src: &NodeIdentifier, dst: &NodeIdentifier) -> StoreResult<()> {
        self.require_node(src).await?;
        if self.has_node(dst).await? {
            return Err(StoreError::already_exists(dst.path()));
        }
        let to = self.node_dir(dst);
        // An empty directory may be left from an allocation that never got content
        if fs::try_exists(&to).await.unwrap_or(false) {
            fs::remove_dir(&to)
                .await
                .map_err(|_| StoreError::already_exists(dst.path()))?;
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        let from = self.node_dir(src);
        fs::rename(&from, &to)
            .await
            .map_err(|e| StoreError::io(&from, e))
    }

    async fn delete_node(&self, id: &NodeIdentifier) -> StoreResult<()> {
        self.require_node(id).await?;
        let dir = self.node_dir(id);
        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))
    }

    async fn get_index(&self, name: &str) -> StoreResult<Vec<u8>> {
        read_file(&self.index_path(name), "index", name).await
    }

    async fn write_index(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        write_file(&self.index_path(name), data).await
    }

    async fn list_indexes(&self) -> StoreResult<Vec<String>> {
        let dir = self.root.join(INDEX_DIR);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&dir, e))?
        {
            if let Some(name) = entry.file_name().to_str() {
                names.push(format!("{}/{}", INDEX_DIR, name));
            }
        }
        names.sort();
        Ok(names)
    }

    async fn clear_indexes(&self) -> StoreResult<()> {
        let dir = self.root.join(INDEX_DIR);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&dir, e)),
        }
    }

    async fn read_config(&self) -> StoreResult<RepoConfig> {
        self.read_json(&self.root.join(CONFIG_FILE), "config", CONFIG_FILE)
            .await
    }

    async fn write_config(&self, config: &RepoConfig) -> StoreResult<()> {
        self.write_json(&self.root.join(CONFIG_FILE), CONFIG_FILE, config)
            .await
    }

    async fn try_lock_node(&self, id: &NodeIdentifier) -> StoreResult<bool> {
        let path = self.lock_path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    async fn unlock_node(&self, id: &NodeIdentifier) -> StoreResult<()> {
        let path = self.lock_path(id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn release_abandoned_lock(&self, id: &NodeIdentifier) {
        let path = self.lock_path(id);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove lock file {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_repo() -> (FsRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let repo = FsRepository::open(temp_dir.path().join("repo")).await.unwrap();
        (repo, temp_dir)
    }

    #[tokio::test]
    async fn test_node_records_round_trip() {
        let (repo, _temp) = open_repo().await;
        let id = NodeIdentifier::new(3);

        repo.write_content(&id, "# Three").await.unwrap();
        let meta = NodeMeta {
            title: "Three".to_string(),
            ..Default::default()
        };
        repo.write_meta(&id, &meta).await.unwrap();

        assert_eq!(repo.read_content(&id).await.unwrap(), "# Three");
        assert_eq!(repo.read_meta(&id).await.unwrap(), meta);
        assert!(repo.read_stats(&id).await.unwrap_err().is_not_found());
        assert_eq!(repo.list_nodes().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_next_skips_allocated_directories() {
        let (repo, _temp) = open_repo().await;
        repo.write_content(&NodeIdentifier::new(1), "one").await.unwrap();

        let first = repo.next().await.unwrap();
        let second = repo.next().await.unwrap();
        assert_eq!(first, NodeIdentifier::new(2));
        assert_eq!(second, NodeIdentifier::new(3));
        // Allocated but empty directories are not nodes yet
        assert_eq!(repo.list_nodes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_move_and_delete() {
        let (repo, _temp) = open_repo().await;
        let (a, b, c) = (NodeIdentifier::new(1), NodeIdentifier::new(2), NodeIdentifier::new(3));
        repo.write_content(&a, "a").await.unwrap();
        repo.write_content(&b, "b").await.unwrap();

        assert!(matches!(
            repo.move_node(&a, &b).await.unwrap_err(),
            StoreError::AlreadyExists { .. }
        ));
        repo.move_node(&a, &c).await.unwrap();
        assert_eq!(repo.read_content(&c).await.unwrap(), "a");

        repo.delete_node(&c).await.unwrap();
        assert!(!repo.has_node(&c).await.unwrap());
        assert!(repo.delete_node(&c).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_indexes_and_config() {
        let (repo, _temp) = open_repo().await;
        assert!(repo.get_index("dex/tags").await.unwrap_err().is_not_found());
        assert!(repo.read_config().await.unwrap_err().is_not_found());

        repo.write_index("dex/tags", b"a 1\n").await.unwrap();
        repo.write_index("dex/links", b"1\t\n").await.unwrap();
        assert_eq!(repo.get_index("dex/tags").await.unwrap(), b"a 1\n");
        assert_eq!(
            repo.list_indexes().await.unwrap(),
            vec!["dex/links".to_string(), "dex/tags".to_string()]
        );

        repo.clear_indexes().await.unwrap();
        assert!(repo.list_indexes().await.unwrap().is_empty());

        let config = RepoConfig::default();
        repo.write_config(&config).await.unwrap();
        assert_eq!(repo.read_config().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_lock_file_excludes_second_holder() {
        let (repo, _temp) = open_repo().await;
        let id = NodeIdentifier::new(1);

        assert!(repo.try_lock_node(&id).await.unwrap());
        assert!(!repo.try_lock_node(&id).await.unwrap());
        repo.unlock_node(&id).await.unwrap();
        assert!(repo.try_lock_node(&id).await.unwrap());
        repo.unlock_node(&id).await.unwrap();
        repo.unlock_node(&id).await.unwrap();

        assert!(repo.try_lock_node(&id).await.unwrap());
        repo.release_abandoned_lock(&id);
        assert!(!repo.lock_path(&id).exists());
        repo.release_abandoned_lock(&id);
    }
}
