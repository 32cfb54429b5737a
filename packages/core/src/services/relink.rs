//! Moving and removing nodes
//!
//! Both operations rewrite the canonical relative link token `../<id>` in the
//! content of every other node: a move points links at the new id, a removal
//! points them at the zero node so nothing is left dangling. A token only
//! matches when followed by whitespace, one of `)]}>.,;:!?'"#`, or the end of
//! the content, so `../52` is untouched when node `5` moves.
//!
//! Rewrite failures are collected per node; already rewritten nodes are not
//! rolled back and the scan always completes.

use crate::index::Dex;
use crate::models::{Node, NodeIdentifier};
use crate::services::{with_node_lock, DexError, NodeErrors, NodeService};
use tracing::{debug, info, warn};

const LINK_PREFIX: &str = "../";

fn is_link_boundary(next: Option<char>) -> bool {
    match next {
        None => true,
        Some(c) => c.is_whitespace() || ")]}>.,;:!?'\"#".contains(c),
    }
}

/// Rewrite every `../<from>` link token in `content` to `../<to>`
///
/// Returns `None` when nothing matched.
pub fn rewrite_links(content: &str, from: &NodeIdentifier, to: &NodeIdentifier) -> Option<String> {
    let token = format!("{}{}", LINK_PREFIX, from);
    let replacement = format!("{}{}", LINK_PREFIX, to);

    let mut rewritten = String::with_capacity(content.len());
    let mut last = 0;
    for (start, _) in content.match_indices(&token) {
        let end = start + token.len();
        if !is_link_boundary(content[end..].chars().next()) {
            continue;
        }
        rewritten.push_str(&content[last..start]);
        rewritten.push_str(&replacement);
        last = end;
    }

    if last == 0 {
        return None;
    }
    rewritten.push_str(&content[last..]);
    Some(rewritten)
}

fn ensure_movable(id: &NodeIdentifier) -> Result<(), DexError> {
    if id.is_zero() {
        return Err(DexError::invalid("the zero node cannot be moved or removed"));
    }
    if !id.is_local() {
        return Err(DexError::invalid(format!("{} belongs to another repository", id)));
    }
    Ok(())
}

impl NodeService {
    /// Relocate `src` to `dst` and repoint every link to it
    ///
    /// Fails with `Invalid` for the zero node, foreign ids or `src == dst`,
    /// `NotFound` when `src` is absent and `DestinationExists` when `dst` is
    /// taken. Rewrite failures in other nodes come back as `Aggregate` after
    /// the move itself has completed.
    pub async fn move_node(&self, src: &NodeIdentifier, dst: &NodeIdentifier) -> Result<Node, DexError> {
        ensure_movable(src)?;
        ensure_movable(dst)?;
        if src == dst {
            return Err(DexError::invalid(format!("cannot move {} onto itself", src)));
        }

        let mut cache = self.dex.lock().await;
        let dex = self.cached_dex(&mut cache).await?;

        if !self.repo.has_node(src).await? {
            return Err(DexError::not_found(src.path()));
        }
        if self.repo.has_node(dst).await? {
            return Err(DexError::destination_exists(dst.path()));
        }

        let repo = self.repo.as_ref();
        with_node_lock(repo, &self.lock_settings, src, || async {
            with_node_lock(repo, &self.lock_settings, dst, || async {
                repo.move_node(src, dst).await?;
                Ok(())
            })
            .await
        })
        .await?;
        dex.remove(src);

        let mut errors = self.rewrite_references(dex, src, dst).await?;
        let moved = match self.refresh_locked(dst).await {
            Ok(node) => {
                dex.add(&node);
                Some(node)
            }
            Err(err) => {
                errors.push(dst.path(), err);
                None
            }
        };
        dex.write(repo).await?;

        info!("Moved node {} to {}", src, dst);
        match moved {
            Some(node) => errors.into_result(node),
            None => Err(DexError::Aggregate(errors)),
        }
    }

    /// Delete a node and repoint every link to it at the zero node
    pub async fn remove(&self, id: &NodeIdentifier) -> Result<(), DexError> {
        ensure_movable(id)?;

        let mut cache = self.dex.lock().await;
        let dex = self.cached_dex(&mut cache).await?;

        let repo = self.repo.as_ref();
        with_node_lock(repo, &self.lock_settings, id, || async {
            repo.delete_node(id).await?;
            Ok(())
        })
        .await?;
        dex.remove(id);

        let errors = self
            .rewrite_references(dex, id, &NodeIdentifier::zero())
            .await?;
        dex.write(repo).await?;

        info!("Removed node {}", id);
        errors.into_result(())
    }

    /// Rewrite links from `from` to `to` in every node, feeding rewritten nodes to the Dex
    async fn rewrite_references(
        &self,
        dex: &mut Dex,
        from: &NodeIdentifier,
        to: &NodeIdentifier,
    ) -> Result<NodeErrors, DexError> {
        let mut errors = NodeErrors::new();
        let mut rewritten = 0usize;

        for id in self.repo.list_nodes().await? {
            match self.rewrite_node(&id, from, to).await {
                Ok(Some(node)) => {
                    dex.add(&node);
                    rewritten += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("Failed to rewrite links in node {}: {}", id, err);
                    errors.push(id.path(), err);
                }
            }
        }

        debug!("Rewrote links {} -> {} in {} nodes", from, to, rewritten);
        Ok(errors)
    }

    async fn rewrite_node(
        &self,
        id: &NodeIdentifier,
        from: &NodeIdentifier,
        to: &NodeIdentifier,
    ) -> Result<Option<Node>, DexError> {
        with_node_lock(self.repo.as_ref(), &self.lock_settings, id, || async {
            let content = self.repo.read_content(id).await?;
            let Some(updated) = rewrite_links(&content, from, to) else {
                return Ok(None);
            };
            self.repo.write_content(id, &updated).await?;
            self.refresh(id).await.map(Some)
        })
        .await
    }

    async fn refresh_locked(&self, id: &NodeIdentifier) -> Result<Node, DexError> {
        with_node_lock(self.repo.as_ref(), &self.lock_settings, id, || self.refresh(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> NodeIdentifier {
        NodeIdentifier::new(n)
    }

    #[test]
    fn test_rewrite_respects_boundaries() {
        assert_eq!(
            rewrite_links("see ../5 and ../52", &id(5), &id(9)).as_deref(),
            Some("see ../9 and ../52")
        );
        assert_eq!(
            rewrite_links("[a](../5) [b](../5#top) ../5.", &id(5), &id(9)).as_deref(),
            Some("[a](../9) [b](../9#top) ../9.")
        );
        assert_eq!(rewrite_links("../52 ../5x ../50", &id(5), &id(9)), None);
        assert_eq!(rewrite_links("no links", &id(5), &id(9)), None);
    }

    #[test]
    fn test_rewrite_handles_all_delimiters() {
        for delimiter in [")", "]", "}", ">", ".", ",", ";", ":", "!", "?", "'", "\"", "#", "\n", "\t"] {
            let content = format!("x ../7{}", delimiter);
            assert_eq!(
                rewrite_links(&content, &id(7), &id(0)),
                Some(format!("x ../0{}", delimiter))
            );
        }
    }

    #[test]
    fn test_rewrite_temporary_and_aliased_ids() {
        let temp = id(3).with_code("0815").unwrap();
        assert_eq!(
            rewrite_links("[draft](../3-0815) [other](../3)", &temp, &id(4)).as_deref(),
            Some("[draft](../4) [other](../3)")
        );
        assert_eq!(rewrite_links("../notes/3", &id(3), &id(4)), None);
    }

    #[test]
    fn test_zero_and_foreign_ids_rejected() {
        assert!(matches!(ensure_movable(&id(0)), Err(DexError::Invalid { .. })));
        let foreign = id(2).with_alias("notes").unwrap();
        assert!(matches!(ensure_movable(&foreign), Err(DexError::Invalid { .. })));
        assert!(ensure_movable(&id(2)).is_ok());
    }
}
