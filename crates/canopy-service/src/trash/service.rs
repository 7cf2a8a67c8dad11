//! Trash lifecycle.
//!
//! Active → soft delete → Trashed → restore → Active, and
//! Trashed → purge → gone. Cascades run atomically in the store; blob
//! deletion after a purge is best-effort.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use canopy_auth::AccessResolver;
use canopy_cache::keys;
use canopy_core::error::AppError;
use canopy_core::result::AppResult;
use canopy_core::traits::{BlobStore, CacheProvider};
use canopy_core::types::{NodeId, UserId};
use canopy_database::{GrantRepository, NodeRepository};
use canopy_entity::node::Node;

use crate::dto::{DeleteResult, PurgeReport, RestoreResult, SweepReport, TrashEntry, TrashStats};

/// Manages trashing, restoring, and purging nodes.
#[derive(Debug, Clone)]
pub struct TrashService {
    nodes: Arc<dyn NodeRepository>,
    grants: Arc<dyn GrantRepository>,
    resolver: Arc<AccessResolver>,
    blobs: Arc<dyn BlobStore>,
    cache: Arc<dyn CacheProvider>,
}

impl TrashService {
    /// Creates a new trash service.
    pub fn new(
        nodes: Arc<dyn NodeRepository>,
        grants: Arc<dyn GrantRepository>,
        resolver: Arc<AccessResolver>,
        blobs: Arc<dyn BlobStore>,
        cache: Arc<dyn CacheProvider>,
    ) -> Self {
        Self {
            nodes,
            grants,
            resolver,
            blobs,
            cache,
        }
    }

    /// Trashes an owned node and its active subtree.
    pub async fn soft_delete(&self, id: NodeId, owner: UserId) -> AppResult<DeleteResult> {
        let node = self
            .resolver
            .require_owner_including_trashed(id, owner)
            .await?;
        if node.is_deleted {
            return Err(AppError::conflict("Item is already in the trash"));
        }

        let moved = self.nodes.soft_delete_subtree(id, owner, Utc::now()).await?;
        if moved == 0 {
            return Err(AppError::conflict("Item is already in the trash"));
        }

        info!(user_id = %owner, node_id = %id, moved, "Moved to trash");
        Ok(DeleteResult { moved_count: moved })
    }

    /// Restores a trashed node in place, with the descendants trashed alongside it.
    /// Restoring an item that is not in the trash changes nothing.
    pub async fn restore(&self, id: NodeId, owner: UserId) -> AppResult<RestoreResult> {
        let node = self
            .resolver
            .require_owner_including_trashed(id, owner)
            .await?;
        if !node.is_deleted {
            return Ok(RestoreResult::default());
        }

        if let Some(parent_id) = node.parent_id {
            let parent = self.nodes.find_by_id(parent_id).await?;
            if !parent.as_ref().is_some_and(Node::is_active) {
                return Err(AppError::conflict(
                    "The containing folder is in the trash; restore it first or restore to root",
                ));
            }
        }

        self.restore_subtree(&node, owner, false).await
    }

    /// Restores a trashed node at the owner's root level.
    pub async fn restore_to_root(&self, id: NodeId, owner: UserId) -> AppResult<RestoreResult> {
        let node = self
            .resolver
            .require_owner_including_trashed(id, owner)
            .await?;
        if !node.is_deleted {
            return Ok(RestoreResult::default());
        }
        self.restore_subtree(&node, owner, true).await
    }

    /// Permanently removes a trashed node and its subtree.
    pub async fn purge(&self, id: NodeId, owner: UserId) -> AppResult<PurgeReport> {
        self.trashed(id, owner).await?;
        self.purge_subtree(id).await
    }

    /// Purges several trashed nodes. Every id is checked first.
    pub async fn purge_many(&self, ids: &[NodeId], owner: UserId) -> AppResult<PurgeReport> {
        if ids.is_empty() {
            return Err(AppError::invalid_argument("No items selected"));
        }
        for id in ids {
            self.trashed(*id, owner).await?;
        }

        let mut report = PurgeReport::default();
        let mut seen = HashSet::new();
        for id in ids {
            // An earlier id may have taken this one with it.
            if !seen.insert(*id) || self.nodes.find_by_id(*id).await?.is_none() {
                continue;
            }
            report.absorb(self.purge_subtree(*id).await?);
        }
        Ok(report)
    }

    /// Purges everything in the owner's trash.
    pub async fn empty_trash(&self, owner: UserId) -> AppResult<PurgeReport> {
        let mut report = PurgeReport::default();
        for root in self.nodes.list_trashed(owner).await? {
            report.absorb(self.purge_subtree(root.id).await?);
        }
        info!(user_id = %owner, purged = report.purged_nodes, "Trash emptied");
        Ok(report)
    }

    /// Purges trash older than `max_age_days` for every owner and drops
    /// expired grants. Running it twice is harmless.
    pub async fn retention_sweep(&self, max_age_days: i64) -> AppResult<SweepReport> {
        let now = Utc::now();
        let cutoff = now - Duration::days(max_age_days.max(0));

        let mut report = SweepReport::default();
        for root in self.nodes.find_trashed_before(cutoff).await? {
            match self.purge_subtree(root.id).await {
                Ok(purged) if purged.purged_nodes > 0 => {
                    report.purged_roots += 1;
                    report.purge.absorb(purged);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(node_id = %root.id, error = %e, "Retention purge failed");
                }
            }
        }
        report.grants_removed = self.grants.delete_expired(now).await?;

        info!(
            cutoff = %cutoff,
            purged_roots = report.purged_roots,
            purged_nodes = report.purge.purged_nodes,
            blob_failures = report.purge.blob_failures,
            grants_removed = report.grants_removed,
            "Retention sweep finished"
        );
        Ok(report)
    }

    /// Top-level trash items with the size of what was trashed with them.
    pub async fn list_trash(&self, owner: UserId) -> AppResult<Vec<TrashEntry>> {
        let roots = self.nodes.list_trashed(owner).await?;
        let mut entries = Vec::with_capacity(roots.len());
        for root in roots {
            let batch: Vec<Node> = self
                .nodes
                .find_descendants(root.id, true)
                .await?
                .into_iter()
                .filter(|n| n.is_deleted && n.deleted_at == root.deleted_at)
                .collect();

            entries.push(TrashEntry {
                descendant_count: batch.len() as u64,
                total_bytes: root.size_bytes + batch.iter().map(|n| n.size_bytes).sum::<i64>(),
                node: root,
            });
        }
        entries.sort_by(|a, b| b.node.deleted_at.cmp(&a.node.deleted_at));
        Ok(entries)
    }

    /// Totals over the owner's trash.
    pub async fn stats(&self, owner: UserId) -> AppResult<TrashStats> {
        let entries = self.list_trash(owner).await?;
        Ok(TrashStats {
            item_count: entries.len() as u64,
            node_count: entries.iter().map(|e| e.descendant_count + 1).sum(),
            total_bytes: entries.iter().map(|e| e.total_bytes).sum(),
        })
    }

    /// Loads an owned node that must be in the trash.
    async fn trashed(&self, id: NodeId, owner: UserId) -> AppResult<Node> {
        let node = self
            .resolver
            .require_owner_including_trashed(id, owner)
            .await?;
        if !node.is_deleted {
            return Err(AppError::invalid_argument("Item is not in the trash"));
        }
        Ok(node)
    }

    async fn restore_subtree(
        &self,
        node: &Node,
        owner: UserId,
        to_root: bool,
    ) -> AppResult<RestoreResult> {
        // Zero when a concurrent restore got there first.
        let restored = self.nodes.restore_subtree(node.id, to_root).await?;

        info!(user_id = %owner, node_id = %node.id, restored, to_root, "Restored from trash");
        Ok(RestoreResult {
            restored_count: restored,
        })
    }

    /// Deletes rows (grants go with them), then blobs and cached URLs.
    async fn purge_subtree(&self, id: NodeId) -> AppResult<PurgeReport> {
        let removed = self.nodes.purge_subtree(id).await?;
        let mut report = PurgeReport {
            purged_nodes: removed.len() as u64,
            ..PurgeReport::default()
        };

        for node in &removed {
            // Only files are ever issued signed URLs.
            let Some(key) = node.content_ref.as_deref() else {
                continue;
            };

            let pattern = keys::signed_url_node_pattern(node.id.into_uuid());
            if let Err(e) = self.cache.delete_pattern(&pattern).await {
                warn!(node_id = %node.id, error = %e, "Failed to drop cached URLs");
            }

            match self.blobs.delete(key).await {
                Ok(()) => report.blobs_deleted += 1,
                Err(e) => {
                    report.blob_failures += 1;
                    warn!(node_id = %node.id, key = %key, error = %e, "Blob delete failed during purge");
                }
            }
        }

        if report.purged_nodes > 0 {
            info!(
                node_id = %id,
                purged = report.purged_nodes,
                blob_failures = report.blob_failures,
                "Purged"
            );
        }
        Ok(report)
    }
}
