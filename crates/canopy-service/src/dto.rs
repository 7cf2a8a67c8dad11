//! Response shapes returned by the services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use canopy_core::types::NodeId;
use canopy_entity::node::Node;

/// One step of a breadcrumb trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Folder id.
    pub id: NodeId,
    /// Folder name.
    pub name: String,
}

/// A folder listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Immediate active children, folders first.
    pub nodes: Vec<Node>,
    /// The listed folder, `None` at the root level.
    pub current_folder: Option<Node>,
    /// Path from the highest visible ancestor down to the listed folder.
    pub breadcrumbs: Vec<Breadcrumb>,
}

/// Aggregates over a folder's active subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderDetails {
    /// The folder itself.
    pub folder: Node,
    /// Active files below the folder.
    pub file_count: u64,
    /// Active folders below the folder.
    pub folder_count: u64,
    /// Total bytes of those files.
    pub total_bytes: i64,
}

/// Outcome of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResult {
    /// Descendants whose paths were rewritten.
    pub updated_descendant_count: u64,
}

/// Outcome of a soft delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    /// Nodes moved to the trash, including the target.
    pub moved_count: u64,
}

/// Outcome of a restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResult {
    /// Nodes brought back, including the target.
    pub restored_count: u64,
}

/// Outcome of one or more purges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    /// Nodes permanently removed.
    pub purged_nodes: u64,
    /// Blobs deleted from the blob store.
    pub blobs_deleted: u64,
    /// Blob deletions that failed and were left behind.
    pub blob_failures: u64,
}

impl PurgeReport {
    /// Fold another report into this one.
    pub fn absorb(&mut self, other: PurgeReport) {
        self.purged_nodes += other.purged_nodes;
        self.blobs_deleted += other.blobs_deleted;
        self.blob_failures += other.blob_failures;
    }
}

/// Outcome of a retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Trashed subtrees purged.
    pub purged_roots: u64,
    /// Purge totals across those subtrees.
    pub purge: PurgeReport,
    /// Expired user and class grants removed.
    pub grants_removed: u64,
}

/// A top-level trash item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashEntry {
    /// The trashed node.
    pub node: Node,
    /// Descendants trashed with it.
    pub descendant_count: u64,
    /// Bytes held by the node and those descendants.
    pub total_bytes: i64,
}

/// Totals over a user's trash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashStats {
    /// Top-level trash items.
    pub item_count: u64,
    /// Trashed nodes, including descendants.
    pub node_count: u64,
    /// Bytes held by trashed files.
    pub total_bytes: i64,
}

/// A freshly issued public link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicLink {
    /// The code to share.
    pub code: String,
    /// When the code stops resolving.
    pub expires_at: DateTime<Utc>,
}

/// File metadata disclosed through a public link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicLinkMeta {
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: i64,
    /// MIME type.
    pub mime_type: Option<String>,
}

/// A resolved public link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLink {
    /// Signed download URL.
    pub url: String,
    /// When the signed URL expires.
    pub url_expires_at: DateTime<Utc>,
    /// File metadata.
    pub meta: PublicLinkMeta,
}

/// Outcome of removing oneself from several shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRemoveResult {
    /// Grants removed.
    pub removed: u64,
}
