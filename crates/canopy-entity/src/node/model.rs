//! Node entity model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use canopy_core::types::{NodeId, UserId};

use super::path::MaterializedPath;

/// Processing state of a node's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "node_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Content is stored and usable.
    Available,
    /// Content is still being processed.
    Processing,
    /// Content has been archived.
    Archived,
    /// Processing failed.
    Error,
}

impl NodeStatus {
    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Processing => "processing",
            Self::Archived => "archived",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = canopy_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "processing" => Ok(Self::Processing),
            "archived" => Ok(Self::Archived),
            "error" => Ok(Self::Error),
            _ => Err(canopy_core::AppError::invalid_argument(format!(
                "Invalid node status: '{s}'. Expected one of: available, processing, archived, error"
            ))),
        }
    }
}

/// Public link state embedded in a node row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PublicShare {
    /// The public code, if one was ever issued.
    pub share_code: Option<String>,
    /// Whether the code currently resolves.
    pub share_active: bool,
    /// When the code stops resolving.
    pub share_expires_at: Option<DateTime<Utc>>,
}

impl PublicShare {
    /// Whether the link resolves at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.share_active
            && self.share_code.is_some()
            && self.share_expires_at.is_some_and(|at| at > now)
    }
}

/// A file or folder.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Node {
    /// Unique node identifier.
    pub id: NodeId,
    /// The user who owns the node.
    pub owner_id: UserId,
    /// Display name, unique among active siblings.
    pub name: String,
    /// Whether this node is a folder.
    pub is_folder: bool,
    /// Parent folder (None at the root level).
    pub parent_id: Option<NodeId>,
    /// Ancestor ids, root first.
    pub path: MaterializedPath,
    /// Content size in bytes (zero for folders).
    pub size_bytes: i64,
    /// Blob store key (files only).
    pub content_ref: Option<String>,
    /// MIME type of the content.
    pub mime_type: Option<String>,
    /// Content processing state.
    pub status: NodeStatus,
    /// Whether the node is in the trash.
    pub is_deleted: bool,
    /// When the node was trashed.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Who trashed the node.
    pub deleted_by: Option<UserId>,
    /// Public link state.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub public_share: PublicShare,
    /// Number of public-link downloads.
    pub download_count: i64,
    /// Last public-link access.
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// When the node was created.
    pub created_at: DateTime<Utc>,
    /// When the node was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Whether this node is a file.
    pub fn is_file(&self) -> bool {
        !self.is_folder
    }

    /// Whether this node is not in the trash.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Whether `user_id` owns this node.
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    /// The path shared by every descendant: own path plus own id.
    pub fn subtree_prefix(&self) -> MaterializedPath {
        MaterializedPath::child_of(&self.path, self.id)
    }

    /// Whether this node lies strictly inside `ancestor`'s subtree.
    pub fn is_strict_descendant_of(&self, ancestor: &Node) -> bool {
        self.id != ancestor.id
            && MaterializedPath::is_descendant(&self.path, self.id, &ancestor.path, ancestor.id)
    }
}

/// Data required to insert a new node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNode {
    /// Owner of the new node.
    pub owner_id: UserId,
    /// Display name.
    pub name: String,
    /// Folder or file.
    pub is_folder: bool,
    /// Parent folder (None at the root level).
    pub parent_id: Option<NodeId>,
    /// Ancestor ids.
    pub path: MaterializedPath,
    /// Content size.
    pub size_bytes: i64,
    /// Blob store key.
    pub content_ref: Option<String>,
    /// MIME type.
    pub mime_type: Option<String>,
}

impl NewNode {
    /// A folder placed at `path`.
    pub fn folder(
        owner_id: UserId,
        name: impl Into<String>,
        parent_id: Option<NodeId>,
        path: MaterializedPath,
    ) -> Self {
        Self {
            owner_id,
            name: name.into(),
            is_folder: true,
            parent_id,
            path,
            size_bytes: 0,
            content_ref: None,
            mime_type: None,
        }
    }

    /// Materialize the row with a fresh id and timestamps.
    pub fn into_node(self, now: DateTime<Utc>) -> Node {
        Node {
            id: NodeId::new(),
            owner_id: self.owner_id,
            name: self.name,
            is_folder: self.is_folder,
            parent_id: self.parent_id,
            path: self.path,
            size_bytes: self.size_bytes,
            content_ref: self.content_ref,
            mime_type: self.mime_type,
            status: NodeStatus::Available,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            public_share: PublicShare::default(),
            download_count: 0,
            last_accessed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
