//! Upload registration: store bytes, then record metadata under a free name.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use canopy_auth::AccessResolver;
use canopy_core::config::{StorageConfig, TreeConfig};
use canopy_core::error::AppError;
use canopy_core::result::AppResult;
use canopy_core::traits::BlobStore;
use canopy_core::types::{NodeId, UserId};
use canopy_database::NodeRepository;
use canopy_entity::node::{MaterializedPath, NewNode, Node, first_free_name, validate_name};

/// Fallback MIME type when the client sends none.
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// One file in an upload batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFile {
    /// Requested file name.
    pub name: String,
    /// Client-reported MIME type.
    pub content_type: Option<String>,
    /// File content.
    #[serde(skip)]
    pub data: Bytes,
}

/// Registers uploaded files.
#[derive(Debug, Clone)]
pub struct UploadService {
    nodes: Arc<dyn NodeRepository>,
    resolver: Arc<AccessResolver>,
    blobs: Arc<dyn BlobStore>,
    max_upload_size_bytes: u64,
    max_name_length: usize,
}

impl UploadService {
    /// Creates a new upload service.
    pub fn new(
        nodes: Arc<dyn NodeRepository>,
        resolver: Arc<AccessResolver>,
        blobs: Arc<dyn BlobStore>,
        storage: &StorageConfig,
        tree: &TreeConfig,
    ) -> Self {
        Self {
            nodes,
            resolver,
            blobs,
            max_upload_size_bytes: storage.max_upload_size_bytes,
            max_name_length: tree.max_name_length,
        }
    }

    /// Stores each file and records it under `parent_id` (or the root
    /// level). Names that collide with an active sibling get ` (n)`
    /// inserted before the extension.
    pub async fn register_upload(
        &self,
        files: Vec<UploadFile>,
        owner: UserId,
        parent_id: Option<NodeId>,
    ) -> AppResult<Vec<Node>> {
        if files.is_empty() {
            return Err(AppError::invalid_argument("No files to upload"));
        }

        let parent = match parent_id {
            Some(id) => {
                let parent = self.resolver.require_owner(id, owner).await?;
                if !parent.is_folder {
                    return Err(AppError::invalid_argument("Destination is not a folder"));
                }
                Some(parent)
            }
            None => None,
        };

        let mut names = Vec::with_capacity(files.len());
        for file in &files {
            if file.data.len() as u64 > self.max_upload_size_bytes {
                return Err(AppError::invalid_argument(format!(
                    "'{}' exceeds the upload limit of {} bytes",
                    file.name, self.max_upload_size_bytes
                )));
            }
            names.push(validate_name(&file.name, self.max_name_length)?);
        }

        let siblings = match parent_id {
            Some(id) => self.nodes.list_children(id).await?,
            None => self.nodes.list_root(owner).await?,
        };
        let mut taken: HashSet<String> = siblings.into_iter().map(|n| n.name).collect();
        let path = MaterializedPath::build(parent.as_ref());

        let mut created = Vec::with_capacity(files.len());
        for (file, requested) in files.into_iter().zip(names) {
            let name = first_free_name(&requested, |candidate| taken.contains(candidate));
            taken.insert(name.clone());

            let mime_type = file
                .content_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
            let size_bytes = file.data.len() as i64;
            let key = self.blobs.put(file.data, &mime_type).await?;

            let record = NewNode {
                owner_id: owner,
                name,
                is_folder: false,
                parent_id,
                path: path.clone(),
                size_bytes,
                content_ref: Some(key.clone()),
                mime_type: Some(mime_type),
            };

            let node = match self.nodes.insert(record).await {
                Ok(node) => node,
                Err(e) => {
                    if let Err(cleanup) = self.blobs.delete(&key).await {
                        warn!(key = %key, error = %cleanup, "Failed to delete orphaned blob");
                    }
                    return Err(e);
                }
            };

            info!(
                user_id = %owner,
                node_id = %node.id,
                name = %node.name,
                size = node.size_bytes,
                "File uploaded"
            );
            created.push(node);
        }

        Ok(created)
    }
}
