//! Folder CRUD operations with ownership enforcement.

use std::sync::Arc;

use tracing::{info, warn};

use canopy_auth::AccessResolver;
use canopy_cache::keys;
use canopy_core::config::TreeConfig;
use canopy_core::error::AppError;
use canopy_core::result::AppResult;
use canopy_core::traits::CacheProvider;
use canopy_core::types::{NodeId, UserId};
use canopy_database::NodeRepository;
use canopy_entity::node::{MaterializedPath, NewNode, Node, validate_name};
use canopy_entity::user::Requester;

use crate::dto::{DeleteResult, FolderDetails, MoveResult};
use crate::trash::TrashService;

/// Manages folder CRUD operations.
#[derive(Debug, Clone)]
pub struct FolderService {
    /// Node repository.
    nodes: Arc<dyn NodeRepository>,
    /// Access resolver.
    resolver: Arc<AccessResolver>,
    /// Trash service, for deletes.
    trash: Arc<TrashService>,
    /// Signed URL cache.
    cache: Arc<dyn CacheProvider>,
    /// Depth and name limits.
    tree: TreeConfig,
}

impl FolderService {
    /// Creates a new folder service.
    pub fn new(
        nodes: Arc<dyn NodeRepository>,
        resolver: Arc<AccessResolver>,
        trash: Arc<TrashService>,
        cache: Arc<dyn CacheProvider>,
        tree: TreeConfig,
    ) -> Self {
        Self {
            nodes,
            resolver,
            trash,
            cache,
            tree,
        }
    }

    /// Creates a folder under `parent_id`, or at the owner's root level.
    pub async fn create(
        &self,
        name: &str,
        owner: UserId,
        parent_id: Option<NodeId>,
    ) -> AppResult<Node> {
        let name = validate_name(name, self.tree.max_name_length)?;

        let parent = match parent_id {
            Some(id) => Some(self.owned_folder(id, owner).await?),
            None => None,
        };

        let path = MaterializedPath::build(parent.as_ref());
        if !path.is_valid_depth(self.tree.max_depth) {
            return Err(AppError::invalid_argument(format!(
                "Folders cannot be nested deeper than {} levels",
                self.tree.max_depth
            )));
        }

        let folder = self
            .nodes
            .insert(NewNode::folder(owner, name, parent_id, path))
            .await?;

        info!(
            user_id = %owner,
            node_id = %folder.id,
            name = %folder.name,
            "Folder created"
        );

        Ok(folder)
    }

    /// Renames a node the caller owns.
    pub async fn rename(&self, id: NodeId, owner: UserId, new_name: &str) -> AppResult<Node> {
        let node = self.resolver.require_owner(id, owner).await?;
        let name = validate_name(new_name, self.tree.max_name_length)?;
        if name == node.name {
            return Ok(node);
        }

        let renamed = self.nodes.rename(id, &name).await?;

        // Download URLs embed the file name.
        let pattern = keys::signed_url_node_pattern(id.into_uuid());
        if let Err(e) = self.cache.delete_pattern(&pattern).await {
            warn!(node_id = %id, error = %e, "Failed to invalidate cached URLs after rename");
        }

        info!(user_id = %owner, node_id = %id, old = %node.name, new = %renamed.name, "Node renamed");
        Ok(renamed)
    }

    /// Moves a node (and its subtree) under `new_parent_id`, or to the root level.
    pub async fn move_node(
        &self,
        id: NodeId,
        owner: UserId,
        new_parent_id: Option<NodeId>,
    ) -> AppResult<MoveResult> {
        if new_parent_id == Some(id) {
            return Err(AppError::invalid_argument("Cannot move an item into itself"));
        }

        let (item, destination) = tokio::try_join!(self.resolver.require_owner(id, owner), async {
            match new_parent_id {
                Some(parent) => self.owned_folder(parent, owner).await.map(Some),
                None => Ok(None),
            }
        })?;

        if let Some(dest) = &destination {
            if dest.is_strict_descendant_of(&item) {
                return Err(AppError::invalid_argument(
                    "Cannot move a folder into one of its own subfolders",
                ));
            }
        }

        if item.parent_id == new_parent_id {
            return Ok(MoveResult {
                updated_descendant_count: 0,
            });
        }

        let new_path = MaterializedPath::build(destination.as_ref());
        if item.is_folder {
            self.check_moved_depth(&item, &new_path).await?;
        }

        let updated = self.nodes.move_subtree(id, new_parent_id, &new_path).await?;

        info!(
            user_id = %owner,
            node_id = %id,
            new_parent = ?new_parent_id,
            descendants = updated,
            "Node moved"
        );

        Ok(MoveResult {
            updated_descendant_count: updated,
        })
    }

    /// Moves a node and its subtree to the trash.
    pub async fn delete(&self, id: NodeId, owner: UserId) -> AppResult<DeleteResult> {
        self.trash.soft_delete(id, owner).await
    }

    /// File count, folder count, and total bytes over the active subtree.
    pub async fn get_details(&self, id: NodeId, requester: &Requester) -> AppResult<FolderDetails> {
        let folder = self.resolver.require_read(id, requester).await?;
        if !folder.is_folder {
            return Err(AppError::invalid_argument("Item is not a folder"));
        }

        let descendants = self.nodes.find_descendants(id, false).await?;
        let (files, folders): (Vec<&Node>, Vec<&Node>) =
            descendants.iter().partition(|n| n.is_file());

        Ok(FolderDetails {
            file_count: files.len() as u64,
            folder_count: folders.len() as u64,
            total_bytes: files.iter().map(|n| n.size_bytes).sum(),
            folder,
        })
    }

    /// Loads an active folder owned by `owner`.
    async fn owned_folder(&self, id: NodeId, owner: UserId) -> AppResult<Node> {
        let node = self.resolver.require_owner(id, owner).await?;
        if !node.is_folder {
            return Err(AppError::invalid_argument("Destination is not a folder"));
        }
        Ok(node)
    }

    /// The moved folder and its deepest folder descendant must stay under the limit.
    /// Trashed descendants count too, since they move along and may be restored.
    async fn check_moved_depth(&self, item: &Node, new_path: &MaterializedPath) -> AppResult<()> {
        let base = item.path.depth();
        let deepest = self
            .nodes
            .find_descendants(item.id, true)
            .await?
            .iter()
            .filter(|n| n.is_folder)
            .map(|n| n.path.depth() - base)
            .max()
            .unwrap_or(0);

        if new_path.depth() + deepest >= self.tree.max_depth {
            return Err(AppError::invalid_argument(format!(
                "Move would nest folders deeper than {} levels",
                self.tree.max_depth
            )));
        }
        Ok(())
    }
}
