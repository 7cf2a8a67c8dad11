//! Folder listings and breadcrumbs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;

use canopy_auth::AccessResolver;
use canopy_core::error::AppError;
use canopy_core::result::AppResult;
use canopy_core::types::NodeId;
use canopy_database::{GrantRepository, NodeRepository};
use canopy_entity::node::Node;
use canopy_entity::user::Requester;

use crate::dto::{Breadcrumb, Listing};

/// Lists folder contents the requester can see.
#[derive(Debug, Clone)]
pub struct FileService {
    /// Node repository.
    nodes: Arc<dyn NodeRepository>,
    /// Grant repository, for breadcrumb roots.
    grants: Arc<dyn GrantRepository>,
    /// Access resolver.
    resolver: Arc<AccessResolver>,
}

impl FileService {
    /// Creates a new file service.
    pub fn new(
        nodes: Arc<dyn NodeRepository>,
        grants: Arc<dyn GrantRepository>,
        resolver: Arc<AccessResolver>,
    ) -> Self {
        Self {
            nodes,
            grants,
            resolver,
        }
    }

    /// Lists the root level (the requester's own top-level nodes) or a
    /// readable folder's immediate children.
    pub async fn list(
        &self,
        requester: &Requester,
        parent_id: Option<NodeId>,
    ) -> AppResult<Listing> {
        let Some(parent_id) = parent_id else {
            let mut nodes = self.nodes.list_root(requester.user_id).await?;
            sort_for_listing(&mut nodes);
            return Ok(Listing {
                nodes,
                current_folder: None,
                breadcrumbs: Vec::new(),
            });
        };

        let folder = self.resolver.require_read(parent_id, requester).await?;
        if !folder.is_folder {
            return Err(AppError::invalid_argument("Item is not a folder"));
        }

        let mut nodes = self.nodes.list_children(parent_id).await?;
        sort_for_listing(&mut nodes);
        let breadcrumbs = self.breadcrumbs(&folder, requester).await?;

        Ok(Listing {
            nodes,
            current_folder: Some(folder),
            breadcrumbs,
        })
    }

    /// Active files anywhere below a readable folder.
    pub async fn list_descendant_files(
        &self,
        folder_id: NodeId,
        requester: &Requester,
    ) -> AppResult<Vec<Node>> {
        let folder = self.resolver.require_read(folder_id, requester).await?;
        if !folder.is_folder {
            return Err(AppError::invalid_argument("Item is not a folder"));
        }

        let descendants = self.nodes.find_descendants(folder_id, false).await?;
        Ok(descendants.into_iter().filter(Node::is_file).collect())
    }

    /// Trail from the root (owner) or from the highest directly shared
    /// ancestor (anyone else) down to `folder`.
    async fn breadcrumbs(&self, folder: &Node, requester: &Requester) -> AppResult<Vec<Breadcrumb>> {
        let mut lineage: Vec<NodeId> = folder.path.ancestor_ids().to_vec();
        lineage.push(folder.id);

        let start = if folder.is_owned_by(requester.user_id) {
            0
        } else {
            let shared = self.directly_shared(&lineage, requester).await?;
            lineage
                .iter()
                .position(|id| shared.contains(id))
                .unwrap_or(lineage.len() - 1)
        };

        let visible = &lineage[start..];
        let names: HashMap<NodeId, String> = self
            .nodes
            .find_many(visible)
            .await?
            .into_iter()
            .map(|n| (n.id, n.name))
            .collect();

        Ok(visible
            .iter()
            .filter_map(|id| {
                names.get(id).map(|name| Breadcrumb {
                    id: *id,
                    name: name.clone(),
                })
            })
            .collect())
    }

    /// Nodes in `lineage` holding a user or class grant that admits the requester.
    async fn directly_shared(
        &self,
        lineage: &[NodeId],
        requester: &Requester,
    ) -> AppResult<HashSet<NodeId>> {
        let now = Utc::now();
        let mut shared: HashSet<NodeId> = self
            .grants
            .find_active_for_user(lineage, requester.user_id, now)
            .await?
            .into_iter()
            .map(|g| g.node_id)
            .collect();

        if let Some(cohort) = requester.cohort() {
            let class = self.grants.find_active_class(lineage, now).await?;
            shared.extend(
                class
                    .into_iter()
                    .filter(|g| g.admits(cohort, now))
                    .map(|g| g.node_id),
            );
        }

        Ok(shared)
    }
}

/// Folders first, then case-insensitive name.
pub(crate) fn sort_for_listing(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| {
        b.is_folder
            .cmp(&a.is_folder)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

#[cfg(test)]
mod tests {
    use canopy_core::types::UserId;
    use canopy_entity::node::{MaterializedPath, NewNode};

    use super::*;

    #[test]
    fn test_listing_order_puts_folders_first() {
        let owner = UserId::new();
        let now = Utc::now();
        let file = |name: &str| {
            NewNode {
                is_folder: false,
                ..NewNode::folder(owner, name, None, MaterializedPath::root())
            }
            .into_node(now)
        };
        let folder = |name: &str| NewNode::folder(owner, name, None, MaterializedPath::root()).into_node(now);

        let mut nodes = vec![file("b.txt"), folder("zeta"), file("A.txt"), folder("Alpha")];
        sort_for_listing(&mut nodes);

        let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "zeta", "A.txt", "b.txt"]);
    }
}
