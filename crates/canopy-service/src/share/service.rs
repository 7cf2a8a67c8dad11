//! Per-user share grants.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use canopy_auth::AccessResolver;
use canopy_core::error::AppError;
use canopy_core::result::AppResult;
use canopy_core::types::{NodeId, UserId};
use canopy_database::{GrantRepository, NodeRepository, UserDirectory};
use canopy_entity::grant::{NewShareGrant, ShareGrant};
use canopy_entity::node::Node;
use canopy_entity::user::Requester;

use crate::dto::BulkRemoveResult;
use crate::file::service::sort_for_listing;

/// Manages grants of read access to individual users.
#[derive(Debug, Clone)]
pub struct ShareService {
    nodes: Arc<dyn NodeRepository>,
    grants: Arc<dyn GrantRepository>,
    users: Arc<dyn UserDirectory>,
    resolver: Arc<AccessResolver>,
}

impl ShareService {
    /// Creates a new share service.
    pub fn new(
        nodes: Arc<dyn NodeRepository>,
        grants: Arc<dyn GrantRepository>,
        users: Arc<dyn UserDirectory>,
        resolver: Arc<AccessResolver>,
    ) -> Self {
        Self {
            nodes,
            grants,
            users,
            resolver,
        }
    }

    /// Grants `grantee` read access to an owned node and its subtree.
    pub async fn share_with_user(
        &self,
        node_id: NodeId,
        owner: UserId,
        grantee: UserId,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<ShareGrant> {
        self.resolver.require_owner(node_id, owner).await?;

        if grantee == owner {
            return Err(AppError::invalid_argument("You cannot share an item with yourself"));
        }
        let now = Utc::now();
        if expires_at.is_some_and(|at| at <= now) {
            return Err(AppError::invalid_argument("Share expiry must be in the future"));
        }

        let profile = self
            .users
            .find_profile(grantee)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        if !profile.accepts_shares {
            return Err(AppError::forbidden(format!(
                "{} is not accepting shared items",
                profile.display_name
            )));
        }

        let existing = self
            .grants
            .list_for_node(node_id)
            .await?
            .into_iter()
            .find(|g| g.grantee_id == grantee);
        if let Some(grant) = existing {
            if grant.is_active(now) {
                return Err(AppError::conflict("Item is already shared with this user"));
            }
            // An expired grant still holds the (node, grantee) pair.
            self.grants.delete(node_id, grantee).await?;
        }

        let grant = self
            .grants
            .create(NewShareGrant {
                node_id,
                grantee_id: grantee,
                granted_by: owner,
                expires_at,
            })
            .await?;

        info!(
            user_id = %owner,
            node_id = %node_id,
            grantee_id = %grantee,
            "Node shared with user"
        );
        Ok(grant)
    }

    /// Removes a user grant.
    ///
    /// The owner names the grantee to remove. A grantee omits the target
    /// and removes only their own grant.
    pub async fn revoke_user_share(
        &self,
        node_id: NodeId,
        requester: UserId,
        target: Option<UserId>,
    ) -> AppResult<()> {
        let node = self
            .nodes
            .find_by_id(node_id)
            .await?
            .ok_or_else(|| AppError::not_found("Node not found"))?;

        match (node.is_owned_by(requester), target) {
            (true, Some(grantee)) => {
                if !self.grants.delete(node_id, grantee).await? {
                    return Err(AppError::not_found("Share not found"));
                }
                info!(user_id = %requester, node_id = %node_id, grantee_id = %grantee, "User share revoked");
                Ok(())
            }
            (false, None) => {
                if !self.grants.delete(node_id, requester).await? {
                    return Err(AppError::forbidden("Item is not shared with you"));
                }
                info!(user_id = %requester, node_id = %node_id, "Removed self from share");
                Ok(())
            }
            (true, None) => Err(AppError::forbidden(
                "The owner must name the user whose access is revoked",
            )),
            (false, Some(_)) => Err(AppError::forbidden(
                "Only the owner can revoke another user's access",
            )),
        }
    }

    /// Removes the caller's own grants on several nodes.
    ///
    /// Every id is checked before anything is removed.
    pub async fn bulk_remove_self(
        &self,
        node_ids: &[NodeId],
        requester: UserId,
    ) -> AppResult<BulkRemoveResult> {
        if node_ids.is_empty() {
            return Err(AppError::invalid_argument("No items selected"));
        }

        let found: HashSet<NodeId> = self
            .nodes
            .find_many(node_ids)
            .await?
            .into_iter()
            .map(|n| n.id)
            .collect();
        if let Some(missing) = node_ids.iter().find(|id| !found.contains(id)) {
            return Err(AppError::not_found(format!("Node {missing} not found")));
        }

        let removed = self.grants.delete_for_grantee(node_ids, requester).await?;
        info!(user_id = %requester, removed, "Removed self from shares");
        Ok(BulkRemoveResult { removed })
    }

    /// Every grant on an owned node, expired ones included.
    pub async fn list_grants(&self, node_id: NodeId, owner: UserId) -> AppResult<Vec<ShareGrant>> {
        self.resolver
            .require_owner_including_trashed(node_id, owner)
            .await?;
        self.grants.list_for_node(node_id).await
    }

    /// Active nodes shared with the requester directly or through their class.
    pub async fn shared_with_me(&self, requester: &Requester) -> AppResult<Vec<Node>> {
        let now = Utc::now();
        let mut ids: Vec<NodeId> = self
            .grants
            .list_for_grantee(requester.user_id, now)
            .await?
            .into_iter()
            .map(|g| g.node_id)
            .collect();

        if let Some(cohort) = requester.cohort() {
            ids.extend(
                self.grants
                    .list_class_matching(cohort, now)
                    .await?
                    .into_iter()
                    .map(|g| g.node_id),
            );
        }

        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(*id));

        let mut nodes: Vec<Node> = self
            .nodes
            .find_many(&ids)
            .await?
            .into_iter()
            .filter(|n| n.is_active() && !n.is_owned_by(requester.user_id))
            .collect();
        sort_for_listing(&mut nodes);
        Ok(nodes)
    }
}
