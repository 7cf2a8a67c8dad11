//! The read-access rule chain.
//!
//! Each rule either grants (returning its reason) or abstains. The
//! resolver runs them in order and stops at the first grant.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use canopy_core::result::AppResult;
use canopy_core::types::NodeId;
use canopy_database::GrantRepository;
use canopy_entity::node::Node;
use canopy_entity::user::Requester;

use super::verdict::AccessReason;

/// One named step of the read-access chain.
#[async_trait]
pub trait AccessRule: Send + Sync + std::fmt::Debug + 'static {
    /// Rule name, used in logs.
    fn name(&self) -> &'static str;

    /// Grant with a reason, or abstain with `None`.
    async fn evaluate(
        &self,
        node: &Node,
        requester: &Requester,
        now: DateTime<Utc>,
    ) -> AppResult<Option<AccessReason>>;
}

/// The node itself followed by its ancestors.
fn lineage(node: &Node) -> Vec<NodeId> {
    let mut ids = Vec::with_capacity(node.path.depth() + 1);
    ids.push(node.id);
    ids.extend_from_slice(node.path.ancestor_ids());
    ids
}

/// Owners can read everything they own.
#[derive(Debug, Clone, Default)]
pub struct OwnerRule;

#[async_trait]
impl AccessRule for OwnerRule {
    fn name(&self) -> &'static str {
        "owner"
    }

    async fn evaluate(
        &self,
        node: &Node,
        requester: &Requester,
        _now: DateTime<Utc>,
    ) -> AppResult<Option<AccessReason>> {
        Ok(node
            .is_owned_by(requester.user_id)
            .then_some(AccessReason::Owner))
    }
}

/// An unexpired user grant on the node or any ancestor.
#[derive(Debug, Clone)]
pub struct UserGrantRule {
    grants: Arc<dyn GrantRepository>,
}

impl UserGrantRule {
    /// Create the rule over a grant repository.
    pub fn new(grants: Arc<dyn GrantRepository>) -> Self {
        Self { grants }
    }
}

#[async_trait]
impl AccessRule for UserGrantRule {
    fn name(&self) -> &'static str {
        "user_grant"
    }

    async fn evaluate(
        &self,
        node: &Node,
        requester: &Requester,
        now: DateTime<Utc>,
    ) -> AppResult<Option<AccessReason>> {
        let grants = self
            .grants
            .find_active_for_user(&lineage(node), requester.user_id, now)
            .await?;

        if grants.iter().any(|g| g.node_id == node.id) {
            Ok(Some(AccessReason::Direct))
        } else if grants.is_empty() {
            Ok(None)
        } else {
            Ok(Some(AccessReason::Inherited))
        }
    }
}

/// An unexpired class grant on the node or any ancestor matching the
/// requester's cohort. Only students have a cohort.
#[derive(Debug, Clone)]
pub struct ClassGrantRule {
    grants: Arc<dyn GrantRepository>,
}

impl ClassGrantRule {
    /// Create the rule over a grant repository.
    pub fn new(grants: Arc<dyn GrantRepository>) -> Self {
        Self { grants }
    }
}

#[async_trait]
impl AccessRule for ClassGrantRule {
    fn name(&self) -> &'static str {
        "class_grant"
    }

    async fn evaluate(
        &self,
        node: &Node,
        requester: &Requester,
        now: DateTime<Utc>,
    ) -> AppResult<Option<AccessReason>> {
        let Some(cohort) = requester.cohort() else {
            return Ok(None);
        };

        let grants = self.grants.find_active_class(&lineage(node), now).await?;
        Ok(grants
            .iter()
            .any(|g| g.admits(cohort, now))
            .then_some(AccessReason::Class))
    }
}
