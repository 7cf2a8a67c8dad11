//! Grants to class cohorts, issued by teachers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use canopy_auth::AccessResolver;
use canopy_core::error::AppError;
use canopy_core::result::AppResult;
use canopy_core::types::{ClassGrantId, NodeId, UserId};
use canopy_database::GrantRepository;
use canopy_entity::grant::{ClassShareGrant, CohortTarget, NewClassShareGrant};
use canopy_entity::user::Requester;

/// Manages class share grants.
#[derive(Debug, Clone)]
pub struct ClassShareService {
    grants: Arc<dyn GrantRepository>,
    resolver: Arc<AccessResolver>,
}

impl ClassShareService {
    /// Creates a new class share service.
    pub fn new(grants: Arc<dyn GrantRepository>, resolver: Arc<AccessResolver>) -> Self {
        Self { grants, resolver }
    }

    /// Shares an owned node with every student in `target`.
    pub async fn share_with_class(
        &self,
        node_id: NodeId,
        requester: &Requester,
        target: CohortTarget,
        subject_id: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<ClassShareGrant> {
        if !requester.is_teacher() {
            return Err(AppError::forbidden("Only teachers can share with a class"));
        }
        self.resolver
            .require_owner(node_id, requester.user_id)
            .await?;

        let target = normalize_target(target)?;
        if expires_at.is_some_and(|at| at <= Utc::now()) {
            return Err(AppError::invalid_argument("Share expiry must be in the future"));
        }

        let grant = self
            .grants
            .create_class(NewClassShareGrant {
                node_id,
                target,
                subject_id: subject_id.filter(|s| !s.trim().is_empty()),
                granted_by: requester.user_id,
                expires_at,
            })
            .await?;

        info!(
            user_id = %requester.user_id,
            node_id = %node_id,
            grant_id = %grant.id,
            batch = %grant.batch,
            semester = grant.semester,
            "Node shared with class"
        );
        Ok(grant)
    }

    /// Removes a class grant on a node the caller owns.
    pub async fn revoke_class_share(&self, grant_id: ClassGrantId, owner: UserId) -> AppResult<()> {
        let grant = self
            .grants
            .find_class(grant_id)
            .await?
            .ok_or_else(|| AppError::not_found("Class share not found"))?;

        self.resolver
            .require_owner_including_trashed(grant.node_id, owner)
            .await?;

        self.grants.delete_class(grant_id).await?;
        info!(user_id = %owner, grant_id = %grant_id, "Class share revoked");
        Ok(())
    }

    /// Every class grant on an owned node.
    pub async fn list_class_grants(
        &self,
        node_id: NodeId,
        owner: UserId,
    ) -> AppResult<Vec<ClassShareGrant>> {
        self.resolver
            .require_owner_including_trashed(node_id, owner)
            .await?;
        self.grants.list_class_for_node(node_id).await
    }
}

fn normalize_target(target: CohortTarget) -> AppResult<CohortTarget> {
    let batch = target.batch.trim().to_string();
    if batch.is_empty() {
        return Err(AppError::invalid_argument("Batch is required"));
    }
    if target.semester < 1 {
        return Err(AppError::invalid_argument("Semester must be positive"));
    }
    let section = target
        .section
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(CohortTarget {
        batch,
        semester: target.semester,
        section,
    })
}
