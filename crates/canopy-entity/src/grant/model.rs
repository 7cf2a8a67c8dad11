//! Per-user share grant model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use canopy_core::types::{NodeId, UserId};

/// Read access to a node (and its subtree) granted to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ShareGrant {
    /// The shared node.
    pub node_id: NodeId,
    /// The user receiving access.
    pub grantee_id: UserId,
    /// The owner who granted access.
    pub granted_by: UserId,
    /// When the grant lapses (None = never).
    pub expires_at: Option<DateTime<Utc>>,
    /// When the grant was created.
    pub created_at: DateTime<Utc>,
}

impl ShareGrant {
    /// Whether the grant is in force at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Data required to create a grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShareGrant {
    /// The shared node.
    pub node_id: NodeId,
    /// The user receiving access.
    pub grantee_id: UserId,
    /// The granting owner.
    pub granted_by: UserId,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewShareGrant {
    /// Materialize the row stamped at `now`.
    pub fn into_grant(self, now: DateTime<Utc>) -> ShareGrant {
        ShareGrant {
            node_id: self.node_id,
            grantee_id: self.grantee_id,
            granted_by: self.granted_by,
            expires_at: self.expires_at,
            created_at: now,
        }
    }
}
