//! User directory entry.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use canopy_core::types::UserId;

/// Directory entry consulted when sharing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    /// User identifier.
    pub id: UserId,
    /// Name shown to other users.
    pub display_name: String,
    /// Whether other users may share nodes with this user.
    pub accepts_shares: bool,
}
