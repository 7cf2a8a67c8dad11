//! User directory lookups.

use async_trait::async_trait;
use sqlx::PgPool;

use canopy_core::error::{AppError, ErrorKind};
use canopy_core::result::AppResult;
use canopy_core::types::UserId;
use canopy_entity::user::UserProfile;

/// Read access to the identity collaborator's user directory.
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug + 'static {
    /// Find a user's profile.
    async fn find_profile(&self, id: UserId) -> AppResult<Option<UserProfile>>;

    /// Insert or replace a user's profile.
    async fn upsert_profile(&self, profile: UserProfile) -> AppResult<UserProfile>;
}

/// PostgreSQL-backed user directory.
#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Create a new user directory.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_profile(&self, id: UserId) -> AppResult<Option<UserProfile>> {
        sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user", e))
    }

    async fn upsert_profile(&self, profile: UserProfile) -> AppResult<UserProfile> {
        sqlx::query_as::<_, UserProfile>(
            "INSERT INTO users (id, display_name, accepts_shares) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET display_name = EXCLUDED.display_name, \
             accepts_shares = EXCLUDED.accepts_shares RETURNING *",
        )
        .bind(profile.id)
        .bind(&profile.display_name)
        .bind(profile.accepts_shares)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save user", e))
    }
}
