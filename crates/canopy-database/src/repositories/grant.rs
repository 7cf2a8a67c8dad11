//! Grant repository: per-user and class grants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use canopy_core::error::{AppError, ErrorKind};
use canopy_core::result::AppResult;
use canopy_core::types::{ClassGrantId, NodeId, UserId, raw_ids};
use canopy_entity::grant::{ClassShareGrant, NewClassShareGrant, NewShareGrant, ShareGrant};
use canopy_entity::user::Cohort;

/// Storage operations over share grants.
#[async_trait]
pub trait GrantRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Unexpired grants held by `user` on any of `node_ids`.
    async fn find_active_for_user(
        &self,
        node_ids: &[NodeId],
        user: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ShareGrant>>;

    /// Every grant on `node`, expired or not.
    async fn list_for_node(&self, node: NodeId) -> AppResult<Vec<ShareGrant>>;

    /// Unexpired grants held by `user`.
    async fn list_for_grantee(&self, user: UserId, now: DateTime<Utc>)
    -> AppResult<Vec<ShareGrant>>;

    /// Create a grant. `Conflict` when the pair already exists.
    async fn create(&self, grant: NewShareGrant) -> AppResult<ShareGrant>;

    /// Delete the grant of `grantee` on `node`. Returns whether one existed.
    async fn delete(&self, node: NodeId, grantee: UserId) -> AppResult<bool>;

    /// Delete `grantee`'s grants on any of `node_ids`.
    async fn delete_for_grantee(&self, node_ids: &[NodeId], grantee: UserId) -> AppResult<u64>;

    /// Unexpired class grants on any of `node_ids`.
    async fn find_active_class(
        &self,
        node_ids: &[NodeId],
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ClassShareGrant>>;

    /// Unexpired class grants a student in `cohort` falls under.
    async fn list_class_matching(
        &self,
        cohort: &Cohort,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ClassShareGrant>>;

    /// Every class grant on `node`.
    async fn list_class_for_node(&self, node: NodeId) -> AppResult<Vec<ClassShareGrant>>;

    /// Find a class grant by id.
    async fn find_class(&self, id: ClassGrantId) -> AppResult<Option<ClassShareGrant>>;

    /// Create a class grant.
    async fn create_class(&self, grant: NewClassShareGrant) -> AppResult<ClassShareGrant>;

    /// Delete a class grant. Returns whether it existed.
    async fn delete_class(&self, id: ClassGrantId) -> AppResult<bool>;

    /// Remove every user and class grant that expired before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, context, e)
}

/// PostgreSQL-backed grant repository.
#[derive(Debug, Clone)]
pub struct PgGrantRepository {
    pool: PgPool,
}

impl PgGrantRepository {
    /// Create a new grant repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GrantRepository for PgGrantRepository {
    async fn find_active_for_user(
        &self,
        node_ids: &[NodeId],
        user: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ShareGrant>> {
        sqlx::query_as::<_, ShareGrant>(
            "SELECT * FROM share_grants WHERE node_id = ANY($1) AND grantee_id = $2 \
             AND (expires_at IS NULL OR expires_at > $3)",
        )
        .bind(raw_ids(node_ids))
        .bind(user)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to find grants"))
    }

    async fn list_for_node(&self, node: NodeId) -> AppResult<Vec<ShareGrant>> {
        sqlx::query_as::<_, ShareGrant>(
            "SELECT * FROM share_grants WHERE node_id = $1 ORDER BY created_at",
        )
        .bind(node)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list grants"))
    }

    async fn list_for_grantee(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ShareGrant>> {
        sqlx::query_as::<_, ShareGrant>(
            "SELECT * FROM share_grants WHERE grantee_id = $1 \
             AND (expires_at IS NULL OR expires_at > $2) ORDER BY created_at DESC",
        )
        .bind(user)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list received grants"))
    }

    async fn create(&self, grant: NewShareGrant) -> AppResult<ShareGrant> {
        let row = grant.into_grant(Utc::now());
        sqlx::query_as::<_, ShareGrant>(
            "INSERT INTO share_grants (node_id, grantee_id, granted_by, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(row.node_id)
        .bind(row.grantee_id)
        .bind(row.granted_by)
        .bind(row.expires_at)
        .bind(row.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some("share_grants_node_grantee_key") =>
            {
                AppError::conflict("Node is already shared with this user")
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create grant", e),
        })
    }

    async fn delete(&self, node: NodeId, grantee: UserId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM share_grants WHERE node_id = $1 AND grantee_id = $2")
            .bind(node)
            .bind(grantee)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete grant"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_grantee(&self, node_ids: &[NodeId], grantee: UserId) -> AppResult<u64> {
        let result =
            sqlx::query("DELETE FROM share_grants WHERE node_id = ANY($1) AND grantee_id = $2")
                .bind(raw_ids(node_ids))
                .bind(grantee)
                .execute(&self.pool)
                .await
                .map_err(db_error("Failed to delete grants"))?;
        Ok(result.rows_affected())
    }

    async fn find_active_class(
        &self,
        node_ids: &[NodeId],
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ClassShareGrant>> {
        sqlx::query_as::<_, ClassShareGrant>(
            "SELECT * FROM class_share_grants WHERE node_id = ANY($1) \
             AND (expires_at IS NULL OR expires_at > $2)",
        )
        .bind(raw_ids(node_ids))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to find class grants"))
    }

    async fn list_class_matching(
        &self,
        cohort: &Cohort,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ClassShareGrant>> {
        sqlx::query_as::<_, ClassShareGrant>(
            "SELECT * FROM class_share_grants WHERE batch = $1 AND semester = $2 \
             AND (section IS NULL OR lower(section) = lower($3)) \
             AND (expires_at IS NULL OR expires_at > $4) ORDER BY created_at DESC",
        )
        .bind(&cohort.batch)
        .bind(cohort.semester)
        .bind(&cohort.section)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list class grants"))
    }

    async fn list_class_for_node(&self, node: NodeId) -> AppResult<Vec<ClassShareGrant>> {
        sqlx::query_as::<_, ClassShareGrant>(
            "SELECT * FROM class_share_grants WHERE node_id = $1 ORDER BY created_at",
        )
        .bind(node)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list class grants"))
    }

    async fn find_class(&self, id: ClassGrantId) -> AppResult<Option<ClassShareGrant>> {
        sqlx::query_as::<_, ClassShareGrant>("SELECT * FROM class_share_grants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to find class grant"))
    }

    async fn create_class(&self, grant: NewClassShareGrant) -> AppResult<ClassShareGrant> {
        let row = grant.into_grant(Utc::now());
        sqlx::query_as::<_, ClassShareGrant>(
            "INSERT INTO class_share_grants (id, node_id, batch, semester, section, subject_id, \
             granted_by, expires_at, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING *",
        )
        .bind(row.id)
        .bind(row.node_id)
        .bind(&row.batch)
        .bind(row.semester)
        .bind(&row.section)
        .bind(&row.subject_id)
        .bind(row.granted_by)
        .bind(row.expires_at)
        .bind(row.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create class grant"))
    }

    async fn delete_class(&self, id: ClassGrantId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM class_share_grants WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete class grant"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let users = sqlx::query("DELETE FROM share_grants WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete expired grants"))?
            .rows_affected();
        let classes = sqlx::query("DELETE FROM class_share_grants WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete expired class grants"))?
            .rows_affected();
        Ok(users + classes)
    }
}
