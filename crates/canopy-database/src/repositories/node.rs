//! Node repository: trait and PostgreSQL implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use canopy_core::error::{AppError, ErrorKind};
use canopy_core::result::AppResult;
use canopy_core::types::{NodeId, UserId, raw_ids};
use canopy_entity::node::{MaterializedPath, NewNode, Node};

/// Storage operations over the node hierarchy.
///
/// Every query that talks about "active" nodes excludes soft-deleted rows.
/// Name collisions among active siblings surface as `Conflict`.
#[async_trait]
pub trait NodeRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Find a node by id, trashed or not.
    async fn find_by_id(&self, id: NodeId) -> AppResult<Option<Node>>;

    /// Find every node in `ids` that exists.
    async fn find_many(&self, ids: &[NodeId]) -> AppResult<Vec<Node>>;

    /// Insert a node.
    async fn insert(&self, node: NewNode) -> AppResult<Node>;

    /// Rename a node in place.
    async fn rename(&self, id: NodeId, name: &str) -> AppResult<Node>;

    /// Active top-level nodes of `owner`.
    async fn list_root(&self, owner: UserId) -> AppResult<Vec<Node>>;

    /// Active immediate children of `parent`.
    async fn list_children(&self, parent: NodeId) -> AppResult<Vec<Node>>;

    /// Every node strictly below `ancestor`.
    async fn find_descendants(&self, ancestor: NodeId, include_deleted: bool)
    -> AppResult<Vec<Node>>;

    /// Reparent `id` to `new_parent` at `new_path` and rewrite every
    /// descendant path. Returns the number of descendants rewritten.
    async fn move_subtree(
        &self,
        id: NodeId,
        new_parent: Option<NodeId>,
        new_path: &MaterializedPath,
    ) -> AppResult<u64>;

    /// Trash `id` and every active descendant with one shared stamp, and
    /// deactivate their public links. Returns the number of rows trashed,
    /// zero when `id` was already trashed.
    async fn soft_delete_subtree(
        &self,
        id: NodeId,
        deleted_by: UserId,
        at: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Restore `id` and the descendants trashed with the same stamp. With
    /// `to_root`, the node is first moved to its owner's root level.
    /// Returns the number of rows restored, zero when `id` was not trashed.
    async fn restore_subtree(&self, id: NodeId, to_root: bool) -> AppResult<u64>;

    /// Permanently delete the trashed node `id` and its trashed descendants.
    /// Returns the rows removed, none when `id` is missing or no longer trashed.
    async fn purge_subtree(&self, id: NodeId) -> AppResult<Vec<Node>>;

    /// Trashed nodes of `owner` that were not trashed as part of their parent's cascade.
    async fn list_trashed(&self, owner: UserId) -> AppResult<Vec<Node>>;

    /// Top-level trashed nodes (any owner) stamped before `cutoff`.
    async fn find_trashed_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Node>>;

    /// Active nodes of `owner` whose name contains `query`, case-insensitively.
    async fn search_owned(&self, owner: UserId, query: &str, limit: usize)
    -> AppResult<Vec<Node>>;

    /// Active nodes that are, or lie below, one of `roots`, whose name
    /// contains `query`, case-insensitively.
    async fn search_within(
        &self,
        roots: &[NodeId],
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<Node>>;

    /// Install a public link code. `Conflict` when the code is taken.
    async fn set_public_share(
        &self,
        id: NodeId,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<Node>;

    /// Deactivate the node's public link. Returns whether a link was active.
    async fn deactivate_public_share(&self, id: NodeId) -> AppResult<bool>;

    /// The node holding the active public code `code`.
    async fn find_by_public_code(&self, code: &str) -> AppResult<Option<Node>>;

    /// Count a public download.
    async fn record_public_access(&self, id: NodeId, at: DateTime<Utc>) -> AppResult<()>;
}

const SIBLING_NAME_KEY: &str = "nodes_active_sibling_name_key";
const SHARE_CODE_KEY: &str = "nodes_active_share_code_key";

/// Translate a write error, mapping the sibling-name index to `Conflict`.
fn write_error(e: sqlx::Error, context: &'static str) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.constraint() == Some(SIBLING_NAME_KEY) => {
            AppError::conflict("An item with this name already exists here")
        }
        sqlx::Error::Database(ref db_err) if db_err.constraint() == Some(SHARE_CODE_KEY) => {
            AppError::conflict("Public code already in use")
        }
        _ => AppError::with_source(ErrorKind::Database, context, e),
    }
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, context, e)
}

/// Roots of trash entries: trashed rows whose parent is live or was
/// trashed by a different cascade.
const TRASH_ROOTS: &str = "SELECT n.* FROM nodes n LEFT JOIN nodes p ON p.id = n.parent_id \
     WHERE n.is_deleted \
     AND (p.id IS NULL OR NOT p.is_deleted OR p.deleted_at IS DISTINCT FROM n.deleted_at)";

/// PostgreSQL-backed node repository.
#[derive(Debug, Clone)]
pub struct PgNodeRepository {
    pool: PgPool,
}

impl PgNodeRepository {
    /// Create a new node repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NodeRepository for PgNodeRepository {
    async fn find_by_id(&self, id: NodeId) -> AppResult<Option<Node>> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to find node"))
    }

    async fn find_many(&self, ids: &[NodeId]) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE id = ANY($1)")
            .bind(raw_ids(ids))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to find nodes"))
    }

    async fn insert(&self, node: NewNode) -> AppResult<Node> {
        let row = node.into_node(Utc::now());
        sqlx::query_as::<_, Node>(
            "INSERT INTO nodes (id, owner_id, name, is_folder, parent_id, path, size_bytes, \
             content_ref, mime_type, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) RETURNING *",
        )
        .bind(row.id)
        .bind(row.owner_id)
        .bind(&row.name)
        .bind(row.is_folder)
        .bind(row.parent_id)
        .bind(&row.path)
        .bind(row.size_bytes)
        .bind(&row.content_ref)
        .bind(&row.mime_type)
        .bind(row.status)
        .bind(row.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "Failed to insert node"))
    }

    async fn rename(&self, id: NodeId, name: &str) -> AppResult<Node> {
        sqlx::query_as::<_, Node>(
            "UPDATE nodes SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error(e, "Failed to rename node"))?
        .ok_or_else(|| AppError::not_found(format!("Node {id} not found")))
    }

    async fn list_root(&self, owner: UserId) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT * FROM nodes WHERE owner_id = $1 AND parent_id IS NULL AND NOT is_deleted",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list root nodes"))
    }

    async fn list_children(&self, parent: NodeId) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT * FROM nodes WHERE parent_id = $1 AND NOT is_deleted",
        )
        .bind(parent)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list children"))
    }

    async fn find_descendants(
        &self,
        ancestor: NodeId,
        include_deleted: bool,
    ) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT * FROM nodes WHERE path @> ARRAY[$1]::uuid[] AND ($2 OR NOT is_deleted) \
             ORDER BY cardinality(path), name",
        )
        .bind(ancestor)
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to find descendants"))
    }

    async fn move_subtree(
        &self,
        id: NodeId,
        new_parent: Option<NodeId>,
        new_path: &MaterializedPath,
    ) -> AppResult<u64> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin move"))?;

        let old_path: Vec<Uuid> =
            sqlx::query_scalar("SELECT path FROM nodes WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error("Failed to lock node"))?
                .ok_or_else(|| AppError::not_found(format!("Node {id} not found")))?;

        sqlx::query("UPDATE nodes SET parent_id = $2, path = $3, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(new_parent)
            .bind(new_path)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, "Failed to move node"))?;

        // Descendants keep everything after the old prefix (old path + own id).
        let old_prefix_len = old_path.len() as i32 + 1;
        let new_prefix = MaterializedPath::child_of(new_path, id);
        let rewritten = sqlx::query(
            "UPDATE nodes SET path = $2 || path[$3 + 1:], updated_at = NOW() \
             WHERE path @> ARRAY[$1]::uuid[]",
        )
        .bind(id)
        .bind(&new_prefix)
        .bind(old_prefix_len)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, "Failed to rewrite descendant paths"))?
        .rows_affected();

        tx.commit().await.map_err(db_error("Failed to commit move"))?;
        Ok(rewritten)
    }

    async fn soft_delete_subtree(
        &self,
        id: NodeId,
        deleted_by: UserId,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin delete"))?;

        let own = sqlx::query(
            "UPDATE nodes SET is_deleted = TRUE, deleted_at = $2, deleted_by = $3, \
             share_active = FALSE, updated_at = NOW() WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(at)
        .bind(deleted_by)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to trash node"))?
        .rows_affected();

        if own == 0 {
            return Ok(0);
        }

        let cascaded = sqlx::query(
            "UPDATE nodes SET is_deleted = TRUE, deleted_at = $2, deleted_by = $3, \
             share_active = FALSE, updated_at = NOW() \
             WHERE path @> ARRAY[$1]::uuid[] AND NOT is_deleted",
        )
        .bind(id)
        .bind(at)
        .bind(deleted_by)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to trash descendants"))?
        .rows_affected();

        tx.commit().await.map_err(db_error("Failed to commit delete"))?;
        Ok(own + cascaded)
    }

    async fn restore_subtree(&self, id: NodeId, to_root: bool) -> AppResult<u64> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin restore"))?;

        let stamp: Option<(Vec<Uuid>, Option<DateTime<Utc>>)> = sqlx::query_as(
            "SELECT path, deleted_at FROM nodes WHERE id = $1 AND is_deleted FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to lock node"))?;

        let Some((old_path, deleted_at)) = stamp else {
            return Ok(0);
        };

        if to_root {
            sqlx::query("UPDATE nodes SET parent_id = NULL, path = '{}' WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to move node to root"))?;
            sqlx::query(
                "UPDATE nodes SET path = ARRAY[$1]::uuid[] || path[$2 + 1:] \
                 WHERE path @> ARRAY[$1]::uuid[]",
            )
            .bind(id)
            .bind(old_path.len() as i32 + 1)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to rewrite descendant paths"))?;
        }

        let cascaded = sqlx::query(
            "UPDATE nodes SET is_deleted = FALSE, deleted_at = NULL, deleted_by = NULL, \
             updated_at = NOW() \
             WHERE path @> ARRAY[$1]::uuid[] AND is_deleted AND deleted_at = $2",
        )
        .bind(id)
        .bind(deleted_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, "Failed to restore descendants"))?
        .rows_affected();

        let own = sqlx::query(
            "UPDATE nodes SET is_deleted = FALSE, deleted_at = NULL, deleted_by = NULL, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, "Failed to restore node"))?
        .rows_affected();

        tx.commit().await.map_err(db_error("Failed to commit restore"))?;
        Ok(own + cascaded)
    }

    async fn purge_subtree(&self, id: NodeId) -> AppResult<Vec<Node>> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin purge"))?;

        let trashed: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM nodes WHERE id = $1 AND is_deleted FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error("Failed to lock node"))?;

        if trashed.is_none() {
            return Ok(Vec::new());
        }

        let removed = sqlx::query_as::<_, Node>(
            "DELETE FROM nodes WHERE (id = $1 OR path @> ARRAY[$1]::uuid[]) AND is_deleted \
             RETURNING *",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("Failed to purge subtree"))?;

        tx.commit().await.map_err(db_error("Failed to commit purge"))?;
        Ok(removed)
    }

    async fn list_trashed(&self, owner: UserId) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(&format!(
            "{TRASH_ROOTS} AND n.owner_id = $1 ORDER BY n.deleted_at DESC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list trash"))
    }

    async fn find_trashed_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(&format!(
            "{TRASH_ROOTS} AND n.deleted_at < $1 ORDER BY n.deleted_at"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to find expired trash"))
    }

    async fn search_owned(
        &self,
        owner: UserId,
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT * FROM nodes WHERE owner_id = $1 AND NOT is_deleted \
             AND strpos(lower(name), lower($2)) > 0 ORDER BY lower(name) LIMIT $3",
        )
        .bind(owner)
        .bind(query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to search nodes"))
    }

    async fn search_within(
        &self,
        roots: &[NodeId],
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT * FROM nodes WHERE (id = ANY($1) OR path && $1) AND NOT is_deleted \
             AND strpos(lower(name), lower($2)) > 0 ORDER BY lower(name) LIMIT $3",
        )
        .bind(raw_ids(roots))
        .bind(query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to search shared nodes"))
    }

    async fn set_public_share(
        &self,
        id: NodeId,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<Node> {
        sqlx::query_as::<_, Node>(
            "UPDATE nodes SET share_code = $2, share_active = TRUE, share_expires_at = $3, \
             updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(code)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error(e, "Failed to set public link"))?
        .ok_or_else(|| AppError::not_found(format!("Node {id} not found")))
    }

    async fn deactivate_public_share(&self, id: NodeId) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE nodes SET share_active = FALSE, updated_at = NOW() \
             WHERE id = $1 AND share_active",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to revoke public link"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_public_code(&self, code: &str) -> AppResult<Option<Node>> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE share_code = $1 AND share_active")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to resolve public code"))
    }

    async fn record_public_access(&self, id: NodeId, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            "UPDATE nodes SET download_count = download_count + 1, last_accessed_at = $2 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to record access"))?;
        Ok(())
    }
}
