//! In-memory node store.
//!
//! Implements every repository trait over plain maps behind one
//! `RwLock`. Each cascade runs under a single write guard, so readers
//! never observe a half-applied move, delete, restore, or purge. The
//! same uniqueness rules as the PostgreSQL indexes are enforced and
//! reported as `Conflict`.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use canopy_core::error::AppError;
use canopy_core::result::AppResult;
use canopy_core::types::{ClassGrantId, NodeId, UserId};
use canopy_entity::grant::{ClassShareGrant, NewClassShareGrant, NewShareGrant, ShareGrant};
use canopy_entity::node::{MaterializedPath, NewNode, Node};
use canopy_entity::user::{Cohort, UserProfile};

use crate::repositories::{GrantRepository, NodeRepository, UserDirectory};

#[derive(Debug, Default)]
struct MemoryState {
    nodes: HashMap<NodeId, Node>,
    grants: HashMap<(NodeId, UserId), ShareGrant>,
    class_grants: HashMap<ClassGrantId, ClassShareGrant>,
    users: HashMap<UserId, UserProfile>,
}

impl MemoryState {
    fn node(&self, id: NodeId) -> AppResult<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| AppError::not_found(format!("Node {id} not found")))
    }

    fn node_mut(&mut self, id: NodeId) -> AppResult<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Node {id} not found")))
    }

    /// Whether an active sibling other than those in `except` holds `name`.
    fn sibling_taken(
        &self,
        owner: UserId,
        parent: Option<NodeId>,
        name: &str,
        except: &HashSet<NodeId>,
    ) -> bool {
        self.nodes.values().any(|n| {
            !n.is_deleted
                && n.owner_id == owner
                && n.parent_id == parent
                && n.name == name
                && !except.contains(&n.id)
        })
    }

    fn descendant_ids(&self, ancestor: NodeId) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.path.contains(ancestor))
            .map(|n| n.id)
            .collect()
    }

    fn rewrite_descendants(
        &mut self,
        ancestor: NodeId,
        old_prefix: &MaterializedPath,
        new_prefix: &MaterializedPath,
        now: DateTime<Utc>,
    ) -> u64 {
        let mut rewritten = 0;
        for node in self.nodes.values_mut() {
            if !node.path.contains(ancestor) {
                continue;
            }
            if let Some(path) = node.path.rewrite_prefix(old_prefix, new_prefix) {
                node.path = path;
                node.updated_at = now;
                rewritten += 1;
            }
        }
        rewritten
    }

    fn is_trash_root(&self, node: &Node) -> bool {
        if !node.is_deleted {
            return false;
        }
        match node.parent_id.and_then(|p| self.nodes.get(&p)) {
            None => true,
            Some(parent) => !parent.is_deleted || parent.deleted_at != node.deleted_at,
        }
    }
}

fn matches_query(node: &Node, needle: &str) -> bool {
    node.name.to_lowercase().contains(needle)
}

fn sorted_limited(mut nodes: Vec<Node>, limit: usize) -> Vec<Node> {
    nodes.sort_by_key(|n| n.name.to_lowercase());
    nodes.truncate(limit);
    nodes
}

/// Node store held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NodeRepository for MemoryStore {
    async fn find_by_id(&self, id: NodeId) -> AppResult<Option<Node>> {
        Ok(self.state.read().await.nodes.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[NodeId]) -> AppResult<Vec<Node>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.nodes.get(id).cloned())
            .collect())
    }

    async fn insert(&self, node: NewNode) -> AppResult<Node> {
        let mut state = self.state.write().await;
        if state.sibling_taken(node.owner_id, node.parent_id, &node.name, &HashSet::new()) {
            return Err(AppError::conflict("An item with this name already exists here"));
        }
        let row = node.into_node(Utc::now());
        state.nodes.insert(row.id, row.clone());
        Ok(row)
    }

    async fn rename(&self, id: NodeId, name: &str) -> AppResult<Node> {
        let mut state = self.state.write().await;
        let (owner, parent, active) = {
            let node = state.node(id)?;
            (node.owner_id, node.parent_id, node.is_active())
        };
        if active && state.sibling_taken(owner, parent, name, &HashSet::from([id])) {
            return Err(AppError::conflict("An item with this name already exists here"));
        }
        let node = state.node_mut(id)?;
        node.name = name.to_string();
        node.updated_at = Utc::now();
        Ok(node.clone())
    }

    async fn list_root(&self, owner: UserId) -> AppResult<Vec<Node>> {
        let state = self.state.read().await;
        Ok(state
            .nodes
            .values()
            .filter(|n| n.owner_id == owner && n.parent_id.is_none() && n.is_active())
            .cloned()
            .collect())
    }

    async fn list_children(&self, parent: NodeId) -> AppResult<Vec<Node>> {
        let state = self.state.read().await;
        Ok(state
            .nodes
            .values()
            .filter(|n| n.parent_id == Some(parent) && n.is_active())
            .cloned()
            .collect())
    }

    async fn find_descendants(
        &self,
        ancestor: NodeId,
        include_deleted: bool,
    ) -> AppResult<Vec<Node>> {
        let state = self.state.read().await;
        let mut nodes: Vec<Node> = state
            .nodes
            .values()
            .filter(|n| n.path.contains(ancestor) && (include_deleted || n.is_active()))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| {
            a.path
                .depth()
                .cmp(&b.path.depth())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(nodes)
    }

    async fn move_subtree(
        &self,
        id: NodeId,
        new_parent: Option<NodeId>,
        new_path: &MaterializedPath,
    ) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let node = state.node(id)?.clone();
        if node.is_active()
            && state.sibling_taken(node.owner_id, new_parent, &node.name, &HashSet::from([id]))
        {
            return Err(AppError::conflict("An item with this name already exists here"));
        }

        let now = Utc::now();
        let old_prefix = node.subtree_prefix();
        let new_prefix = MaterializedPath::child_of(new_path, id);
        {
            let moved = state.node_mut(id)?;
            moved.parent_id = new_parent;
            moved.path = new_path.clone();
            moved.updated_at = now;
        }
        Ok(state.rewrite_descendants(id, &old_prefix, &new_prefix, now))
    }

    async fn soft_delete_subtree(
        &self,
        id: NodeId,
        deleted_by: UserId,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut state = self.state.write().await;
        if state.node(id)?.is_deleted {
            return Ok(0);
        }

        let mut targets = state.descendant_ids(id);
        targets.push(id);
        let mut trashed = 0;
        for target in targets {
            if let Some(node) = state.nodes.get_mut(&target) {
                if node.is_deleted {
                    continue;
                }
                node.is_deleted = true;
                node.deleted_at = Some(at);
                node.deleted_by = Some(deleted_by);
                node.public_share.share_active = false;
                node.updated_at = at;
                trashed += 1;
            }
        }
        Ok(trashed)
    }

    async fn restore_subtree(&self, id: NodeId, to_root: bool) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let node = state.node(id)?.clone();
        if !node.is_deleted {
            return Ok(0);
        }
        let stamp = node.deleted_at;

        let mut batch: HashSet<NodeId> = state
            .nodes
            .values()
            .filter(|n| n.path.contains(id) && n.is_deleted && n.deleted_at == stamp)
            .map(|n| n.id)
            .collect();
        batch.insert(id);

        let own_parent = if to_root { None } else { node.parent_id };
        for member in &batch {
            let candidate = state.node(*member)?;
            let parent = if *member == id {
                own_parent
            } else {
                candidate.parent_id
            };
            if state.sibling_taken(candidate.owner_id, parent, &candidate.name, &batch) {
                return Err(AppError::conflict(format!(
                    "An item named '{}' already exists at the restore location",
                    candidate.name
                )));
            }
        }

        let now = Utc::now();
        if to_root {
            let old_prefix = node.subtree_prefix();
            let root = MaterializedPath::root();
            let new_prefix = MaterializedPath::child_of(&root, id);
            let moved = state.node_mut(id)?;
            moved.parent_id = None;
            moved.path = root;
            state.rewrite_descendants(id, &old_prefix, &new_prefix, now);
        }

        for member in &batch {
            let restored = state.node_mut(*member)?;
            restored.is_deleted = false;
            restored.deleted_at = None;
            restored.deleted_by = None;
            restored.updated_at = now;
        }
        Ok(batch.len() as u64)
    }

    async fn purge_subtree(&self, id: NodeId) -> AppResult<Vec<Node>> {
        let mut state = self.state.write().await;
        if !state.nodes.get(&id).is_some_and(|n| n.is_deleted) {
            return Ok(Vec::new());
        }
        let mut targets: Vec<NodeId> = state
            .descendant_ids(id)
            .into_iter()
            .filter(|d| state.nodes.get(d).is_some_and(|n| n.is_deleted))
            .collect();
        targets.push(id);

        let doomed: HashSet<NodeId> = targets.iter().copied().collect();
        state.grants.retain(|(node, _), _| !doomed.contains(node));
        state.class_grants.retain(|_, g| !doomed.contains(&g.node_id));

        Ok(targets
            .into_iter()
            .filter_map(|target| state.nodes.remove(&target))
            .collect())
    }

    async fn list_trashed(&self, owner: UserId) -> AppResult<Vec<Node>> {
        let state = self.state.read().await;
        let mut nodes: Vec<Node> = state
            .nodes
            .values()
            .filter(|n| n.owner_id == owner && state.is_trash_root(n))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(nodes)
    }

    async fn find_trashed_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Node>> {
        let state = self.state.read().await;
        let mut nodes: Vec<Node> = state
            .nodes
            .values()
            .filter(|n| state.is_trash_root(n) && n.deleted_at.is_some_and(|at| at < cutoff))
            .cloned()
            .collect();
        nodes.sort_by_key(|n| n.deleted_at);
        Ok(nodes)
    }

    async fn search_owned(
        &self,
        owner: UserId,
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<Node>> {
        let needle = query.to_lowercase();
        let state = self.state.read().await;
        let hits = state
            .nodes
            .values()
            .filter(|n| n.owner_id == owner && n.is_active() && matches_query(n, &needle))
            .cloned()
            .collect();
        Ok(sorted_limited(hits, limit))
    }

    async fn search_within(
        &self,
        roots: &[NodeId],
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<Node>> {
        let needle = query.to_lowercase();
        let roots: HashSet<NodeId> = roots.iter().copied().collect();
        let state = self.state.read().await;
        let hits = state
            .nodes
            .values()
            .filter(|n| {
                n.is_active()
                    && (roots.contains(&n.id)
                        || n.path.ancestor_ids().iter().any(|a| roots.contains(a)))
                    && matches_query(n, &needle)
            })
            .cloned()
            .collect();
        Ok(sorted_limited(hits, limit))
    }

    async fn set_public_share(
        &self,
        id: NodeId,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<Node> {
        let mut state = self.state.write().await;
        let taken = state.nodes.values().any(|n| {
            n.id != id
                && n.public_share.share_active
                && n.public_share.share_code.as_deref() == Some(code)
        });
        if taken {
            return Err(AppError::conflict("Public code already in use"));
        }
        let node = state.node_mut(id)?;
        node.public_share.share_code = Some(code.to_string());
        node.public_share.share_active = true;
        node.public_share.share_expires_at = Some(expires_at);
        node.updated_at = Utc::now();
        Ok(node.clone())
    }

    async fn deactivate_public_share(&self, id: NodeId) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let node = state.node_mut(id)?;
        let was_active = node.public_share.share_active;
        node.public_share.share_active = false;
        Ok(was_active)
    }

    async fn find_by_public_code(&self, code: &str) -> AppResult<Option<Node>> {
        let state = self.state.read().await;
        Ok(state
            .nodes
            .values()
            .find(|n| {
                n.public_share.share_active && n.public_share.share_code.as_deref() == Some(code)
            })
            .cloned())
    }

    async fn record_public_access(&self, id: NodeId, at: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.write().await;
        let node = state.node_mut(id)?;
        node.download_count += 1;
        node.last_accessed_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl GrantRepository for MemoryStore {
    async fn find_active_for_user(
        &self,
        node_ids: &[NodeId],
        user: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ShareGrant>> {
        let state = self.state.read().await;
        Ok(node_ids
            .iter()
            .filter_map(|node| state.grants.get(&(*node, user)))
            .filter(|g| g.is_active(now))
            .cloned()
            .collect())
    }

    async fn list_for_node(&self, node: NodeId) -> AppResult<Vec<ShareGrant>> {
        let state = self.state.read().await;
        let mut grants: Vec<ShareGrant> = state
            .grants
            .values()
            .filter(|g| g.node_id == node)
            .cloned()
            .collect();
        grants.sort_by_key(|g| g.created_at);
        Ok(grants)
    }

    async fn list_for_grantee(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ShareGrant>> {
        let state = self.state.read().await;
        let mut grants: Vec<ShareGrant> = state
            .grants
            .values()
            .filter(|g| g.grantee_id == user && g.is_active(now))
            .cloned()
            .collect();
        grants.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(grants)
    }

    async fn create(&self, grant: NewShareGrant) -> AppResult<ShareGrant> {
        let mut state = self.state.write().await;
        let key = (grant.node_id, grant.grantee_id);
        if state.grants.contains_key(&key) {
            return Err(AppError::conflict("Node is already shared with this user"));
        }
        let row = grant.into_grant(Utc::now());
        state.grants.insert(key, row.clone());
        Ok(row)
    }

    async fn delete(&self, node: NodeId, grantee: UserId) -> AppResult<bool> {
        Ok(self
            .state
            .write()
            .await
            .grants
            .remove(&(node, grantee))
            .is_some())
    }

    async fn delete_for_grantee(&self, node_ids: &[NodeId], grantee: UserId) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let removed = node_ids
            .iter()
            .filter(|node| state.grants.remove(&(**node, grantee)).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn find_active_class(
        &self,
        node_ids: &[NodeId],
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ClassShareGrant>> {
        let targets: HashSet<NodeId> = node_ids.iter().copied().collect();
        let state = self.state.read().await;
        Ok(state
            .class_grants
            .values()
            .filter(|g| targets.contains(&g.node_id) && g.is_active(now))
            .cloned()
            .collect())
    }

    async fn list_class_matching(
        &self,
        cohort: &Cohort,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ClassShareGrant>> {
        let state = self.state.read().await;
        let mut grants: Vec<ClassShareGrant> = state
            .class_grants
            .values()
            .filter(|g| g.admits(cohort, now))
            .cloned()
            .collect();
        grants.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(grants)
    }

    async fn list_class_for_node(&self, node: NodeId) -> AppResult<Vec<ClassShareGrant>> {
        let state = self.state.read().await;
        let mut grants: Vec<ClassShareGrant> = state
            .class_grants
            .values()
            .filter(|g| g.node_id == node)
            .cloned()
            .collect();
        grants.sort_by_key(|g| g.created_at);
        Ok(grants)
    }

    async fn find_class(&self, id: ClassGrantId) -> AppResult<Option<ClassShareGrant>> {
        Ok(self.state.read().await.class_grants.get(&id).cloned())
    }

    async fn create_class(&self, grant: NewClassShareGrant) -> AppResult<ClassShareGrant> {
        let row = grant.into_grant(Utc::now());
        self.state
            .write()
            .await
            .class_grants
            .insert(row.id, row.clone());
        Ok(row)
    }

    async fn delete_class(&self, id: ClassGrantId) -> AppResult<bool> {
        Ok(self.state.write().await.class_grants.remove(&id).is_some())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let before = state.grants.len() + state.class_grants.len();
        state.grants.retain(|_, g| g.is_active(now));
        state.class_grants.retain(|_, g| g.is_active(now));
        let after = state.grants.len() + state.class_grants.len();
        Ok((before - after) as u64)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_profile(&self, id: UserId) -> AppResult<Option<UserProfile>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn upsert_profile(&self, profile: UserProfile) -> AppResult<UserProfile> {
        self.state
            .write()
            .await
            .users
            .insert(profile.id, profile.clone());
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use canopy_core::error::ErrorKind;

    use super::*;

    async fn folder(store: &MemoryStore, owner: UserId, name: &str, parent: Option<&Node>) -> Node {
        let path = MaterializedPath::build(parent);
        store
            .insert(NewNode::folder(owner, name, parent.map(|p| p.id), path))
            .await
            .expect("insert folder")
    }

    #[tokio::test]
    async fn test_insert_rejects_active_sibling_name() {
        let store = MemoryStore::new();
        let owner = UserId::new();
        folder(&store, owner, "Docs", None).await;

        let err = store
            .insert(NewNode::folder(owner, "Docs", None, MaterializedPath::root()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        // Other owners have their own root.
        folder(&store, UserId::new(), "Docs", None).await;
    }

    #[tokio::test]
    async fn test_move_rewrites_exactly_the_subtree() {
        let store = MemoryStore::new();
        let owner = UserId::new();
        let a = folder(&store, owner, "a", None).await;
        let b = folder(&store, owner, "b", Some(&a)).await;
        let c = folder(&store, owner, "c", Some(&b)).await;
        let other = folder(&store, owner, "other", None).await;
        let bystander = folder(&store, owner, "bystander", Some(&a)).await;

        let rewritten = store
            .move_subtree(b.id, Some(other.id), &other.subtree_prefix())
            .await
            .expect("move");
        assert_eq!(rewritten, 1);

        let c = store.find_by_id(c.id).await.unwrap().unwrap();
        assert_eq!(c.path.ancestor_ids(), &[other.id, b.id]);
        let bystander_after = store.find_by_id(bystander.id).await.unwrap().unwrap();
        assert_eq!(bystander_after.path, bystander.path);
    }

    #[tokio::test]
    async fn test_soft_delete_is_idempotent_and_restore_uses_stamp() {
        let store = MemoryStore::new();
        let owner = UserId::new();
        let a = folder(&store, owner, "a", None).await;
        let b = folder(&store, owner, "b", Some(&a)).await;
        let early = folder(&store, owner, "early", Some(&a)).await;

        let earlier = Utc::now() - chrono::Duration::minutes(5);
        assert_eq!(store.soft_delete_subtree(early.id, owner, earlier).await.unwrap(), 1);
        assert_eq!(store.soft_delete_subtree(a.id, owner, Utc::now()).await.unwrap(), 2);
        assert_eq!(store.soft_delete_subtree(a.id, owner, Utc::now()).await.unwrap(), 0);

        assert_eq!(store.restore_subtree(a.id, false).await.unwrap(), 2);
        assert!(store.find_by_id(b.id).await.unwrap().unwrap().is_active());
        assert!(store.find_by_id(early.id).await.unwrap().unwrap().is_deleted);
        assert_eq!(store.restore_subtree(a.id, false).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_trash_roots_skip_cascaded_children() {
        let store = MemoryStore::new();
        let owner = UserId::new();
        let a = folder(&store, owner, "a", None).await;
        folder(&store, owner, "b", Some(&a)).await;
        store.soft_delete_subtree(a.id, owner, Utc::now()).await.unwrap();

        let trashed = store.list_trashed(owner).await.unwrap();
        assert_eq!(trashed.len(), 1);
        assert_eq!(trashed[0].id, a.id);
    }

    #[tokio::test]
    async fn test_purge_removes_rows_and_grants() {
        let store = MemoryStore::new();
        let owner = UserId::new();
        let a = folder(&store, owner, "a", None).await;
        let b = folder(&store, owner, "b", Some(&a)).await;
        GrantRepository::create(
            &store,
            NewShareGrant {
                node_id: b.id,
                grantee_id: UserId::new(),
                granted_by: owner,
                expires_at: None,
            },
        )
        .await
        .unwrap();

        assert!(store.purge_subtree(a.id).await.unwrap().is_empty());

        store.soft_delete_subtree(a.id, owner, Utc::now()).await.unwrap();
        let removed = store.purge_subtree(a.id).await.unwrap();
        assert_eq!(removed.len(), 2);
        assert!(store.list_for_node(b.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_skips_a_subtree_restored_after_selection() {
        let store = MemoryStore::new();
        let owner = UserId::new();
        let a = folder(&store, owner, "a", None).await;
        let b = folder(&store, owner, "b", Some(&a)).await;
        store.soft_delete_subtree(a.id, owner, Utc::now()).await.unwrap();

        let due = store
            .find_trashed_before(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        store.restore_subtree(a.id, false).await.unwrap();

        assert!(store.purge_subtree(due[0].id).await.unwrap().is_empty());
        assert!(store.find_by_id(a.id).await.unwrap().is_some());
        assert!(store.find_by_id(b.id).await.unwrap().is_some());
    }
}
