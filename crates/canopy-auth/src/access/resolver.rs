//! Access resolution over the node store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::debug;

use canopy_core::error::AppError;
use canopy_core::result::AppResult;
use canopy_core::types::{NodeId, UserId};
use canopy_database::{GrantRepository, NodeRepository};
use canopy_entity::node::Node;
use canopy_entity::user::Requester;

use super::rules::{AccessRule, ClassGrantRule, OwnerRule, UserGrantRule};
use super::verdict::{AccessReason, AccessVerdict};

/// Runs the read-access rule chain and the owner-only write check.
///
/// Nothing is cached; each check reads the current grants.
#[derive(Clone)]
pub struct AccessResolver {
    nodes: Arc<dyn NodeRepository>,
    rules: Vec<Arc<dyn AccessRule>>,
}

impl std::fmt::Debug for AccessResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.rules.iter().map(|r| r.name()).collect();
        f.debug_struct("AccessResolver")
            .field("rules", &names)
            .finish()
    }
}

impl AccessResolver {
    /// Create a resolver with the standard chain: owner, user grant, class grant.
    pub fn new(nodes: Arc<dyn NodeRepository>, grants: Arc<dyn GrantRepository>) -> Self {
        let rules: Vec<Arc<dyn AccessRule>> = vec![
            Arc::new(OwnerRule),
            Arc::new(UserGrantRule::new(grants.clone())),
            Arc::new(ClassGrantRule::new(grants)),
        ];
        Self::with_rules(nodes, rules)
    }

    /// Create a resolver with a custom rule chain.
    pub fn with_rules(nodes: Arc<dyn NodeRepository>, rules: Vec<Arc<dyn AccessRule>>) -> Self {
        Self { nodes, rules }
    }

    /// Read-access verdict for `node_id`.
    pub async fn check_read_access(
        &self,
        node_id: NodeId,
        requester: &Requester,
    ) -> AppResult<AccessVerdict> {
        let node = self.nodes.find_by_id(node_id).await?;
        self.verdict_for(node.as_ref(), requester, Utc::now()).await
    }

    /// Read-access verdict for a node already loaded by the caller.
    pub async fn evaluate(&self, node: &Node, requester: &Requester) -> AppResult<AccessVerdict> {
        self.verdict_for(Some(node), requester, Utc::now()).await
    }

    /// Write access: only the owner of an active node.
    pub async fn check_write_access(
        &self,
        node_id: NodeId,
        requester_id: UserId,
    ) -> AppResult<AccessVerdict> {
        let node = self.nodes.find_by_id(node_id).await?;
        Ok(write_verdict(node.as_ref(), requester_id))
    }

    /// Per-id read verdicts. Every id is evaluated, in input order.
    pub async fn check_read_access_bulk(
        &self,
        node_ids: &[NodeId],
        requester: &Requester,
    ) -> AppResult<Vec<(NodeId, AccessVerdict)>> {
        let now = Utc::now();
        let found: HashMap<NodeId, Node> = self
            .nodes
            .find_many(node_ids)
            .await?
            .into_iter()
            .map(|n| (n.id, n))
            .collect();

        let checks = node_ids.iter().map(|id| {
            let node = found.get(id);
            async move { (*id, self.verdict_for(node, requester, now).await) }
        });

        join_all(checks)
            .await
            .into_iter()
            .map(|(id, verdict)| verdict.map(|v| (id, v)))
            .collect()
    }

    /// Load `node_id` for reading, or fail with `NotFound` / `Forbidden`.
    pub async fn require_read(&self, node_id: NodeId, requester: &Requester) -> AppResult<Node> {
        let node = self.nodes.find_by_id(node_id).await?;
        let verdict = self.verdict_for(node.as_ref(), requester, Utc::now()).await?;
        match node {
            Some(node) if verdict.granted => Ok(node),
            _ => Err(denial(verdict)),
        }
    }

    /// Load an active node owned by `owner`, or fail with `NotFound` / `Forbidden`.
    pub async fn require_owner(&self, node_id: NodeId, owner: UserId) -> AppResult<Node> {
        let node = self.nodes.find_by_id(node_id).await?;
        let verdict = write_verdict(node.as_ref(), owner);
        match node {
            Some(node) if verdict.granted => Ok(node),
            _ => Err(denial(verdict)),
        }
    }

    /// Load a node owned by `owner` whether or not it is in the trash.
    pub async fn require_owner_including_trashed(
        &self,
        node_id: NodeId,
        owner: UserId,
    ) -> AppResult<Node> {
        let node = self
            .nodes
            .find_by_id(node_id)
            .await?
            .ok_or_else(|| AppError::not_found("Node not found"))?;
        if !node.is_owned_by(owner) {
            return Err(AppError::forbidden("Only the owner can modify this item"));
        }
        Ok(node)
    }

    async fn verdict_for(
        &self,
        node: Option<&Node>,
        requester: &Requester,
        now: DateTime<Utc>,
    ) -> AppResult<AccessVerdict> {
        let Some(node) = node else {
            return Ok(AccessVerdict::denied(AccessReason::NotFound));
        };
        if node.is_deleted {
            return Ok(AccessVerdict::denied(AccessReason::Deleted));
        }

        for rule in &self.rules {
            if let Some(reason) = rule.evaluate(node, requester, now).await? {
                debug!(
                    node_id = %node.id,
                    user_id = %requester.user_id,
                    rule = rule.name(),
                    "Read access granted"
                );
                return Ok(AccessVerdict::granted(reason));
            }
        }

        debug!(node_id = %node.id, user_id = %requester.user_id, "Read access denied");
        Ok(AccessVerdict::denied(AccessReason::NoAccess))
    }
}

fn write_verdict(node: Option<&Node>, requester_id: UserId) -> AccessVerdict {
    match node {
        None => AccessVerdict::denied(AccessReason::NotFound),
        Some(n) if n.is_deleted => AccessVerdict::denied(AccessReason::Deleted),
        Some(n) if n.is_owned_by(requester_id) => AccessVerdict::granted(AccessReason::Owner),
        Some(_) => AccessVerdict::denied(AccessReason::NoAccess),
    }
}

fn denial(verdict: AccessVerdict) -> AppError {
    match verdict.reason {
        AccessReason::NotFound | AccessReason::Deleted => AppError::not_found("Node not found"),
        _ => AppError::forbidden("You do not have access to this item"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use canopy_core::error::ErrorKind;
    use canopy_database::MemoryStore;
    use canopy_entity::grant::{CohortTarget, NewClassShareGrant, NewShareGrant};
    use canopy_entity::node::{MaterializedPath, NewNode};
    use canopy_entity::user::{Cohort, StaffRole};

    use super::*;

    struct Fixture {
        store: Arc<MemoryStore>,
        resolver: AccessResolver,
        owner: UserId,
        folder: Node,
        file: Node,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let resolver = AccessResolver::new(store.clone(), store.clone());
        let owner = UserId::new();

        let folder = store
            .insert(NewNode::folder(owner, "Notes", None, MaterializedPath::root()))
            .await
            .unwrap();
        let file = store
            .insert(NewNode {
                owner_id: owner,
                name: "week1.pdf".into(),
                is_folder: false,
                parent_id: Some(folder.id),
                path: folder.subtree_prefix(),
                size_bytes: 10,
                content_ref: Some("ab/week1".into()),
                mime_type: Some("application/pdf".into()),
            })
            .await
            .unwrap();

        Fixture {
            store,
            resolver,
            owner,
            folder,
            file,
        }
    }

    fn member(user_id: UserId) -> Requester {
        Requester::staff(user_id, StaffRole::Member)
    }

    fn cohort(section: &str) -> Cohort {
        Cohort {
            batch: "2024".into(),
            semester: 3,
            section: section.into(),
        }
    }

    #[tokio::test]
    async fn test_owner_is_granted() {
        let f = fixture().await;
        let verdict = f
            .resolver
            .check_read_access(f.file.id, &member(f.owner))
            .await
            .unwrap();
        assert_eq!(verdict, AccessVerdict::granted(AccessReason::Owner));
    }

    #[tokio::test]
    async fn test_folder_grant_is_inherited_and_revocable() {
        let f = fixture().await;
        let friend = UserId::new();
        f.store
            .create(NewShareGrant {
                node_id: f.folder.id,
                grantee_id: friend,
                granted_by: f.owner,
                expires_at: None,
            })
            .await
            .unwrap();

        let on_folder = f
            .resolver
            .check_read_access(f.folder.id, &member(friend))
            .await
            .unwrap();
        assert_eq!(on_folder.reason, AccessReason::Direct);

        let on_file = f
            .resolver
            .check_read_access(f.file.id, &member(friend))
            .await
            .unwrap();
        assert_eq!(on_file, AccessVerdict::granted(AccessReason::Inherited));

        f.store.delete(f.folder.id, friend).await.unwrap();
        let after = f
            .resolver
            .check_read_access(f.file.id, &member(friend))
            .await
            .unwrap();
        assert_eq!(after, AccessVerdict::denied(AccessReason::NoAccess));
    }

    #[tokio::test]
    async fn test_expired_grant_is_ignored() {
        let f = fixture().await;
        let friend = UserId::new();
        f.store
            .create(NewShareGrant {
                node_id: f.file.id,
                grantee_id: friend,
                granted_by: f.owner,
                expires_at: Some(Utc::now() - Duration::minutes(1)),
            })
            .await
            .unwrap();

        let verdict = f
            .resolver
            .check_read_access(f.file.id, &member(friend))
            .await
            .unwrap();
        assert!(!verdict.granted);
    }

    #[tokio::test]
    async fn test_class_grant_matches_cohort() {
        let f = fixture().await;
        f.store
            .create_class(NewClassShareGrant {
                node_id: f.folder.id,
                target: CohortTarget {
                    batch: "2024".into(),
                    semester: 3,
                    section: Some("A".into()),
                },
                subject_id: None,
                granted_by: f.owner,
                expires_at: None,
            })
            .await
            .unwrap();

        let in_class = Requester::student(UserId::new(), cohort("a"));
        let verdict = f
            .resolver
            .check_read_access(f.file.id, &in_class)
            .await
            .unwrap();
        assert_eq!(verdict, AccessVerdict::granted(AccessReason::Class));

        let other_section = Requester::student(UserId::new(), cohort("B"));
        let verdict = f
            .resolver
            .check_read_access(f.file.id, &other_section)
            .await
            .unwrap();
        assert!(!verdict.granted);
    }

    #[tokio::test]
    async fn test_missing_and_trashed_nodes() {
        let f = fixture().await;
        let owner = member(f.owner);

        let missing = f
            .resolver
            .check_read_access(NodeId::new(), &owner)
            .await
            .unwrap();
        assert_eq!(missing.reason, AccessReason::NotFound);

        f.store
            .soft_delete_subtree(f.file.id, f.owner, Utc::now())
            .await
            .unwrap();
        let trashed = f
            .resolver
            .check_read_access(f.file.id, &owner)
            .await
            .unwrap();
        assert_eq!(trashed, AccessVerdict::denied(AccessReason::Deleted));

        let err = f.resolver.require_read(f.file.id, &owner).await.unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_write_access_is_never_inherited() {
        let f = fixture().await;
        let friend = UserId::new();
        f.store
            .create(NewShareGrant {
                node_id: f.folder.id,
                grantee_id: friend,
                granted_by: f.owner,
                expires_at: None,
            })
            .await
            .unwrap();

        let verdict = f
            .resolver
            .check_write_access(f.file.id, friend)
            .await
            .unwrap();
        assert_eq!(verdict, AccessVerdict::denied(AccessReason::NoAccess));

        let err = f.resolver.require_owner(f.file.id, friend).await.unwrap_err();
        assert!(err.is(ErrorKind::Forbidden));
    }

    #[tokio::test]
    async fn test_bulk_evaluates_every_id() {
        let f = fixture().await;
        let stranger = member(UserId::new());
        let missing = NodeId::new();

        let verdicts = f
            .resolver
            .check_read_access_bulk(&[f.folder.id, missing, f.file.id], &stranger)
            .await
            .unwrap();

        assert_eq!(verdicts.len(), 3);
        assert_eq!(verdicts[0].1.reason, AccessReason::NoAccess);
        assert_eq!(verdicts[1], (missing, AccessVerdict::denied(AccessReason::NotFound)));
        assert_eq!(verdicts[2].0, f.file.id);
    }
}
