//! Materialized ancestor paths.
//!
//! A node's path is the ordered list of its ancestor ids, root first. The
//! root level has an empty path and a child's path is always its parent's
//! path with the parent's id appended. Prefix tests compare whole ids, so
//! two siblings whose ids share leading characters can never be mistaken
//! for ancestor and descendant.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use canopy_core::types::NodeId;

use super::model::Node;

/// Ordered list of ancestor node ids, root first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterializedPath(Vec<NodeId>);

impl MaterializedPath {
    /// The path of a top-level node.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Wrap an explicit ancestor list.
    pub fn from_ids(ids: Vec<NodeId>) -> Self {
        Self(ids)
    }

    /// Path for a new node placed under `parent`, or at the root level.
    pub fn build(parent: Option<&Node>) -> Self {
        match parent {
            Some(parent) => Self::child_of(&parent.path, parent.id),
            None => Self::root(),
        }
    }

    /// `parent_path` with `parent_id` appended.
    pub fn child_of(parent_path: &MaterializedPath, parent_id: NodeId) -> Self {
        let mut ids = Vec::with_capacity(parent_path.0.len() + 1);
        ids.extend_from_slice(&parent_path.0);
        ids.push(parent_id);
        Self(ids)
    }

    /// Ancestor ids, root first.
    pub fn ancestor_ids(&self) -> &[NodeId] {
        &self.0
    }

    /// The immediate parent, if any.
    pub fn parent_id(&self) -> Option<NodeId> {
        self.0.last().copied()
    }

    /// Number of ancestors. Top-level nodes have depth zero.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Whether a folder with this path respects `max_depth`.
    pub fn is_valid_depth(&self, max_depth: usize) -> bool {
        self.depth() < max_depth
    }

    /// Whether `id` appears among the ancestors.
    pub fn contains(&self, id: NodeId) -> bool {
        self.0.contains(&id)
    }

    /// Whether this path begins with every id of `prefix`, in order.
    pub fn starts_with(&self, prefix: &MaterializedPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// True iff `node_path + [node_id]` has `ancestor_path + [ancestor_id]`
    /// as a prefix. A node counts as a descendant of itself.
    pub fn is_descendant(
        node_path: &MaterializedPath,
        node_id: NodeId,
        ancestor_path: &MaterializedPath,
        ancestor_id: NodeId,
    ) -> bool {
        let anchor = ancestor_path.0.len();
        if anchor > node_path.0.len() {
            return false;
        }
        if !node_path.starts_with(ancestor_path) {
            return false;
        }
        let at_anchor = node_path.0.get(anchor).copied().unwrap_or(node_id);
        at_anchor == ancestor_id
    }

    /// Replace `old_prefix` with `new_prefix`. Returns `None` when this
    /// path does not start with `old_prefix`.
    pub fn rewrite_prefix(
        &self,
        old_prefix: &MaterializedPath,
        new_prefix: &MaterializedPath,
    ) -> Option<Self> {
        if !self.starts_with(old_prefix) {
            return None;
        }
        let rest = &self.0[old_prefix.0.len()..];
        let mut ids = Vec::with_capacity(new_prefix.0.len() + rest.len());
        ids.extend_from_slice(&new_prefix.0);
        ids.extend_from_slice(rest);
        Some(Self(ids))
    }

    /// Raw UUIDs for array binds.
    pub fn to_uuids(&self) -> Vec<Uuid> {
        self.0.iter().map(|id| id.into_uuid()).collect()
    }
}

impl From<Vec<Uuid>> for MaterializedPath {
    fn from(ids: Vec<Uuid>) -> Self {
        Self(ids.into_iter().map(NodeId::from_uuid).collect())
    }
}

impl sqlx::Type<sqlx::Postgres> for MaterializedPath {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Vec<Uuid> as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Vec<Uuid> as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for MaterializedPath {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Vec<Uuid> as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.to_uuids(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for MaterializedPath {
    fn decode(
        value: <sqlx::Postgres as sqlx::Database>::ValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        <Vec<Uuid> as sqlx::Decode<'r, sqlx::Postgres>>::decode(value).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(len: usize) -> Vec<NodeId> {
        (0..len).map(|_| NodeId::new()).collect()
    }

    #[test]
    fn test_child_paths_round_trip_to_ancestor_list() {
        let ids = chain(4);
        let mut path = MaterializedPath::root();
        for id in &ids {
            path = MaterializedPath::child_of(&path, *id);
        }
        assert_eq!(path.ancestor_ids(), ids.as_slice());
        assert_eq!(path.depth(), 4);
        assert_eq!(path.parent_id(), ids.last().copied());
    }

    #[test]
    fn test_root_has_no_ancestors() {
        let root = MaterializedPath::root();
        assert_eq!(root.depth(), 0);
        assert!(root.ancestor_ids().is_empty());
        assert!(root.parent_id().is_none());
    }

    #[test]
    fn test_is_descendant_follows_chain() {
        let ids = chain(3);
        let a_path = MaterializedPath::root();
        let b_path = MaterializedPath::child_of(&a_path, ids[0]);
        let c_path = MaterializedPath::child_of(&b_path, ids[1]);

        assert!(MaterializedPath::is_descendant(&c_path, ids[2], &a_path, ids[0]));
        assert!(MaterializedPath::is_descendant(&c_path, ids[2], &b_path, ids[1]));
        assert!(MaterializedPath::is_descendant(&b_path, ids[1], &b_path, ids[1]));
        assert!(!MaterializedPath::is_descendant(&a_path, ids[0], &c_path, ids[2]));
    }

    #[test]
    fn test_sibling_is_not_descendant() {
        let parent = NodeId::new();
        let base = MaterializedPath::child_of(&MaterializedPath::root(), parent);
        let left = NodeId::new();
        let right = NodeId::new();
        let under_left = MaterializedPath::child_of(&base, left);

        assert!(!MaterializedPath::is_descendant(&base, right, &base, left));
        assert!(!MaterializedPath::is_descendant(&under_left, NodeId::new(), &base, right));
    }

    #[test]
    fn test_rewrite_prefix_swaps_only_prefix() {
        let ids = chain(5);
        let path = MaterializedPath::from_ids(ids[..4].to_vec());
        let old_prefix = MaterializedPath::from_ids(ids[..2].to_vec());
        let new_prefix = MaterializedPath::from_ids(vec![ids[4]]);

        let rewritten = path.rewrite_prefix(&old_prefix, &new_prefix).expect("prefixed");
        assert_eq!(rewritten.ancestor_ids(), &[ids[4], ids[2], ids[3]]);

        let unrelated = MaterializedPath::from_ids(vec![NodeId::new()]);
        assert!(path.rewrite_prefix(&unrelated, &new_prefix).is_none());
    }

    #[test]
    fn test_depth_limit_is_strict() {
        let path = MaterializedPath::from_ids(chain(2));
        assert!(!path.is_valid_depth(2));
        assert!(path.is_valid_depth(3));
        assert!(MaterializedPath::root().is_valid_depth(1));
    }
}
