//! Name search over owned and shared nodes.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use canopy_core::config::SearchConfig;
use canopy_core::result::AppResult;
use canopy_core::types::NodeId;
use canopy_database::{GrantRepository, NodeRepository};
use canopy_entity::node::Node;
use canopy_entity::user::Requester;

/// Case-insensitive substring search over node names.
#[derive(Debug, Clone)]
pub struct SearchService {
    nodes: Arc<dyn NodeRepository>,
    grants: Arc<dyn GrantRepository>,
    max_results: usize,
}

impl SearchService {
    /// Creates a new search service.
    pub fn new(
        nodes: Arc<dyn NodeRepository>,
        grants: Arc<dyn GrantRepository>,
        config: &SearchConfig,
    ) -> Self {
        Self {
            nodes,
            grants,
            max_results: config.max_results,
        }
    }

    /// Own nodes first, then nodes reachable through unexpired grants.
    pub async fn search(&self, requester: &Requester, query: &str) -> AppResult<Vec<Node>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = self
            .nodes
            .search_owned(requester.user_id, query, self.max_results)
            .await?;

        let roots = self.shared_roots(requester).await?;
        if !roots.is_empty() && results.len() < self.max_results {
            let mut seen: HashSet<NodeId> = results.iter().map(|n| n.id).collect();
            let shared = self
                .nodes
                .search_within(&roots, query, self.max_results)
                .await?;
            results.extend(shared.into_iter().filter(|n| seen.insert(n.id)));
        }

        results.truncate(self.max_results);
        Ok(results)
    }

    async fn shared_roots(&self, requester: &Requester) -> AppResult<Vec<NodeId>> {
        let now = Utc::now();
        let mut roots: Vec<NodeId> = self
            .grants
            .list_for_grantee(requester.user_id, now)
            .await?
            .into_iter()
            .map(|g| g.node_id)
            .collect();

        if let Some(cohort) = requester.cohort() {
            roots.extend(
                self.grants
                    .list_class_matching(cohort, now)
                    .await?
                    .into_iter()
                    .map(|g| g.node_id),
            );
        }

        roots.sort();
        roots.dedup();
        Ok(roots)
    }
}
