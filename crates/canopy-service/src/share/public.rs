//! Unauthenticated, time-limited public links to files.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use canopy_auth::AccessResolver;
use canopy_core::config::ShareConfig;
use canopy_core::error::{AppError, ErrorKind};
use canopy_core::result::AppResult;
use canopy_core::traits::BlobStore;
use canopy_core::types::{NodeId, UserId};
use canopy_database::NodeRepository;

use super::link::{LinkDuration, ShareCodeGenerator};
use crate::dto::{PublicLink, PublicLinkMeta, ResolvedLink};

/// Message for every public link failure, so callers cannot tell codes apart.
const INVALID_LINK: &str = "Invalid or expired link";

/// Issues, revokes, and resolves public links.
#[derive(Debug, Clone)]
pub struct PublicLinkService {
    nodes: Arc<dyn NodeRepository>,
    resolver: Arc<AccessResolver>,
    blobs: Arc<dyn BlobStore>,
    codes: ShareCodeGenerator,
    max_code_attempts: u32,
}

impl PublicLinkService {
    /// Creates a new public link service.
    pub fn new(
        nodes: Arc<dyn NodeRepository>,
        resolver: Arc<AccessResolver>,
        blobs: Arc<dyn BlobStore>,
        config: &ShareConfig,
    ) -> Self {
        Self {
            nodes,
            resolver,
            blobs,
            codes: ShareCodeGenerator::new(config.code_length),
            max_code_attempts: config.max_code_attempts.max(1),
        }
    }

    /// Issues a fresh code for an owned file, replacing any earlier one.
    pub async fn create_public_link(
        &self,
        node_id: NodeId,
        owner: UserId,
        duration: LinkDuration,
    ) -> AppResult<PublicLink> {
        let node = self.resolver.require_owner(node_id, owner).await?;
        if node.is_folder {
            return Err(AppError::invalid_argument("Only files can be shared by public link"));
        }

        let expires_at = Utc::now() + duration.as_duration();
        for attempt in 1..=self.max_code_attempts {
            let code = self.codes.generate();
            match self.nodes.set_public_share(node_id, &code, expires_at).await {
                Ok(_) => {
                    info!(
                        user_id = %owner,
                        node_id = %node_id,
                        duration = %duration,
                        "Public link created"
                    );
                    return Ok(PublicLink { code, expires_at });
                }
                Err(e) if e.is(ErrorKind::Conflict) => {
                    debug!(node_id = %node_id, attempt, "Share code collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::conflict(
            "Could not allocate a unique share code, try again",
        ))
    }

    /// Deactivates the node's public link. Revoking twice is not an error.
    pub async fn revoke_public_link(&self, node_id: NodeId, owner: UserId) -> AppResult<()> {
        self.resolver
            .require_owner_including_trashed(node_id, owner)
            .await?;

        if self.nodes.deactivate_public_share(node_id).await? {
            info!(user_id = %owner, node_id = %node_id, "Public link revoked");
        }
        Ok(())
    }

    /// Resolves a code to a download URL, counting the access.
    pub async fn resolve_public_link(&self, code: &str) -> AppResult<ResolvedLink> {
        let invalid = || AppError::not_found(INVALID_LINK);
        let now = Utc::now();

        let code = code.trim();
        if code.is_empty() {
            return Err(invalid());
        }

        let node = self
            .nodes
            .find_by_public_code(code)
            .await?
            .ok_or_else(invalid)?;

        if node.is_deleted || node.is_folder || !node.public_share.is_live(now) {
            return Err(invalid());
        }
        if node.public_share.share_code.as_deref() != Some(code) {
            return Err(invalid());
        }
        let content_ref = node.content_ref.as_deref().ok_or_else(invalid)?;

        let url = self
            .blobs
            .download_url(content_ref, &node.name)
            .await
            .map_err(|e| {
                if e.is(ErrorKind::NotFound) || e.is(ErrorKind::Forbidden) {
                    invalid()
                } else {
                    e
                }
            })?;

        self.nodes.record_public_access(node.id, now).await?;
        debug!(node_id = %node.id, "Public link resolved");

        Ok(ResolvedLink {
            url: url.url,
            url_expires_at: url.expires_at,
            meta: PublicLinkMeta {
                name: node.name,
                size_bytes: node.size_bytes,
                mime_type: node.mime_type,
            },
        })
    }
}
