//! Signed download and preview URLs with per-requester caching.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use canopy_auth::AccessResolver;
use canopy_cache::keys::{self, UrlKind};
use canopy_core::config::CacheConfig;
use canopy_core::error::AppError;
use canopy_core::result::AppResult;
use canopy_core::traits::{BlobStore, CacheProvider, SignedUrl};
use canopy_core::types::NodeId;
use canopy_entity::user::Requester;

/// Issues signed URLs for readable files.
///
/// A URL is cached per (node, requester, kind) until shortly before it
/// expires, so repeated requests reuse one signature.
#[derive(Debug, Clone)]
pub struct DownloadService {
    resolver: Arc<AccessResolver>,
    blobs: Arc<dyn BlobStore>,
    cache: Arc<dyn CacheProvider>,
    safety_margin: chrono::Duration,
}

impl DownloadService {
    /// Creates a new download service.
    pub fn new(
        resolver: Arc<AccessResolver>,
        blobs: Arc<dyn BlobStore>,
        cache: Arc<dyn CacheProvider>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            resolver,
            blobs,
            cache,
            safety_margin: chrono::Duration::seconds(config.url_safety_margin_seconds as i64),
        }
    }

    /// Attachment URL for a readable file.
    pub async fn get_download_url(
        &self,
        node_id: NodeId,
        requester: &Requester,
    ) -> AppResult<SignedUrl> {
        self.signed_url(node_id, requester, UrlKind::Download).await
    }

    /// Inline preview URL for a readable file.
    pub async fn get_preview_url(
        &self,
        node_id: NodeId,
        requester: &Requester,
    ) -> AppResult<SignedUrl> {
        self.signed_url(node_id, requester, UrlKind::Preview).await
    }

    async fn signed_url(
        &self,
        node_id: NodeId,
        requester: &Requester,
        kind: UrlKind,
    ) -> AppResult<SignedUrl> {
        let node = self.resolver.require_read(node_id, requester).await?;
        if node.is_folder {
            return Err(AppError::invalid_argument(
                "Folders have no content; export them instead",
            ));
        }
        let content_ref = node
            .content_ref
            .as_deref()
            .ok_or_else(|| AppError::not_found("File content not found"))?;

        let key = keys::signed_url(node.id.into_uuid(), requester.user_id.into_uuid(), kind);
        if let Some(cached) = self.cached(&key).await {
            debug!(node_id = %node.id, kind = %kind, "Signed URL cache hit");
            return Ok(cached);
        }

        let url = match kind {
            UrlKind::Download => self.blobs.download_url(content_ref, &node.name).await?,
            UrlKind::Preview => self.blobs.preview_url(content_ref).await?,
        };

        let ttl = url.expires_at - Utc::now() - self.safety_margin;
        if let Ok(ttl) = ttl.to_std() {
            if !ttl.is_zero() {
                self.store(&key, &url, ttl).await;
            }
        }

        Ok(url)
    }

    /// Cache failures only cost a fresh signature.
    async fn cached(&self, key: &str) -> Option<SignedUrl> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Signed URL cache read failed");
                None
            }
        }
    }

    async fn store(&self, key: &str, url: &SignedUrl, ttl: Duration) {
        let raw = match serde_json::to_string(url) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode signed URL");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, &raw, ttl).await {
            warn!(key = %key, error = %e, "Signed URL cache write failed");
        }
    }
}
