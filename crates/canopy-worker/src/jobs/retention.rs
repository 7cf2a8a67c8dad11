//! Trash retention: purge old trash and expired grants.

use std::sync::Arc;

use tracing::{error, info};

use canopy_core::config::TrashConfig;
use canopy_core::result::AppResult;
use canopy_service::TrashService;
use canopy_service::dto::SweepReport;

/// Purges trash older than the retention window for every owner.
#[derive(Debug, Clone)]
pub struct RetentionJob {
    /// Trash service doing the purging
    trash: Arc<TrashService>,
    /// Age in days after which trashed items are purged
    max_age_days: i64,
}

impl RetentionJob {
    /// Create a retention job from the trash configuration
    pub fn new(trash: Arc<TrashService>, config: &TrashConfig) -> Self {
        Self::with_max_age(trash, config.retention_days)
    }

    /// Create a retention job with an explicit window
    pub fn with_max_age(trash: Arc<TrashService>, max_age_days: i64) -> Self {
        Self {
            trash,
            max_age_days,
        }
    }

    /// Run one sweep
    pub async fn run(&self) -> AppResult<SweepReport> {
        info!(max_age_days = self.max_age_days, "Running trash retention sweep");
        self.trash.retention_sweep(self.max_age_days).await
    }

    /// Run one sweep from the scheduler, logging instead of returning errors
    pub async fn run_scheduled(&self) {
        if let Err(e) = self.run().await {
            error!(error = %e, "Trash retention sweep failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use canopy_cache::CacheManager;
    use canopy_cache::memory::MemoryCacheProvider;
    use canopy_core::config::AppConfig;
    use canopy_core::types::UserId;
    use canopy_database::{MemoryStore, NodeRepository, NodeStore};
    use canopy_service::{CanopyServices, UploadFile};
    use canopy_storage::MemoryBlobStore;

    use super::*;

    #[tokio::test]
    async fn test_sweep_purges_expired_trash_only() {
        let config = AppConfig::default();
        let store = Arc::new(MemoryStore::new());
        let services = CanopyServices::assemble(
            &config,
            NodeStore::memory(store.clone()),
            Arc::new(MemoryBlobStore::new(&config.storage)),
            Arc::new(CacheManager::from_provider(Arc::new(
                MemoryCacheProvider::new(&config.cache.memory),
            ))),
        );
        let owner = UserId::new();
        let uploaded = services
            .uploads
            .register_upload(
                vec![UploadFile {
                    name: "old.txt".into(),
                    content_type: None,
                    data: Bytes::from_static(b"old"),
                }],
                owner,
                None,
            )
            .await
            .unwrap();
        let file = &uploaded[0];
        services.trash.soft_delete(file.id, owner).await.unwrap();

        let keep = RetentionJob::new(services.trash.clone(), &config.trash);
        assert_eq!(keep.run().await.unwrap().purged_roots, 0);
        assert!(store.find_by_id(file.id).await.unwrap().is_some());

        let sweep = RetentionJob::with_max_age(services.trash.clone(), 0);
        let report = sweep.run().await.unwrap();
        assert_eq!(report.purged_roots, 1);
        assert_eq!(report.purge.blobs_deleted, 1);
        assert!(store.find_by_id(file.id).await.unwrap().is_none());
    }
}
