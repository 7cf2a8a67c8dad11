//! Construction of the configured blob store.

use std::sync::Arc;

use tracing::info;

use canopy_core::config::StorageConfig;
use canopy_core::error::AppError;
use canopy_core::result::AppResult;
use canopy_core::traits::BlobStore;

use crate::providers::{LocalBlobStore, MemoryBlobStore};

/// Build the blob store selected by `config.provider`.
pub async fn build_blob_store(config: &StorageConfig) -> AppResult<Arc<dyn BlobStore>> {
    match config.provider.as_str() {
        "local" => {
            info!(root = %config.root_path, "Initializing local blob store");
            Ok(Arc::new(LocalBlobStore::new(config).await?))
        }
        "memory" => {
            info!("Initializing in-memory blob store");
            Ok(Arc::new(MemoryBlobStore::new(config)))
        }
        other => Err(AppError::configuration(format!(
            "Unknown storage provider: '{other}'. Supported: local, memory"
        ))),
    }
}
