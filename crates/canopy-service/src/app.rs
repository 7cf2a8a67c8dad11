//! Wiring of a complete service set.

use std::sync::Arc;

use tracing::info;

use canopy_auth::AccessResolver;
use canopy_cache::CacheManager;
use canopy_core::config::AppConfig;
use canopy_core::result::AppResult;
use canopy_core::traits::{BlobStore, CacheProvider};
use canopy_database::NodeStore;
use canopy_storage::build_blob_store;

use crate::export::ExportService;
use crate::file::{DownloadService, FileService, SearchService, UploadService};
use crate::folder::FolderService;
use crate::share::{ClassShareService, PublicLinkService, ShareService};
use crate::trash::TrashService;

/// Every service, sharing one store, blob store, cache, and resolver.
#[derive(Debug, Clone)]
pub struct CanopyServices {
    /// The node store the services run against.
    pub store: NodeStore,
    /// Blob store collaborator.
    pub blobs: Arc<dyn BlobStore>,
    /// Signed URL cache.
    pub cache: Arc<dyn CacheProvider>,
    /// Access resolver.
    pub resolver: Arc<AccessResolver>,
    /// Folder operations.
    pub folders: Arc<FolderService>,
    /// Listings.
    pub files: Arc<FileService>,
    /// Upload registration.
    pub uploads: Arc<UploadService>,
    /// Signed URLs.
    pub downloads: Arc<DownloadService>,
    /// Name search.
    pub search: Arc<SearchService>,
    /// User grants.
    pub shares: Arc<ShareService>,
    /// Class grants.
    pub class_shares: Arc<ClassShareService>,
    /// Public links.
    pub public_links: Arc<PublicLinkService>,
    /// Trash lifecycle.
    pub trash: Arc<TrashService>,
    /// Zip export.
    pub export: Arc<ExportService>,
}

impl CanopyServices {
    /// Connects the configured store, blob store, and cache, then wires the services.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let store = NodeStore::connect(&config.database).await?;
        let blobs = build_blob_store(&config.storage).await?;
        let cache: Arc<dyn CacheProvider> = Arc::new(CacheManager::new(&config.cache).await?);

        info!(
            database = %config.database.provider,
            storage = %blobs.provider_type(),
            cache = %config.cache.provider,
            "Services initialized"
        );

        Ok(Self::assemble(config, store, blobs, cache))
    }

    /// Wires the services over already-built collaborators.
    pub fn assemble(
        config: &AppConfig,
        store: NodeStore,
        blobs: Arc<dyn BlobStore>,
        cache: Arc<dyn CacheProvider>,
    ) -> Self {
        let nodes = store.nodes.clone();
        let grants = store.grants.clone();
        let resolver = Arc::new(AccessResolver::new(nodes.clone(), grants.clone()));

        let trash = Arc::new(TrashService::new(
            nodes.clone(),
            grants.clone(),
            resolver.clone(),
            blobs.clone(),
            cache.clone(),
        ));

        Self {
            folders: Arc::new(FolderService::new(
                nodes.clone(),
                resolver.clone(),
                trash.clone(),
                cache.clone(),
                config.tree.clone(),
            )),
            files: Arc::new(FileService::new(
                nodes.clone(),
                grants.clone(),
                resolver.clone(),
            )),
            uploads: Arc::new(UploadService::new(
                nodes.clone(),
                resolver.clone(),
                blobs.clone(),
                &config.storage,
                &config.tree,
            )),
            downloads: Arc::new(DownloadService::new(
                resolver.clone(),
                blobs.clone(),
                cache.clone(),
                &config.cache,
            )),
            search: Arc::new(SearchService::new(
                nodes.clone(),
                grants.clone(),
                &config.search,
            )),
            shares: Arc::new(ShareService::new(
                nodes.clone(),
                grants.clone(),
                store.users.clone(),
                resolver.clone(),
            )),
            class_shares: Arc::new(ClassShareService::new(grants, resolver.clone())),
            public_links: Arc::new(PublicLinkService::new(
                nodes.clone(),
                resolver.clone(),
                blobs.clone(),
                &config.share,
            )),
            export: Arc::new(ExportService::new(
                nodes,
                resolver.clone(),
                blobs.clone(),
                config.export.clone(),
            )),
            trash,
            resolver,
            store,
            blobs,
            cache,
        }
    }
}
