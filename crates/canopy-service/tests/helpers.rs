//! Shared test helpers for service integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;

use canopy_cache::CacheManager;
use canopy_cache::memory::MemoryCacheProvider;
use canopy_core::config::AppConfig;
use canopy_core::traits::BlobStore;
use canopy_core::types::{NodeId, UserId};
use canopy_database::{MemoryStore, NodeStore, UserDirectory};
use canopy_entity::node::Node;
use canopy_entity::user::{Cohort, Requester, StaffRole, UserProfile};
use canopy_service::{CanopyServices, UploadFile};
use canopy_storage::MemoryBlobStore;

/// Test application context backed entirely by memory.
pub struct TestApp {
    /// Wired services.
    pub services: CanopyServices,
    /// The node store, for direct inspection.
    pub store: Arc<MemoryStore>,
    /// The blob store, for failure injection.
    pub blobs: Arc<MemoryBlobStore>,
    /// Application config.
    pub config: AppConfig,
}

impl TestApp {
    /// Create a new test application with default config.
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    /// Create a new test application with `config`.
    pub async fn with_config(config: AppConfig) -> Self {
        Self::with_blob_store(config, |blobs, _| blobs).await
    }

    /// Create a test application whose services see the blob store
    /// returned by `wrap`. `app.blobs` stays the wrapped memory store.
    pub async fn with_blob_store<F>(config: AppConfig, wrap: F) -> Self
    where
        F: FnOnce(Arc<MemoryBlobStore>, Arc<MemoryStore>) -> Arc<dyn BlobStore>,
    {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::new(&config.storage));
        let cache = Arc::new(CacheManager::from_provider(Arc::new(
            MemoryCacheProvider::new(&config.cache.memory),
        )));

        let services = CanopyServices::assemble(
            &config,
            NodeStore::memory(store.clone()),
            wrap(blobs.clone(), store.clone()),
            cache,
        );

        Self {
            services,
            store,
            blobs,
            config,
        }
    }

    /// Register a user in the directory.
    pub async fn create_user(&self, display_name: &str, accepts_shares: bool) -> UserId {
        let id = UserId::new();
        self.store
            .upsert_profile(UserProfile {
                id,
                display_name: display_name.to_string(),
                accepts_shares,
            })
            .await
            .expect("Failed to create user");
        id
    }

    /// Create a folder owned by `owner`.
    pub async fn folder(&self, owner: UserId, name: &str, parent: Option<NodeId>) -> Node {
        self.services
            .folders
            .create(name, owner, parent)
            .await
            .expect("Failed to create folder")
    }

    /// Upload one file with `content` owned by `owner`.
    pub async fn file(
        &self,
        owner: UserId,
        name: &str,
        parent: Option<NodeId>,
        content: &'static [u8],
    ) -> Node {
        self.services
            .uploads
            .register_upload(vec![upload(name, content)], owner, parent)
            .await
            .expect("Failed to upload file")
            .remove(0)
    }

    /// Reload a node straight from the store.
    pub async fn node(&self, id: NodeId) -> Option<Node> {
        use canopy_database::NodeRepository;
        self.store.find_by_id(id).await.expect("Failed to load node")
    }
}

/// An upload of `content` named `name`.
pub fn upload(name: &str, content: &'static [u8]) -> UploadFile {
    UploadFile {
        name: name.to_string(),
        content_type: Some("text/plain".to_string()),
        data: Bytes::from_static(content),
    }
}

/// A non-teacher staff requester.
pub fn member(user_id: UserId) -> Requester {
    Requester::staff(user_id, StaffRole::Member)
}

/// A teacher requester.
pub fn teacher(user_id: UserId) -> Requester {
    Requester::staff(user_id, StaffRole::Teacher)
}

/// A student requester in batch 2024, semester 3, `section`.
pub fn student(user_id: UserId, section: &str) -> Requester {
    Requester::student(
        user_id,
        Cohort {
            batch: "2024".to_string(),
            semester: 3,
            section: section.to_string(),
        },
    )
}
