//! In-memory blob store.
//!
//! Keeps blobs in a map and signs URLs with the same scheme as the local
//! store. Individual keys can be marked to fail reads or deletes, which
//! lets callers exercise their failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use futures::stream;
use tokio::sync::RwLock;
use tracing::debug;

use canopy_core::config::StorageConfig;
use canopy_core::error::AppError;
use canopy_core::result::AppResult;
use canopy_core::traits::{BlobStore, ByteStream, SignedUrl};

use super::new_blob_key;
use crate::signer::{Disposition, UrlSigner};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Default)]
struct FailurePlan {
    reads: HashSet<String>,
    deletes: HashSet<String>,
}

/// Blob store held in process memory.
#[derive(Debug)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Bytes>>,
    failures: Mutex<FailurePlan>,
    signer: UrlSigner,
    download_ttl: Duration,
    preview_ttl: Duration,
}

impl MemoryBlobStore {
    /// Create an empty store using the URL settings from `config`.
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            failures: Mutex::new(FailurePlan::default()),
            signer: UrlSigner::new(&config.public_base_url, &config.signing_secret),
            download_ttl: Duration::seconds(config.download_url_ttl_seconds as i64),
            preview_ttl: Duration::seconds(config.preview_url_ttl_seconds as i64),
        }
    }

    fn failures(&self) -> MutexGuard<'_, FailurePlan> {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every read of `key` fail mid-stream.
    pub fn fail_reads_of(&self, key: &str) {
        self.failures().reads.insert(key.to_string());
    }

    /// Make every delete of `key` fail.
    pub fn fail_deletes_of(&self, key: &str) {
        self.failures().deletes.insert(key.to_string());
    }

    /// Whether a blob is stored under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.blobs.read().await.contains_key(key)
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Whether the store holds no blobs.
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    async fn require(&self, key: &str) -> AppResult<Bytes> {
        self.blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Blob not found: {key}")))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn put(&self, data: Bytes, content_type: &str) -> AppResult<String> {
        let key = new_blob_key();
        debug!(key = %key, bytes = data.len(), content_type, "Stored blob in memory");
        self.blobs.write().await.insert(key.clone(), data);
        Ok(key)
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        if self.failures().deletes.contains(key) {
            return Err(AppError::dependency_unavailable(format!(
                "Blob store refused to delete {key}"
            )));
        }
        self.blobs.write().await.remove(key);
        Ok(())
    }

    async fn download_url(&self, key: &str, file_name: &str) -> AppResult<SignedUrl> {
        self.require(key).await?;
        self.signer.sign(
            key,
            &Disposition::Attachment(file_name.to_string()),
            Utc::now(),
            self.download_ttl,
        )
    }

    async fn preview_url(&self, key: &str) -> AppResult<SignedUrl> {
        self.require(key).await?;
        self.signer
            .sign(key, &Disposition::Inline, Utc::now(), self.preview_ttl)
    }

    async fn read_stream(&self, key: &str) -> AppResult<ByteStream> {
        let data = self.require(key).await?;
        let mut chunks: Vec<Result<Bytes, std::io::Error>> = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let end = (offset + CHUNK_SIZE).min(data.len());
            chunks.push(Ok(data.slice(offset..end)));
            offset = end;
        }
        if self.failures().reads.contains(key) {
            chunks.truncate(1);
            chunks.push(Err(std::io::Error::other(format!(
                "connection reset while reading {key}"
            ))));
        }
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
