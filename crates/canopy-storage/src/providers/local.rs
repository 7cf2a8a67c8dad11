//! Local filesystem blob store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::debug;

use canopy_core::config::StorageConfig;
use canopy_core::error::{AppError, ErrorKind};
use canopy_core::result::AppResult;
use canopy_core::traits::{BlobStore, ByteStream, SignedUrl};

use super::new_blob_key;
use crate::signer::{Disposition, UrlSigner};

/// Blob store writing each blob to a file under a root directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    signer: UrlSigner,
    download_ttl: Duration,
    preview_ttl: Duration,
}

impl LocalBlobStore {
    /// Create a store rooted at `config.root_path`, creating the directory.
    pub async fn new(config: &StorageConfig) -> AppResult<Self> {
        let root = PathBuf::from(&config.root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::DependencyUnavailable,
                format!("Failed to create blob root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self {
            root,
            signer: UrlSigner::new(&config.public_base_url, &config.signing_secret),
            download_ttl: Duration::seconds(config.download_url_ttl_seconds as i64),
            preview_ttl: Duration::seconds(config.preview_url_ttl_seconds as i64),
        })
    }

    /// Resolve a key to a path inside the root, refusing traversal.
    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        let clean = key.trim_start_matches('/');
        if clean.is_empty() || clean.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(AppError::invalid_argument(format!("Invalid blob key: {key}")));
        }
        Ok(self.root.join(clean))
    }

    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::DependencyUnavailable,
                    format!("Failed to create blob directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    async fn require_exists(&self, key: &str) -> AppResult<()> {
        let path = self.resolve(key)?;
        match fs::try_exists(&path).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::not_found(format!("Blob not found: {key}"))),
            Err(e) => Err(AppError::with_source(
                ErrorKind::DependencyUnavailable,
                format!("Failed to stat blob: {key}"),
                e,
            )),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn put(&self, data: Bytes, content_type: &str) -> AppResult<String> {
        let key = new_blob_key();
        let path = self.resolve(&key)?;
        self.ensure_parent(&path).await?;

        fs::write(&path, &data).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::DependencyUnavailable,
                format!("Failed to write blob: {key}"),
                e,
            )
        })?;

        debug!(key = %key, bytes = data.len(), content_type, "Stored blob");
        Ok(key)
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::DependencyUnavailable,
                format!("Failed to delete blob: {key}"),
                e,
            )),
        }
    }

    async fn download_url(&self, key: &str, file_name: &str) -> AppResult<SignedUrl> {
        self.require_exists(key).await?;
        self.signer.sign(
            key,
            &Disposition::Attachment(file_name.to_string()),
            Utc::now(),
            self.download_ttl,
        )
    }

    async fn preview_url(&self, key: &str) -> AppResult<SignedUrl> {
        self.require_exists(key).await?;
        self.signer
            .sign(key, &Disposition::Inline, Utc::now(), self.preview_ttl)
    }

    async fn read_stream(&self, key: &str) -> AppResult<ByteStream> {
        let path = self.resolve(key)?;
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Blob not found: {key}"))
            } else {
                AppError::with_source(
                    ErrorKind::DependencyUnavailable,
                    format!("Failed to open blob: {key}"),
                    e,
                )
            }
        })?;

        Ok(Box::pin(ReaderStream::new(file)))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(fs::metadata(&self.root)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false))
    }
}
