//! Blob store trait for the external byte storage collaborator.
//!
//! Node metadata lives in the node store; file bytes live behind this
//! trait and are addressed by an opaque key recorded as the node's
//! `content_ref`.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// A byte stream type used for reading blob contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// A time-limited URL issued by the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    /// The URL itself.
    pub url: String,
    /// Instant after which the URL stops working.
    pub expires_at: DateTime<Utc>,
}

/// Trait for blob storage backends.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local", "memory").
    fn provider_type(&self) -> &str;

    /// Store bytes and return the key they can be retrieved by.
    async fn put(&self, data: Bytes, content_type: &str) -> AppResult<String>;

    /// Delete the blob stored under `key`.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Sign a URL that downloads the blob as an attachment named `file_name`.
    async fn download_url(&self, key: &str, file_name: &str) -> AppResult<SignedUrl>;

    /// Sign a URL that renders the blob inline.
    async fn preview_url(&self, key: &str) -> AppResult<SignedUrl>;

    /// Open the blob for streaming reads.
    async fn read_stream(&self, key: &str) -> AppResult<ByteStream>;

    /// Check whether the backend is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
