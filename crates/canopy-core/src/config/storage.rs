//! Blob store configuration.

use serde::{Deserialize, Serialize};

/// Top-level blob store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Blob store backend: `"local"` or `"memory"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Root directory for the local backend.
    #[serde(default = "default_root")]
    pub root_path: String,
    /// Base URL prepended to signed download links.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Secret mixed into URL signatures.
    #[serde(default = "default_signing_secret")]
    pub signing_secret: String,
    /// Validity of signed download URLs in seconds.
    #[serde(default = "default_download_ttl")]
    pub download_url_ttl_seconds: u64,
    /// Validity of signed preview URLs in seconds.
    #[serde(default = "default_preview_ttl")]
    pub preview_url_ttl_seconds: u64,
    /// Maximum size of a single upload in bytes (default 100 MB).
    #[serde(default = "default_max_upload")]
    pub max_upload_size_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            root_path: default_root(),
            public_base_url: default_public_base_url(),
            signing_secret: default_signing_secret(),
            download_url_ttl_seconds: default_download_ttl(),
            preview_url_ttl_seconds: default_preview_ttl(),
            max_upload_size_bytes: default_max_upload(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}

fn default_root() -> String {
    "./data/blobs".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080/blobs".to_string()
}

fn default_signing_secret() -> String {
    "change-me".to_string()
}

fn default_download_ttl() -> u64 {
    3600
}

fn default_preview_ttl() -> u64 {
    900
}

fn default_max_upload() -> u64 {
    104_857_600 // 100 MB
}
