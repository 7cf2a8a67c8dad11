//! # canopy-storage
//!
//! Blob store implementations for Canopy: a local filesystem store that
//! issues SHA-256 signed URLs, and an in-memory store used by tests and
//! ephemeral deployments.

pub mod manager;
pub mod providers;
pub mod signer;

pub use manager::build_blob_store;
pub use providers::{LocalBlobStore, MemoryBlobStore};
pub use signer::UrlSigner;
