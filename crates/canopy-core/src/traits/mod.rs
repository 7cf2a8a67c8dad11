//! Collaborator traits defined in `canopy-core` and implemented by other crates.

pub mod blob;
pub mod cache;

pub use blob::{BlobStore, ByteStream, SignedUrl};
pub use cache::CacheProvider;
