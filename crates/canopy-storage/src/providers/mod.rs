//! Blob store implementations.

pub mod local;
pub mod memory;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

/// Generate a fresh blob key, sharded by its first two characters.
pub(crate) fn new_blob_key() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}/{}", &id[..2], id)
}
