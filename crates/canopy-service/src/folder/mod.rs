//! Folder management: create, rename, move, delete, and subtree details.

pub mod service;

pub use service::FolderService;
