//! Trash lifecycle: soft delete, restore, purge, and retention sweeps.

pub mod service;

pub use service::TrashService;
