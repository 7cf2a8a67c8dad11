//! # canopy-service
//!
//! Business logic service layer for Canopy. Each service orchestrates
//! the node store, the access resolver, the blob store, and the cache to
//! implement one family of use cases.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references. [`CanopyServices`] wires a
//! complete set from configuration.

pub mod app;
pub mod dto;
pub mod export;
pub mod file;
pub mod folder;
pub mod share;
pub mod trash;

pub use app::CanopyServices;
pub use export::{ExportArchive, ExportService};
pub use file::{DownloadService, FileService, SearchService, UploadFile, UploadService};
pub use folder::FolderService;
pub use share::{ClassShareService, LinkDuration, PublicLinkService, ShareService};
pub use trash::TrashService;
