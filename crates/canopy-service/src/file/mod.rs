//! File services: listing, upload registration, signed URLs, and search.

pub mod download;
pub mod search;
pub mod service;
pub mod upload;

pub use download::DownloadService;
pub use search::SearchService;
pub use service::FileService;
pub use upload::{UploadFile, UploadService};
