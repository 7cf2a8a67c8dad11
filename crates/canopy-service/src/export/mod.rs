//! Streaming zip export of files and folder subtrees.

pub mod plan;
pub mod service;
pub mod writer;

pub use plan::{ExportEntry, ExportPlan};
pub use service::{ExportArchive, ExportService};
