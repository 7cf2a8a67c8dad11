//! Streaming zip export.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use canopy_auth::{AccessReason, AccessResolver};
use canopy_core::config::ExportConfig;
use canopy_core::error::AppError;
use canopy_core::result::AppResult;
use canopy_core::traits::{BlobStore, ByteStream};
use canopy_core::types::NodeId;
use canopy_database::NodeRepository;
use canopy_entity::user::Requester;

use super::plan::{ExportEntry, ExportPlan};
use super::writer::{Chunk, write_archive};

/// Chunks buffered between blob reads and the zip thread.
const INPUT_CHANNEL_CAPACITY: usize = 8;

/// A zip archive being produced.
pub struct ExportArchive {
    /// Suggested download name.
    pub file_name: String,
    /// Files in the archive.
    pub entry_count: usize,
    /// Uncompressed bytes going in.
    pub total_bytes: u64,
    /// `application/zip` bytes. Ends with an error item if the export was
    /// aborted; dropping it stops the export.
    pub stream: ByteStream,
}

impl std::fmt::Debug for ExportArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportArchive")
            .field("file_name", &self.file_name)
            .field("entry_count", &self.entry_count)
            .field("total_bytes", &self.total_bytes)
            .finish()
    }
}

/// Builds zip archives from readable files and folders.
#[derive(Debug, Clone)]
pub struct ExportService {
    nodes: Arc<dyn NodeRepository>,
    resolver: Arc<AccessResolver>,
    blobs: Arc<dyn BlobStore>,
    config: ExportConfig,
}

impl ExportService {
    /// Creates a new export service.
    pub fn new(
        nodes: Arc<dyn NodeRepository>,
        resolver: Arc<AccessResolver>,
        blobs: Arc<dyn BlobStore>,
        config: ExportConfig,
    ) -> Self {
        Self {
            nodes,
            resolver,
            blobs,
            config,
        }
    }

    /// Exports a single readable folder.
    pub async fn export_folder(
        &self,
        folder_id: NodeId,
        requester: &Requester,
    ) -> AppResult<ExportArchive> {
        let folder = self.resolver.require_read(folder_id, requester).await?;
        if !folder.is_folder {
            return Err(AppError::invalid_argument("Item is not a folder"));
        }
        self.export_nodes(&[folder_id], requester).await
    }

    /// Exports a selection of files and folders. Every target must be readable.
    pub async fn export_nodes(
        &self,
        node_ids: &[NodeId],
        requester: &Requester,
    ) -> AppResult<ExportArchive> {
        if node_ids.is_empty() {
            return Err(AppError::invalid_argument("No items selected for export"));
        }

        let verdicts = self
            .resolver
            .check_read_access_bulk(node_ids, requester)
            .await?;
        if let Some((id, verdict)) = verdicts.iter().find(|(_, v)| !v.granted) {
            return Err(match verdict.reason {
                AccessReason::NotFound | AccessReason::Deleted => {
                    AppError::not_found(format!("Node {id} not found"))
                }
                _ => AppError::forbidden(format!("You do not have access to {id}")),
            });
        }

        let targets = self.nodes.find_many(node_ids).await?;
        let mut plan = ExportPlan::new();
        for target in &targets {
            if target.is_folder {
                let descendants = self.nodes.find_descendants(target.id, false).await?;
                plan.add_folder(target, &descendants);
            } else {
                plan.add_file(target);
            }
        }

        if plan.is_empty() {
            return Err(AppError::invalid_argument("There are no files to export"));
        }
        if plan.total_bytes() > self.config.max_total_bytes {
            return Err(AppError::invalid_argument(format!(
                "Export of {} bytes exceeds the limit of {} bytes",
                plan.total_bytes(),
                self.config.max_total_bytes
            )));
        }

        let file_name = match targets.as_slice() {
            [only] if only.is_folder => format!("{}.zip", only.name),
            _ => format!("export-{}.zip", Utc::now().format("%Y%m%d-%H%M%S")),
        };
        let entry_count = plan.len();
        let total_bytes = plan.total_bytes();

        info!(
            user_id = %requester.user_id,
            targets = node_ids.len(),
            entries = entry_count,
            total_bytes,
            "Export started"
        );

        Ok(ExportArchive {
            file_name,
            entry_count,
            total_bytes,
            stream: self.spawn_archive(plan.into_entries()),
        })
    }

    /// Starts the reader task and the zip thread, returning the output stream.
    fn spawn_archive(&self, entries: Vec<ExportEntry>) -> ByteStream {
        let capacity = self.config.channel_capacity.max(1);
        let (chunk_tx, chunk_rx) = mpsc::channel::<Chunk>(INPUT_CHANNEL_CAPACITY);
        let (out_tx, out_rx) = mpsc::channel::<io::Result<Bytes>>(capacity);

        tokio::task::spawn_blocking(move || write_archive(chunk_rx, out_tx));

        let blobs = self.blobs.clone();
        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_seconds);
        tokio::spawn(async move {
            let outcome = tokio::time::timeout_at(deadline, feed(blobs, entries, &chunk_tx)).await;
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(FeedError::Closed)) => {
                    debug!("Export consumer went away, stopped reading blobs");
                    None
                }
                Ok(Err(FeedError::Io(e))) => Some(e),
                Err(_) => Some(io::Error::new(io::ErrorKind::TimedOut, "export timed out")),
            };
            if let Some(e) = failure {
                warn!(error = %e, "Export aborted");
                let _ = chunk_tx.send(Chunk::Abort(e)).await;
            }
        });

        Box::pin(futures::stream::unfold(out_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }
}

enum FeedError {
    /// The zip thread stopped listening.
    Closed,
    /// A blob could not be read.
    Io(io::Error),
}

/// Reads each blob in order and hands its bytes to the zip thread.
async fn feed(
    blobs: Arc<dyn BlobStore>,
    entries: Vec<ExportEntry>,
    tx: &mpsc::Sender<Chunk>,
) -> Result<(), FeedError> {
    for entry in entries {
        let mut stream = blobs
            .read_stream(&entry.content_ref)
            .await
            .map_err(|e| FeedError::Io(io::Error::other(e)))?;

        tx.send(Chunk::Start(entry.path))
            .await
            .map_err(|_| FeedError::Closed)?;

        while let Some(bytes) = stream.next().await {
            let bytes = bytes.map_err(FeedError::Io)?;
            tx.send(Chunk::Data(bytes))
                .await
                .map_err(|_| FeedError::Closed)?;
        }
    }
    Ok(())
}
