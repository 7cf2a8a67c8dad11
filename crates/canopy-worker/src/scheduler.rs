//! Cron scheduler for periodic maintenance tasks.

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use canopy_core::config::TrashConfig;
use canopy_core::error::AppError;

use crate::jobs::RetentionJob;

/// Cron-based scheduler for periodic background tasks
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new() -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self { scheduler })
    }

    /// Register the trash retention sweep on `config.sweep_cron`
    pub async fn register_retention_sweep(
        &self,
        job: RetentionJob,
        config: &TrashConfig,
    ) -> Result<(), AppError> {
        if !config.sweep_enabled {
            tracing::info!("Trash retention sweep disabled");
            return Ok(());
        }

        let cron = CronJob::new_async(config.sweep_cron.as_str(), move |_uuid, _lock| {
            let job = job.clone();
            Box::pin(async move {
                job.run_scheduled().await;
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid trash sweep schedule '{}': {}",
                config.sweep_cron, e
            ))
        })?;

        self.scheduler.add(cron).await.map_err(|e| {
            AppError::internal(format!("Failed to add retention_sweep schedule: {}", e))
        })?;

        tracing::info!(cron = %config.sweep_cron, "Registered: retention_sweep");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}
