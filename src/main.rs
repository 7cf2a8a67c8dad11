//! Canopy: hierarchical file storage and sharing engine.
//!
//! Entry point that loads configuration, wires the services, and either
//! runs the maintenance scheduler or a one-shot maintenance command.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use canopy_core::config::AppConfig;
use canopy_database::DatabasePool;
use canopy_database::migration::run_migrations;
use canopy_service::CanopyServices;
use canopy_worker::{CronScheduler, RetentionJob};

/// Canopy storage engine
#[derive(Debug, Parser)]
#[command(name = "canopy", version, about, long_about = None)]
struct Cli {
    /// Environment overlay loaded from `config/<env>.toml`
    #[arg(short, long, env = "CANOPY_ENV", default_value = "development")]
    env: String,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Wire the services and run scheduled maintenance until interrupted
    Run,
    /// Run one trash retention sweep and print the report
    Sweep {
        /// Override the configured retention window
        #[arg(long)]
        max_age_days: Option<i64>,
    },
    /// Apply pending PostgreSQL migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.env).context("Failed to load configuration")?;
    init_logging(&config);
    tracing::info!(env = %cli.env, "Configuration loaded");

    match cli.command {
        Command::Run => run(config).await,
        Command::Sweep { max_age_days } => sweep(config, max_age_days).await,
        Command::Migrate => migrate(config).await,
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting Canopy v{}", env!("CARGO_PKG_VERSION"));

    let services = CanopyServices::from_config(&config)
        .await
        .context("Failed to initialize services")?;

    let mut scheduler = CronScheduler::new().await?;
    scheduler
        .register_retention_sweep(
            RetentionJob::new(services.trash.clone(), &config.trash),
            &config.trash,
        )
        .await?;
    scheduler.start().await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    scheduler.shutdown().await?;
    if let Some(pool) = &services.store.pool {
        pool.close().await;
    }

    tracing::info!("Canopy stopped");
    Ok(())
}

async fn sweep(config: AppConfig, max_age_days: Option<i64>) -> anyhow::Result<()> {
    let services = CanopyServices::from_config(&config)
        .await
        .context("Failed to initialize services")?;

    let job = match max_age_days {
        Some(days) => RetentionJob::with_max_age(services.trash.clone(), days),
        None => RetentionJob::new(services.trash.clone(), &config.trash),
    };
    let report = job.run().await?;

    tracing::info!(
        purged_roots = report.purged_roots,
        purged_nodes = report.purge.purged_nodes,
        blobs_deleted = report.purge.blobs_deleted,
        blob_failures = report.purge.blob_failures,
        grants_removed = report.grants_removed,
        "Sweep finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn migrate(config: AppConfig) -> anyhow::Result<()> {
    if config.database.provider != "postgres" {
        anyhow::bail!(
            "Migrations need the postgres provider, configured provider is '{}'",
            config.database.provider
        );
    }

    let pool = DatabasePool::connect(&config.database).await?;
    run_migrations(pool.pool()).await?;
    pool.close().await;
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
