//! Construction of the configured node store.

use std::sync::Arc;

use tracing::info;

use canopy_core::config::DatabaseConfig;
use canopy_core::error::AppError;

use crate::connection::DatabasePool;
use crate::memory::MemoryStore;
use crate::migration::run_migrations;
use crate::repositories::{
    GrantRepository, NodeRepository, PgGrantRepository, PgNodeRepository, PgUserDirectory,
    UserDirectory,
};

/// The three repositories a running engine needs, backed by one store.
#[derive(Debug, Clone)]
pub struct NodeStore {
    /// Node hierarchy.
    pub nodes: Arc<dyn NodeRepository>,
    /// User and class grants.
    pub grants: Arc<dyn GrantRepository>,
    /// User directory.
    pub users: Arc<dyn UserDirectory>,
    /// Connection pool when backed by PostgreSQL.
    pub pool: Option<DatabasePool>,
}

impl NodeStore {
    /// Build the store selected by `config.provider`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        match config.provider.as_str() {
            "memory" => {
                info!("Using in-memory node store");
                Ok(Self::memory(Arc::new(MemoryStore::new())))
            }
            "postgres" => {
                let pool = DatabasePool::connect(config).await?;
                if config.run_migrations {
                    run_migrations(pool.pool()).await?;
                }
                Ok(Self::postgres(pool))
            }
            other => Err(AppError::configuration(format!(
                "Unknown database provider '{other}'. Expected 'postgres' or 'memory'"
            ))),
        }
    }

    /// Wrap a shared in-memory store.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            nodes: store.clone(),
            grants: store.clone(),
            users: store,
            pool: None,
        }
    }

    /// Wrap a PostgreSQL pool.
    pub fn postgres(pool: DatabasePool) -> Self {
        let pg = pool.pool().clone();
        Self {
            nodes: Arc::new(PgNodeRepository::new(pg.clone())),
            grants: Arc::new(PgGrantRepository::new(pg.clone())),
            users: Arc::new(PgUserDirectory::new(pg)),
            pool: Some(pool),
        }
    }
}
