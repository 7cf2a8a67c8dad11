//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field carries a serde default so an empty file
//! yields a working in-memory setup.

pub mod cache;
pub mod database;
pub mod export;
pub mod logging;
pub mod share;
pub mod storage;
pub mod trash;
pub mod tree;

use serde::{Deserialize, Serialize};

pub use self::cache::CacheConfig;
pub use self::database::DatabaseConfig;
pub use self::export::ExportConfig;
pub use self::logging::LoggingConfig;
pub use self::share::ShareConfig;
pub use self::storage::StorageConfig;
pub use self::trash::TrashConfig;
pub use self::tree::{SearchConfig, TreeConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Node store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache provider settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Blob store settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Hierarchy limits.
    #[serde(default)]
    pub tree: TreeConfig,
    /// Public link settings.
    #[serde(default)]
    pub share: ShareConfig,
    /// Trash retention settings.
    #[serde(default)]
    pub trash: TrashConfig,
    /// Zip export settings.
    #[serde(default)]
    pub export: ExportConfig,
    /// Name search settings.
    #[serde(default)]
    pub search: SearchConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `CANOPY__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CANOPY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_yields_defaults() {
        let config: AppConfig = config::Config::builder()
            .build()
            .expect("build")
            .try_deserialize()
            .expect("deserialize");

        assert_eq!(config.database.provider, "memory");
        assert_eq!(config.cache.provider, "memory");
        assert_eq!(config.tree.max_depth, 10);
        assert_eq!(config.share.code_length, 10);
        assert_eq!(config.trash.retention_days, 30);
        assert_eq!(config.search.max_results, 50);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: AppConfig = config::Config::builder()
            .set_override("tree.max_depth", 2)
            .expect("override")
            .build()
            .expect("build")
            .try_deserialize()
            .expect("deserialize");

        assert_eq!(config.tree.max_depth, 2);
        assert_eq!(config.tree.max_name_length, 255);
    }
}
