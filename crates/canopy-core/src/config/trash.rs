//! Trash retention configuration.

use serde::{Deserialize, Serialize};

/// Retention sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashConfig {
    /// Trashed subtrees older than this many days are purged by the sweep.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Cron expression (with seconds) for the retention sweep.
    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,
    /// Whether the scheduler registers the sweep at all.
    #[serde(default = "default_true")]
    pub sweep_enabled: bool,
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            sweep_cron: default_sweep_cron(),
            sweep_enabled: true,
        }
    }
}

fn default_retention_days() -> i64 {
    30
}

fn default_sweep_cron() -> String {
    "0 0 3 * * *".to_string()
}

fn default_true() -> bool {
    true
}
