//! Zip export configuration.

use serde::{Deserialize, Serialize};

/// Zip export limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Total uncompressed bytes allowed in one archive (default 2 GB).
    #[serde(default = "default_max_bytes")]
    pub max_total_bytes: u64,
    /// Wall-clock limit for producing one archive, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Number of encoded chunks buffered ahead of the consumer.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_total_bytes: default_max_bytes(),
            timeout_seconds: default_timeout(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_max_bytes() -> u64 {
    2_147_483_648
}

fn default_timeout() -> u64 {
    600
}

fn default_channel_capacity() -> usize {
    16
}
