//! Public link configuration.

use serde::{Deserialize, Serialize};

/// Public link code generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareConfig {
    /// Number of alphanumeric characters in a public code.
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    /// Attempts at generating an unused code before giving up.
    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: u32,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            max_code_attempts: default_max_code_attempts(),
        }
    }
}

fn default_code_length() -> usize {
    10
}

fn default_max_code_attempts() -> u32 {
    5
}
