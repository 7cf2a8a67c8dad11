//! Hierarchy and search limits.

use serde::{Deserialize, Serialize};

/// Limits applied to the folder hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Folders must sit at a depth strictly below this value.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum length of a node name in characters.
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_name_length: default_max_name_length(),
        }
    }
}

/// Name search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Upper bound on results returned by one search.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

fn default_max_depth() -> usize {
    10
}

fn default_max_name_length() -> usize {
    255
}

fn default_max_results() -> usize {
    50
}
