//! Outcome of an access check.

use serde::{Deserialize, Serialize};

/// Why access was granted or denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    /// The requester owns the node.
    Owner,
    /// A user grant on the node itself.
    Direct,
    /// A user grant on an ancestor folder.
    Inherited,
    /// A class grant matching the requester's cohort.
    Class,
    /// The node does not exist.
    NotFound,
    /// The node is in the trash.
    Deleted,
    /// No rule granted access.
    NoAccess,
}

/// Result of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessVerdict {
    /// Whether access is granted.
    pub granted: bool,
    /// The deciding reason.
    pub reason: AccessReason,
}

impl AccessVerdict {
    /// A granting verdict.
    pub fn granted(reason: AccessReason) -> Self {
        Self {
            granted: true,
            reason,
        }
    }

    /// A denying verdict.
    pub fn denied(reason: AccessReason) -> Self {
        Self {
            granted: false,
            reason,
        }
    }
}
