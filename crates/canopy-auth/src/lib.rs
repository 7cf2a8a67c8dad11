//! # canopy-auth
//!
//! Access resolution for Canopy. A requester may read a node when one of
//! a chain of rules grants it (ownership, a direct or inherited user
//! grant, a matching class grant) and may write only what they own.
//!
//! Verdicts are never cached: revoking a grant takes effect on the very
//! next check.

pub mod access;

pub use access::{AccessReason, AccessResolver, AccessRule, AccessVerdict};
