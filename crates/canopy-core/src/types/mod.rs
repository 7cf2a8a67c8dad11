//! Core type definitions used across the Canopy workspace.

pub mod id;

pub use id::{ClassGrantId, NodeId, UserId, raw_ids};
