//! # canopy-database
//!
//! The node store: repository traits over nodes, grants, and the user
//! directory, with a PostgreSQL implementation and an in-memory one.
//! Multi-row cascades (move, soft delete, restore, purge) are atomic in
//! both: a transaction in PostgreSQL, a single write lock in memory.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryStore;
pub use repositories::{GrantRepository, NodeRepository, UserDirectory};
pub use store::NodeStore;
