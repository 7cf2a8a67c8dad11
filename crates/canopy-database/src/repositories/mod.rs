//! Repository traits and their PostgreSQL implementations.

pub mod grant;
pub mod node;
pub mod user;

pub use grant::{GrantRepository, PgGrantRepository};
pub use node::{NodeRepository, PgNodeRepository};
pub use user::{PgUserDirectory, UserDirectory};
