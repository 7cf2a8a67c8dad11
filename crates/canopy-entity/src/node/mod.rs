//! File and folder nodes.

pub mod model;
pub mod name;
pub mod path;

pub use model::{NewNode, Node, NodeStatus, PublicShare};
pub use name::{first_free_name, numbered_name, split_extension, validate_name};
pub use path::MaterializedPath;
