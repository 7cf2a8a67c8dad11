//! Users as seen by the storage engine.

pub mod model;
pub mod requester;

pub use model::UserProfile;
pub use requester::{Capability, Cohort, Requester, StaffRole};
