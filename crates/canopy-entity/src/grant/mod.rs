//! Share grants to individual users and to class cohorts.

pub mod class;
pub mod model;

pub use class::{ClassShareGrant, CohortTarget, NewClassShareGrant};
pub use model::{NewShareGrant, ShareGrant};
