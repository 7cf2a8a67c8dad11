//! Sharing: public links, per-user grants, and class grants.

pub mod class;
pub mod link;
pub mod public;
pub mod service;

pub use class::ClassShareService;
pub use link::{LinkDuration, ShareCodeGenerator};
pub use public::PublicLinkService;
pub use service::ShareService;
