//! Access verdicts, the rule chain, and the resolver that runs it.

pub mod resolver;
pub mod rules;
pub mod verdict;

pub use resolver::AccessResolver;
pub use rules::{AccessRule, ClassGrantRule, OwnerRule, UserGrantRule};
pub use verdict::{AccessReason, AccessVerdict};
