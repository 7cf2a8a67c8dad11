//! # canopy-entity
//!
//! Domain entity models for Canopy. Every struct in this crate represents
//! a database table row or a domain value object. All entities derive
//! `Debug`, `Clone`, `Serialize`, `Deserialize`, and database entities
//! additionally derive `sqlx::FromRow`.

pub mod grant;
pub mod node;
pub mod user;
