//! Scheduled maintenance tasks for Canopy.
//!
//! This crate provides:
//! - A cron scheduler for periodic maintenance
//! - The trash retention job, also runnable on demand from the CLI

pub mod jobs;
pub mod scheduler;

pub use jobs::RetentionJob;
pub use scheduler::CronScheduler;
