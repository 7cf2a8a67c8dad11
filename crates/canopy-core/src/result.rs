//! Convenience result type alias for Canopy.

use crate::error::AppError;

/// A specialized `Result` type for Canopy operations.
pub type AppResult<T> = Result<T, AppError>;
