//! Convenience result type alias for rowqueue.

use crate::error::AppError;

/// A specialized `Result` type for rowqueue operations.
pub type AppResult<T> = Result<T, AppError>;
