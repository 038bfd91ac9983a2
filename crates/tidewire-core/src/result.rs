//! Convenience result type alias for Tidewire.

use crate::error::AppError;

/// A specialized `Result` type for Tidewire operations.
pub type AppResult<T> = Result<T, AppError>;
