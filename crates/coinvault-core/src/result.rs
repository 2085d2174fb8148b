//! Convenience result type alias for CoinVault.

use crate::error::AppError;

/// A specialized `Result` type for CoinVault operations.
pub type AppResult<T> = Result<T, AppError>;
