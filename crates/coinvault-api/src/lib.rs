//! # coinvault-api
//!
//! Axum HTTP surface for CoinVault. Handlers translate headers and JSON
//! bodies into service calls and map outcomes and [`AppError`]s to HTTP
//! responses through a single status table.
//!
//! [`AppError`]: coinvault_core::error::AppError

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
