//! Unified application error types for CoinVault.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. Errors raised by a unit of work carry
//! a machine-readable `code` (e.g. `INSUFFICIENT_COINS`) that is persisted
//! with a failed idempotency record and echoed to clients.

use std::fmt;
use thiserror::Error;

/// Machine-readable error codes shared by the executor, the ledgers and the
/// HTTP layer.
pub mod codes {
    /// The request did not carry an idempotency key.
    pub const IDEMPOTENCY_KEY_REQUIRED: &str = "IDEMPOTENCY_KEY_REQUIRED";
    /// The request did not identify the acting user.
    pub const ACTOR_REQUIRED: &str = "ACTOR_REQUIRED";
    /// The idempotency key is empty or too long.
    pub const INVALID_IDEMPOTENCY_KEY: &str = "INVALID_IDEMPOTENCY_KEY";
    /// The scope is empty or too long.
    pub const INVALID_SCOPE: &str = "INVALID_SCOPE";
    /// The key was already used for a different request payload.
    pub const IDEMPOTENCY_PAYLOAD_MISMATCH: &str = "IDEMPOTENCY_PAYLOAD_MISMATCH";
    /// Another attempt with the same key is still running.
    pub const IDEMPOTENCY_IN_PROGRESS: &str = "IDEMPOTENCY_IN_PROGRESS";
    /// A newer attempt took over the record; this attempt must not commit.
    pub const FENCING_TOKEN_LOST: &str = "FENCING_TOKEN_LOST";
    /// The user has no wallet.
    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";
    /// The wallet balance does not cover the debit.
    pub const INSUFFICIENT_COINS: &str = "INSUFFICIENT_COINS";
    /// Quantity outside the accepted range.
    pub const INVALID_QUANTITY: &str = "INVALID_QUANTITY";
    /// Coin amount outside the accepted range.
    pub const INVALID_AMOUNT: &str = "INVALID_AMOUNT";
    /// A user tried to transfer coins to themselves.
    pub const SELF_TRANSFER_FORBIDDEN: &str = "SELF_TRANSFER_FORBIDDEN";
    /// A row lock could not be acquired in time (deadlock, timeout, serialization).
    pub const LOCK_TIMEOUT: &str = "LOCK_TIMEOUT";
}

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested resource was not found.
    NotFound,
    /// Input validation failed.
    Validation,
    /// A conflict occurred (duplicate key, concurrent attempt, business rule).
    Conflict,
    /// A rate limit was exceeded.
    RateLimit,
    /// An internal server error occurred.
    Internal,
    /// A database error occurred.
    Database,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// The service is temporarily unavailable (lock timeouts, deadlocks).
    ServiceUnavailable,
}

impl ErrorKind {
    /// The HTTP status code this kind of error is reported with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Validation => 400,
            Self::Conflict => 409,
            Self::RateLimit => 429,
            Self::ServiceUnavailable => 503,
            Self::Internal | Self::Database | Self::Configuration | Self::Serialization => 500,
        }
    }

    /// Whether a failure of this kind is transient.
    ///
    /// Transient failures are never cached as a terminal idempotency outcome;
    /// a retry with the same key executes the unit of work again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database | Self::ServiceUnavailable | Self::RateLimit
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Database => write!(f, "DATABASE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
        }
    }
}

/// The unified application error used throughout CoinVault.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// Optional machine-readable code; falls back to the kind when absent.
    pub code: Option<String>,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Attach a machine-readable code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// The machine-readable code, defaulting to the kind's name.
    pub fn code(&self) -> String {
        self.code.clone().unwrap_or_else(|| self.kind.to_string())
    }

    /// Whether this error is transient (see [`ErrorKind::is_retryable`]).
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a rate-limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a service-unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// The key was reused with a different payload.
    pub fn payload_mismatch() -> Self {
        Self::conflict("Idempotency key already used with different payload")
            .with_code(codes::IDEMPOTENCY_PAYLOAD_MISMATCH)
    }

    /// Another attempt with the same key is running.
    pub fn in_progress() -> Self {
        Self::conflict("Request with this idempotency key is currently in progress")
            .with_code(codes::IDEMPOTENCY_IN_PROGRESS)
    }

    /// JSON body persisted for a failed outcome and returned to clients.
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.code(),
            "message": self.message,
        })
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            code: self.code.clone(),
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
