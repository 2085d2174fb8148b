//! Translation of sqlx failures into [`AppError`].
//!
//! Lock contention surfaces from PostgreSQL as serialization failures,
//! deadlocks or lock timeouts. All of them are transient: the idempotency
//! record is released and the client may retry with the same key.

use coinvault_core::error::{codes, AppError, ErrorKind};

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const QUERY_CANCELED: &str = "57014";
const UNIQUE_VIOLATION: &str = "23505";

/// Map a sqlx error to an application error, classifying lock contention.
pub fn map_db_error(context: &str, err: sqlx::Error) -> AppError {
    let sqlstate = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|c| c.into_owned());

    match sqlstate.as_deref() {
        Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE | QUERY_CANCELED) => {
            AppError::with_source(
                ErrorKind::ServiceUnavailable,
                format!("{context}: lock contention, retry later"),
                err,
            )
            .with_code(codes::LOCK_TIMEOUT)
        }
        Some(UNIQUE_VIOLATION) => {
            AppError::with_source(ErrorKind::Conflict, format!("{context}: duplicate row"), err)
        }
        _ => AppError::with_source(ErrorKind::Database, context.to_string(), err),
    }
}
