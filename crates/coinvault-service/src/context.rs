//! Request context carrying the acting user and correlation id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use coinvault_core::types::UserId;

/// Context for the current request.
///
/// Built by the HTTP layer from gateway headers and passed into service
/// methods so every mutation knows who is acting and can be correlated in
/// the audit ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The authenticated user, as asserted by the upstream gateway.
    pub actor: Option<UserId>,
    /// Request correlation id.
    pub request_id: Option<String>,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context.
    pub fn new(actor: Option<UserId>, request_id: Option<String>) -> Self {
        Self {
            actor,
            request_id,
            request_time: Utc::now(),
        }
    }

    /// A context with no actor, for internal jobs and tests.
    pub fn system() -> Self {
        Self::new(None, None)
    }
}
