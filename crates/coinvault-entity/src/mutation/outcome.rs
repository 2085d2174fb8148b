//! Unit-of-work results and executor outcomes.

use serde::{Deserialize, Serialize};

use coinvault_core::error::AppError;
use coinvault_core::result::AppResult;

use crate::idempotency::{IdempotencyRecord, IdempotencyStatus};

/// A domain value that points at the entity a mutation created or touched.
pub trait ResourceRef {
    /// Entity type, e.g. `"seasonal_purchase"`.
    fn resource_type(&self) -> &'static str;
    /// Entity identifier.
    fn resource_id(&self) -> String;
}

/// What a successful unit of work hands back to the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationResult {
    /// Response body; stored and replayed verbatim.
    pub body: serde_json::Value,
    /// Affected entity type.
    pub resource_type: Option<String>,
    /// Affected entity id.
    pub resource_id: Option<String>,
}

impl MutationResult {
    /// A result carrying only a body.
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            body,
            resource_type: None,
            resource_id: None,
        }
    }

    /// Serialize a domain receipt and tag it with its resource pointer.
    pub fn from_resource<T>(resource: &T) -> AppResult<Self>
    where
        T: Serialize + ResourceRef,
    {
        Ok(Self {
            body: serde_json::to_value(resource)?,
            resource_type: Some(resource.resource_type().to_string()),
            resource_id: Some(resource.resource_id()),
        })
    }
}

/// The canonical answer for one `(scope, key)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    /// `true` when the outcome was read back instead of executed.
    pub replayed: bool,
    /// `succeeded` or `failed`.
    pub status: IdempotencyStatus,
    /// HTTP status recorded with the outcome.
    pub response_code: i32,
    /// Stored response body.
    pub response_body: serde_json::Value,
    /// Affected entity type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Affected entity id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl MutationOutcome {
    /// Outcome of an attempt that just ran successfully.
    pub fn executed(result: MutationResult) -> Self {
        Self {
            replayed: false,
            status: IdempotencyStatus::Succeeded,
            response_code: 200,
            response_body: result.body,
            resource_type: result.resource_type,
            resource_id: result.resource_id,
        }
    }

    /// Rebuild the outcome stored on a terminal record.
    pub fn replay(record: &IdempotencyRecord) -> AppResult<Self> {
        if !record.status.is_terminal() {
            return Err(AppError::internal(format!(
                "Cannot replay idempotency record {} in state {}",
                record.id, record.status
            )));
        }
        let default_code = match record.status {
            IdempotencyStatus::Succeeded => 200,
            _ => 500,
        };
        Ok(Self {
            replayed: true,
            status: record.status,
            response_code: record.response_code.unwrap_or(default_code),
            response_body: record
                .response_body
                .clone()
                .unwrap_or(serde_json::Value::Null),
            resource_type: record.resource_type.clone(),
            resource_id: record.resource_id.clone(),
        })
    }

    /// Whether the stored outcome is a success.
    pub fn is_success(&self) -> bool {
        self.status == IdempotencyStatus::Succeeded
    }
}
