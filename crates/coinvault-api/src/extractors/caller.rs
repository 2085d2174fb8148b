//! Caller identity extractors.
//!
//! Authentication happens in the upstream gateway, which forwards the
//! authenticated user as `x-user-id`. The request id comes from
//! `x-request-id` when the client or gateway set one.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use coinvault_core::error::{AppError, codes};
use coinvault_core::types::UserId;
use coinvault_service::context::RequestContext;

use crate::error::ApiError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request context with an optional actor.
#[derive(Debug, Clone)]
pub struct Caller(pub RequestContext);

impl std::ops::Deref for Caller {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = match header(parts, USER_ID_HEADER) {
            Some(raw) => Some(raw.parse::<UserId>().map_err(|_| {
                AppError::validation(format!("{USER_ID_HEADER} must be a UUID"))
            })?),
            None => None,
        };
        let request_id = header(parts, REQUEST_ID_HEADER).map(String::from);

        Ok(Self(RequestContext::new(actor, request_id)))
    }
}

/// Request context whose actor must be present.
#[derive(Debug, Clone)]
pub struct Actor {
    /// The acting user.
    pub user_id: UserId,
    /// Full context.
    pub ctx: RequestContext,
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Caller(ctx) = Caller::from_request_parts(parts, state).await?;
        let user_id = ctx.actor.ok_or_else(|| {
            AppError::validation(format!("{USER_ID_HEADER} header is required"))
                .with_code(codes::ACTOR_REQUIRED)
        })?;
        Ok(Self { user_id, ctx })
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
