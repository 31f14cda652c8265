//! Translates `DomainError`/`ProviderError` into the HTTP error taxonomy
//! from spec.md §7: validation/authorization surface to the caller,
//! everything else collapses to a 404/500 with a logged detail.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::domain::errors::DomainError;

/// HTTP-facing error. Non-2xx bodies carry `{success:false, error}`
/// (spec.md §6).
#[derive(Debug)]
pub enum ApiError {
    /// Validation errors (spec.md §7): malformed payload, invalid cron,
    /// empty inclusion set, name too long.
    BadRequest(String),
    /// Authorization errors (spec.md §7) are reported as not-found to
    /// avoid leaking existence of entities the caller doesn't own.
    NotFound(String),
    Internal(String),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, &str) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.as_str()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.status_and_message().1)
    }
}

impl std::error::Error for ApiError {}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = message, "request failed");
        }
        (status, Json(ErrorBody { success: false, error: message.to_string() })).into_response()
    }
}

/// Maps a `DomainError` to the HTTP taxonomy: not-found variants become
/// 404s (also covering the authorization case, per spec.md §7's
/// "surfaced as 404 to avoid leaking existence"), validation becomes 400,
/// everything else is an opaque 500 with the detail logged server-side.
impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InstanceNotFound(_)
            | DomainError::IntentNotFound(_)
            | DomainError::ExecutionNotFound(_)
            | DomainError::TrackedAppNotFound(_)
            | DomainError::NotOwned => ApiError::NotFound(err.to_string()),
            DomainError::ValidationFailed(msg) => ApiError::BadRequest(msg),
            DomainError::DatabaseError(_) | DomainError::SerializationError(_) | DomainError::UpgradeFailed { .. } => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}
