//! User identification boundary for the HTTP surface.
//!
//! Authentication and session handling are explicitly out of scope
//! (spec.md §1): every real deployment sits behind whatever auth layer the
//! operator chooses, and hands this crate only the already-authenticated
//! caller's user id. This extractor is the opaque seam that assumption
//! lives at — it reads a pre-authenticated `X-User-Id` header the way the
//! rest of the crate treats `CredentialProvider` as an opaque accessor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::ApiError;

#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub i64);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("missing X-User-Id header".into()))?;

        let user_id: i64 = header.parse().map_err(|_| ApiError::BadRequest("X-User-Id must be an integer".into()))?;
        Ok(AuthenticatedUser(user_id))
    }
}
