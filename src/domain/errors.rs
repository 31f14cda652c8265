//! Domain errors for the fleetctl control plane.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur anywhere below the HTTP surface.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("instance not found: {0}")]
    InstanceNotFound(i64),

    #[error("intent not found: {0}")]
    IntentNotFound(Uuid),

    #[error("intent execution not found: {0}")]
    ExecutionNotFound(Uuid),

    #[error("tracked app not found: {0}")]
    TrackedAppNotFound(Uuid),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("not owned by caller")]
    NotOwned,

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("upgrade failed at step {step}: {reason}")]
    UpgradeFailed { step: &'static str, reason: String },
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

/// Errors raised by upstream provider clients (registry / forge).
///
/// Rate-limit is split out from every other transient failure because the
/// batch runner and resolver treat it differently: it halts the enclosing
/// sweep instead of being absorbed per-target (spec.md §4.1, §7).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited by upstream provider")]
    RateLimited,

    #[error("transient provider error: {0}")]
    Transient(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
