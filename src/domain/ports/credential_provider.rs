use async_trait::async_trait;

/// Opaque accessor over wherever credentials actually live.
///
/// Per spec.md's explicit out-of-scope declaration, authentication,
/// session, and credential-storage primitives are someone else's problem;
/// this crate only ever asks for a secret by `(user_id, kind)`.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Resolve the credential of `kind` for `user_id`, e.g. `kind` =
    /// `"instance:42"` or `"forge-token:<tracked-app-id>"`. Returns `None`
    /// when no credential is configured rather than erroring, so callers
    /// can fall back to unauthenticated access where the provider allows it.
    async fn credentials_for(&self, user_id: i64, kind: &str) -> Option<String>;
}
