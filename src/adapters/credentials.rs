//! Environment-backed `CredentialProvider` (spec.md §1: "treated as opaque
//! accessors `credentialsFor(userId, kind)`"; out of scope to implement
//! real credential storage, so this adapter resolves from process
//! environment variables, the simplest opaque accessor that satisfies the
//! port without inventing a secrets store).

use async_trait::async_trait;

use crate::domain::ports::CredentialProvider;

/// Looks up `FLEETCTL_CRED__<USER_ID>__<KIND>` (kind upper-cased, non
/// alphanumerics turned into `_`) in the process environment.
pub struct EnvCredentialProvider;

impl EnvCredentialProvider {
    pub fn new() -> Self {
        Self
    }

    fn env_key(user_id: i64, kind: &str) -> String {
        let sanitized_kind: String = kind.chars().map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' }).collect();
        format!("FLEETCTL_CRED__{user_id}__{sanitized_kind}")
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn credentials_for(&self, user_id: i64, kind: &str) -> Option<String> {
        std::env::var(Self::env_key(user_id, kind)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_key_normalizes_kind_to_a_valid_identifier() {
        assert_eq!(EnvCredentialProvider::env_key(42, "instance:7"), "FLEETCTL_CRED__42__INSTANCE_7");
        assert_eq!(EnvCredentialProvider::env_key(1, "forge-token"), "FLEETCTL_CRED__1__FORGE_TOKEN");
    }

    #[tokio::test]
    async fn returns_none_when_unset() {
        let provider = EnvCredentialProvider::new();
        assert!(provider.credentials_for(999_999, "nonexistent-kind").await.is_none());
    }
}
