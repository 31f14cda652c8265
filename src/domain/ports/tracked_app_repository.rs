use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{LatestDescriptor, TrackedApp};

#[async_trait]
pub trait TrackedAppRepository: Send + Sync {
    async fn create(&self, app: &TrackedApp) -> DomainResult<()>;
    async fn update(&self, app: &TrackedApp) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<TrackedApp>>;
    async fn list_for_user(&self, user_id: i64) -> DomainResult<Vec<TrackedApp>>;
    /// All tracked apps across all users, for the tracked-app-sweep target set.
    async fn list_all(&self) -> DomainResult<Vec<TrackedApp>>;
}

/// Persistence for the `LatestDescriptor` cache (spec.md §3).
///
/// Registry images are keyed by `(user_id, repo, tag)`; tracked apps by
/// `(user_id, source_kind, source_ref)`. Both key shapes are modeled as a
/// single opaque string key built by the caller (the resolver/sweep), so
/// one table and one trait cover both spec.md key families.
#[async_trait]
pub trait LatestDescriptorRepository: Send + Sync {
    async fn get(&self, user_id: i64, key: &str) -> DomainResult<Option<LatestDescriptor>>;
    async fn upsert(&self, user_id: i64, key: &str, descriptor: &LatestDescriptor) -> DomainResult<()>;
}
