use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AnnotatedContainer, Instance, UnusedImage};

/// Credential & Instance Registry (spec.md §2.1): lists instances owned by
/// a user. The instances table itself is the only part of that component
/// this crate persists; credentials are resolved through `CredentialProvider`.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    async fn list_for_user(&self, user_id: i64) -> DomainResult<Vec<Instance>>;
    async fn get(&self, instance_id: i64) -> DomainResult<Option<Instance>>;
}

/// Container Inventory Service contract (spec.md §4.2).
///
/// `list_annotated_containers` returns a flat list; stack grouping for
/// concurrency is a consumer concern (the Intent Executor re-groups).
#[async_trait]
pub trait ContainerInventoryPort: Send + Sync {
    async fn list_annotated_containers(
        &self,
        user_id: i64,
        only_updates: bool,
    ) -> DomainResult<Vec<AnnotatedContainer>>;

    /// Images present on the user's instances that no running container
    /// currently references (spec.md §9 Open Questions: unused images are
    /// listed independently of any intent or lock state).
    async fn list_unused_images(&self, user_id: i64) -> DomainResult<Vec<UnusedImage>>;
}
