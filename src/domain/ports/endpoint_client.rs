use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;

/// Snapshot of a container's configuration sufficient to recreate it with a
/// new image (spec.md §4.5 step 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfigSnapshot {
    pub name: String,
    pub env: Vec<String>,
    pub mounts: Vec<String>,
    pub networks: Vec<String>,
    pub restart_policy: String,
    pub labels: std::collections::BTreeMap<String, String>,
}

/// A container as reported directly by an endpoint, before the Container
/// Inventory Service joins it with a `LatestDescriptor` (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContainer {
    pub container_id: String,
    pub name: String,
    pub stack_name: Option<String>,
    pub image: String,
    pub status: String,
    pub state: String,
    pub current_digest_full: Option<String>,
}

/// An image as reported directly by an endpoint, independent of whether
/// any container currently references it (spec.md §9 Open Questions:
/// "unused images" cleanup).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteImage {
    pub image_id: String,
    pub repo_tags: Vec<String>,
    pub size_bytes: Option<i64>,
}

/// The remote agent ("runner") enrollment and RPC is out of scope
/// (spec.md §1); this trait is the minimal capability set the Upgrade
/// Executor and the Container Inventory Service need against an opaque
/// endpoint set.
#[async_trait]
pub trait EndpointClient: Send + Sync {
    /// List containers currently deployed on `endpoint_id` (spec.md §4.2).
    async fn list_containers(&self, instance_url: &str, endpoint_id: i64) -> DomainResult<Vec<RawContainer>>;

    /// Instruct the endpoint to pull `image_ref`'s resolved form.
    async fn pull_image(&self, instance_url: &str, endpoint_id: i64, image_ref: &str, credential: Option<&str>) -> DomainResult<()>;

    /// Snapshot an existing container's configuration for recreation.
    async fn snapshot_config(&self, instance_url: &str, endpoint_id: i64, container_id: &str) -> DomainResult<ContainerConfigSnapshot>;

    /// Stop the container with a bounded timeout.
    async fn stop(&self, instance_url: &str, endpoint_id: i64, container_id: &str) -> DomainResult<()>;

    /// Remove the (stopped) container.
    async fn remove(&self, instance_url: &str, endpoint_id: i64, container_id: &str) -> DomainResult<()>;

    /// Create a new container from a snapshot and a new image. Returns the
    /// new container's remote-assigned ID.
    async fn create(&self, instance_url: &str, endpoint_id: i64, snapshot: &ContainerConfigSnapshot, image_ref: &str) -> DomainResult<String>;

    /// Start a container and verify it reaches `running` within a bounded
    /// settle window.
    async fn start_and_wait_running(&self, instance_url: &str, endpoint_id: i64, container_id: &str) -> DomainResult<()>;

    /// List every image present on `endpoint_id`, used or not.
    async fn list_images(&self, instance_url: &str, endpoint_id: i64) -> DomainResult<Vec<RemoteImage>>;

    /// Delete a single image by its remote-assigned id.
    async fn delete_image(&self, instance_url: &str, endpoint_id: i64, image_id: &str) -> DomainResult<()>;
}
