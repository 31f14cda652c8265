//! Joins each instance's raw container list with the persisted
//! `LatestDescriptor` cache to produce the annotated inventory the
//! Matching Engine selects over (spec.md §4.2).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use std::collections::HashSet;

use crate::domain::errors::DomainResult;
use crate::domain::models::{parse_image_ref, AnnotatedContainer, UnusedImage};
use crate::domain::ports::{ContainerInventoryPort, EndpointClient, InstanceRepository, LatestDescriptorRepository};
use crate::services::version_normalize::has_update;

/// Builds the opaque `LatestDescriptorRepository` key for a registry image
/// coordinate, per that trait's "(user_id, repo, tag)" key family.
pub fn registry_descriptor_key(repo: &str, tag: &str) -> String {
    format!("registry:{repo}:{tag}")
}

pub struct InventoryService {
    instances: Arc<dyn InstanceRepository>,
    endpoint_client: Arc<dyn EndpointClient>,
    descriptors: Arc<dyn LatestDescriptorRepository>,
}

impl InventoryService {
    pub fn new(
        instances: Arc<dyn InstanceRepository>,
        endpoint_client: Arc<dyn EndpointClient>,
        descriptors: Arc<dyn LatestDescriptorRepository>,
    ) -> Self {
        Self { instances, endpoint_client, descriptors }
    }
}

#[async_trait]
impl ContainerInventoryPort for InventoryService {
    async fn list_annotated_containers(&self, user_id: i64, only_updates: bool) -> DomainResult<Vec<AnnotatedContainer>> {
        let instances = self.instances.list_for_user(user_id).await?;
        let mut out = Vec::new();

        for instance in instances {
            // One endpoint per instance (spec.md's remote-agent RPC is out
            // of scope, so the endpoint id is the instance id itself).
            let endpoint_id = instance.id;

            let raw = match self.endpoint_client.list_containers(&instance.url, endpoint_id).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(instance_id = instance.id, error = %e, "failed to list containers for instance, skipping");
                    continue;
                }
            };

            for container in raw {
                let (registry, repo, tag) = parse_image_ref(&container.image);
                let key = registry_descriptor_key(&repo, &tag);
                let descriptor = self.descriptors.get(user_id, &key).await?;

                let (latest_tag, latest_digest) = match &descriptor {
                    Some(d) => (d.tag.clone(), d.digest.clone()),
                    None => (None, None),
                };

                let update_available = has_update(
                    container.current_digest_full.as_deref(),
                    Some(tag.as_str()),
                    latest_digest.as_deref(),
                    latest_tag.as_deref(),
                );

                if only_updates && !update_available {
                    continue;
                }

                out.push(AnnotatedContainer {
                    container_id: container.container_id,
                    instance_id: instance.id,
                    endpoint_id,
                    name: container.name,
                    stack_name: container.stack_name,
                    image: container.image,
                    status: container.status,
                    state: container.state,
                    current_digest: container.current_digest_full.as_deref().map(short_digest),
                    current_digest_full: container.current_digest_full,
                    registry,
                    repo,
                    tag,
                    has_update: update_available,
                    instance_url: instance.url.clone(),
                    latest_tag,
                    latest_digest,
                });
            }
        }

        Ok(out)
    }

    /// An image is unused when none of the endpoint's currently reported
    /// containers reference it by repo:tag. Images are compared against
    /// the raw in-use set per sweep, independently of the Upgrade Lock
    /// Manager (spec.md §9 Open Questions, resolved).
    async fn list_unused_images(&self, user_id: i64) -> DomainResult<Vec<UnusedImage>> {
        let instances = self.instances.list_for_user(user_id).await?;
        let mut out = Vec::new();

        for instance in instances {
            let endpoint_id = instance.id;

            let containers = match self.endpoint_client.list_containers(&instance.url, endpoint_id).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(instance_id = instance.id, error = %e, "failed to list containers for unused-image sweep, skipping");
                    continue;
                }
            };
            let in_use: HashSet<&str> = containers.iter().map(|c| c.image.as_str()).collect();

            let images = match self.endpoint_client.list_images(&instance.url, endpoint_id).await {
                Ok(images) => images,
                Err(e) => {
                    warn!(instance_id = instance.id, error = %e, "failed to list images for unused-image sweep, skipping");
                    continue;
                }
            };

            for image in images {
                if image.repo_tags.iter().any(|t| in_use.contains(t.as_str())) {
                    continue;
                }
                out.push(UnusedImage {
                    instance_id: instance.id,
                    endpoint_id,
                    instance_url: instance.url.clone(),
                    image_id: image.image_id,
                    repo_tags: image.repo_tags,
                    size_bytes: image.size_bytes,
                });
            }
        }

        Ok(out)
    }
}

fn short_digest(full: &str) -> String {
    full.rsplit_once(':').map(|(_, hash)| hash.chars().take(12).collect()).unwrap_or_else(|| full.to_string())
}
