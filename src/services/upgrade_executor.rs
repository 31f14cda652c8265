//! Single-container upgrade: pull, stop, remove, recreate, verify
//! (spec.md §4.5).

use std::sync::Arc;

use tracing::{error, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::EndpointClient;

#[derive(Debug, Clone)]
pub struct UpgradeOutcome {
    pub old_image: String,
    pub new_image: String,
}

pub struct UpgradeExecutor {
    endpoint_client: Arc<dyn EndpointClient>,
}

impl UpgradeExecutor {
    pub fn new(endpoint_client: Arc<dyn EndpointClient>) -> Self {
        Self { endpoint_client }
    }

    /// `upgradeOne(instance, endpoint, containerId, image, userId)` (spec.md §4.5).
    ///
    /// On any step's failure, attempts to restore the prior container from
    /// the snapshot on a best-effort basis, then propagates the error
    /// tagged with the step at which it failed.
    pub async fn upgrade_one(
        &self,
        instance_url: &str,
        endpoint_id: i64,
        container_id: &str,
        old_image: &str,
        new_image_ref: &str,
        credential: Option<&str>,
    ) -> DomainResult<UpgradeOutcome> {
        info!(instance_url, endpoint_id, container_id, new_image_ref, "starting container upgrade");

        self.endpoint_client
            .pull_image(instance_url, endpoint_id, new_image_ref, credential)
            .await
            .map_err(|e| step_error("pull", e))?;

        let snapshot = self
            .endpoint_client
            .snapshot_config(instance_url, endpoint_id, container_id)
            .await
            .map_err(|e| step_error("snapshot", e))?;

        self.endpoint_client
            .stop(instance_url, endpoint_id, container_id)
            .await
            .map_err(|e| step_error("stop", e))?;

        self.endpoint_client
            .remove(instance_url, endpoint_id, container_id)
            .await
            .map_err(|e| step_error("remove", e))?;

        let new_container_id = match self.endpoint_client.create(instance_url, endpoint_id, &snapshot, new_image_ref).await {
            Ok(id) => id,
            Err(e) => {
                self.restore_best_effort(instance_url, endpoint_id, &snapshot, old_image).await;
                return Err(step_error("create", e));
            }
        };

        if let Err(e) = self.endpoint_client.start_and_wait_running(instance_url, endpoint_id, &new_container_id).await {
            self.restore_best_effort(instance_url, endpoint_id, &snapshot, old_image).await;
            return Err(step_error("start", e));
        }

        info!(instance_url, endpoint_id, new_container_id, "container upgrade complete");

        Ok(UpgradeOutcome {
            old_image: old_image.to_string(),
            new_image: new_image_ref.to_string(),
        })
    }

    async fn restore_best_effort(
        &self,
        instance_url: &str,
        endpoint_id: i64,
        snapshot: &crate::domain::ports::endpoint_client::ContainerConfigSnapshot,
        old_image: &str,
    ) {
        match self.endpoint_client.create(instance_url, endpoint_id, snapshot, old_image).await {
            Ok(restored_id) => {
                if let Err(e) = self.endpoint_client.start_and_wait_running(instance_url, endpoint_id, &restored_id).await {
                    error!(error = %e, "best-effort restore started but did not reach running");
                }
            }
            Err(e) => error!(error = %e, "best-effort restore of prior container failed"),
        }
    }
}

fn step_error(step: &'static str, err: DomainError) -> DomainError {
    DomainError::UpgradeFailed { step, reason: err.to_string() }
}
