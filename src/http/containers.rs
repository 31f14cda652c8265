//! `/api/containers` and `/api/images` handlers (spec.md §6).

use axum::extract::{Path, State};
use axum::Json;

use crate::domain::errors::DomainError;
use crate::domain::models::AnnotatedContainer;
use crate::services::lock_manager::{with_lock, LockKey};

use super::auth::AuthenticatedUser;
use super::dto::{
    group_by_instance_and_stack, BatchUpgradeRequest, ContainersResponse, DeleteImageResult, DeleteImagesRequest,
    UnusedImagesResponse, UpgradeContainerRequest, UpgradeResult,
};
use super::error::ApiError;
use super::AppState;

pub async fn list_containers(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<ContainersResponse>, ApiError> {
    let containers = state.inventory.list_annotated_containers(user_id, false).await?;
    let unused_image_count = state.inventory.list_unused_images(user_id).await?.len();
    Ok(Json(ContainersResponse { groups: group_by_instance_and_stack(containers), unused_image_count }))
}

pub async fn list_unused_images(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<UnusedImagesResponse>, ApiError> {
    let images = state.inventory.list_unused_images(user_id).await?;
    Ok(Json(UnusedImagesResponse { images }))
}

/// Resolves an owned container by `(instance_id, container_id)` from the
/// current inventory snapshot, mirroring the Matching Engine's own
/// "drop and warn on orphan instance references" check (spec.md §4.3
/// step 6), here surfaced as a 404 instead of a silent drop.
async fn find_owned_container(
    state: &AppState,
    user_id: i64,
    instance_id: i64,
    container_id: &str,
) -> Result<AnnotatedContainer, ApiError> {
    if state.instances.get(instance_id).await?.filter(|i| i.user_id == user_id).is_none() {
        return Err(DomainError::InstanceNotFound(instance_id).into());
    }

    state
        .inventory
        .list_annotated_containers(user_id, false)
        .await?
        .into_iter()
        .find(|c| c.instance_id == instance_id && c.container_id == container_id)
        .ok_or_else(|| ApiError::NotFound(format!("container {container_id} not found on instance {instance_id}")))
}

pub async fn upgrade_container(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(container_id): Path<String>,
    Json(payload): Json<UpgradeContainerRequest>,
) -> Result<Json<UpgradeResult>, ApiError> {
    let container = find_owned_container(&state, user_id, payload.instance_id, &container_id).await?;
    let result = upgrade_one_locked(&state, user_id, "manual", &container).await;
    Ok(Json(result))
}

pub async fn batch_upgrade(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(payload): Json<BatchUpgradeRequest>,
) -> Result<Json<Vec<UpgradeResult>>, ApiError> {
    let mut results = Vec::with_capacity(payload.containers.len());
    for target in payload.containers {
        let result = match find_owned_container(&state, user_id, target.instance_id, &target.container_id).await {
            Ok(container) => upgrade_one_locked(&state, user_id, "batch", &container).await,
            Err(e) => UpgradeResult {
                container_id: target.container_id,
                success: false,
                old_image: None,
                new_image: None,
                error: Some(e.to_string()),
            },
        };
        results.push(result);
    }
    Ok(Json(results))
}

/// Acquires the same `(instanceId, containerId)` lock the Intent Executor
/// uses before calling §4.5, so a manual upgrade and an in-flight intent
/// execution can never race on the same container (spec.md §5).
async fn upgrade_one_locked(state: &AppState, user_id: i64, trigger: &str, container: &AnnotatedContainer) -> UpgradeResult {
    let key: LockKey = (container.instance_id, container.container_id.clone());
    let owner = format!("{trigger}:{user_id}");

    if let Err(holder) = state.lock_manager.acquire(&key, &owner).await {
        return UpgradeResult {
            container_id: container.container_id.clone(),
            success: false,
            old_image: None,
            new_image: None,
            error: Some(format!("locked-by-{holder}")),
        };
    }

    let credential = state.credentials.credentials_for(user_id, &format!("instance:{}", container.instance_id)).await;
    let new_image_ref = container.latest_image_ref();
    let old_image = container.image.clone();
    let upgrade_executor = state.upgrade_executor.clone();
    let instance_url = container.instance_url.clone();
    let endpoint_id = container.endpoint_id;
    let container_id = container.container_id.clone();

    let outcome = with_lock(&state.lock_manager, key, || async move {
        upgrade_executor.upgrade_one(&instance_url, endpoint_id, &container_id, &old_image, &new_image_ref, credential.as_deref()).await
    })
    .await;

    match outcome {
        Ok(outcome) => UpgradeResult {
            container_id: container.container_id.clone(),
            success: true,
            old_image: Some(outcome.old_image),
            new_image: Some(outcome.new_image),
            error: None,
        },
        Err(e) => UpgradeResult {
            container_id: container.container_id.clone(),
            success: false,
            old_image: None,
            new_image: None,
            error: Some(e.to_string()),
        },
    }
}

pub async fn delete_images(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(payload): Json<DeleteImagesRequest>,
) -> Result<Json<Vec<DeleteImageResult>>, ApiError> {
    let mut results = Vec::with_capacity(payload.images.len());
    for target in payload.images {
        let result = match state.instances.get(target.instance_id).await? {
            Some(instance) if instance.user_id == user_id => {
                match state.endpoint_client.delete_image(&instance.url, instance.id, &target.image_id).await {
                    Ok(()) => DeleteImageResult { id: target.image_id, success: true, error: None },
                    Err(e) => DeleteImageResult { id: target.image_id, success: false, error: Some(e.to_string()) },
                }
            }
            _ => DeleteImageResult {
                id: target.image_id,
                success: false,
                error: Some(format!("instance {} not found", target.instance_id)),
            },
        };
        results.push(result);
    }
    Ok(Json(results))
}
