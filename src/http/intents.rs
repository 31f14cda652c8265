//! `/api/intents` and `/api/executions` handlers (spec.md §6).

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{Intent, IntentExecution, TriggerKind};
use crate::services::intent_executor::{ExecuteOptions, IntentExecutor};
use crate::services::matching_engine::MatchingEngine;

use super::auth::AuthenticatedUser;
use super::dto::{ensure_owned, ExecutionDetail, IntentPayload, IntentPreviewResponse, ToggleRequest};
use super::error::ApiError;
use super::AppState;

async fn load_owned_intent(state: &AppState, user_id: i64, id: Uuid) -> Result<Intent, ApiError> {
    let intent = state.intents.get(id).await?.ok_or(DomainError::IntentNotFound(id))?;
    ensure_owned(intent.user_id, user_id)?;
    Ok(intent)
}

pub async fn list_intents(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<Vec<Intent>>, ApiError> {
    Ok(Json(state.intents.list_for_user(user_id).await?))
}

pub async fn create_intent(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(payload): Json<IntentPayload>,
) -> Result<Json<Intent>, ApiError> {
    let intent = payload.into_new_intent(user_id, Utc::now())?;
    state.intents.create(&intent).await?;
    Ok(Json(intent))
}

pub async fn get_intent(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Intent>, ApiError> {
    Ok(Json(load_owned_intent(&state, user_id, id).await?))
}

pub async fn update_intent(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<IntentPayload>,
) -> Result<Json<Intent>, ApiError> {
    let existing = load_owned_intent(&state, user_id, id).await?;
    let updated = payload.apply_to(&existing, Utc::now())?;
    state.intents.update(&updated).await?;
    Ok(Json(updated))
}

pub async fn delete_intent(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_owned_intent(&state, user_id, id).await?;
    state.intents.delete(id).await?;
    Ok(Json(serde_json::json!({"deleted": true})))
}

pub async fn toggle_intent(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<Intent>, ApiError> {
    let existing = load_owned_intent(&state, user_id, id).await?;
    let now = Utc::now();
    let new_enabled = body.enabled.unwrap_or(!existing.enabled);
    let re_enabled = !existing.enabled && new_enabled;

    let mut updated = existing;
    updated.enabled = new_enabled;
    // Anchor-reset on re-enable (spec.md §4.7), same rule `IntentPayload`
    // applies for a `PUT` that flips `enabled`.
    if re_enabled && updated.schedule_kind == crate::domain::models::ScheduleKind::Scheduled {
        updated.last_evaluated_at = Some(now);
    }
    updated.validate()?;
    state.intents.update(&updated).await?;
    Ok(Json(updated))
}

pub async fn execute_intent(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<IntentExecution>, ApiError> {
    let intent = load_owned_intent(&state, user_id, id).await?;
    let opts = ExecuteOptions { trigger_kind: TriggerKind::Manual, trigger_time: None, dry_run_override: None };
    let anchor = IntentExecutor::anchor_for(&opts, Utc::now());
    let summary = state.intent_executor.execute(&intent, user_id, opts).await?;

    let mut updated = intent;
    updated.last_evaluated_at = Some(anchor);
    updated.last_execution_id = Some(summary.execution.id);
    state.intents.update(&updated).await?;

    Ok(Json(summary.execution))
}

pub async fn dry_run_intent(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<IntentExecution>, ApiError> {
    let intent = load_owned_intent(&state, user_id, id).await?;
    let opts = ExecuteOptions { trigger_kind: TriggerKind::Manual, trigger_time: None, dry_run_override: Some(true) };
    let anchor = IntentExecutor::anchor_for(&opts, Utc::now());
    let summary = state.intent_executor.execute(&intent, user_id, opts).await?;

    // spec.md §4.6 step 7: the anchor and lastExecutionId update is
    // unconditional, not gated on dryRun.
    let mut updated = intent;
    updated.last_evaluated_at = Some(anchor);
    updated.last_execution_id = Some(summary.execution.id);
    state.intents.update(&updated).await?;

    Ok(Json(summary.execution))
}

pub async fn preview_intent(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<IntentPreviewResponse>, ApiError> {
    let intent = load_owned_intent(&state, user_id, id).await?;
    let matching_engine = MatchingEngine::new(state.inventory.as_ref(), state.instances.as_ref());

    let matched = matching_engine.find_matching(&intent, user_id, false).await?;
    let upgradeable = matched.iter().filter(|m| m.container.has_update).count();

    Ok(Json(IntentPreviewResponse {
        matched_count: matched.len(),
        upgradeable_count: upgradeable,
        matched: matched.into_iter().map(|m| m.container).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

pub async fn list_executions(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<IntentExecution>>, ApiError> {
    load_owned_intent(&state, user_id, id).await?;
    Ok(Json(state.executions.list_for_intent(id, query.limit.unwrap_or(50)).await?))
}

pub async fn get_execution(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ExecutionDetail>, ApiError> {
    let execution = state.executions.get(id).await?.ok_or(DomainError::ExecutionNotFound(id))?;

    // Authorization is via the owning intent (executions don't carry a
    // denormalized owner column, per the schema in spec.md §6).
    load_owned_intent(&state, user_id, execution.intent_id).await?;

    let containers = state.executions.list_container_rows(id).await?;
    Ok(Json(ExecutionDetail { execution, containers }))
}
