//! `/api/batch` handlers (spec.md §6) and the notification ring buffer
//! the Notifier service maintains for operator visibility.

use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::domain::models::JobKind;
use crate::domain::ports::notifier::NotificationEvent;

use super::auth::AuthenticatedUser;
use super::dto::BatchRunsResponse;
use super::error::ApiError;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

pub async fn list_runs(State(state): State<AppState>, Query(query): Query<LimitQuery>) -> Result<Json<BatchRunsResponse>, ApiError> {
    let runs = state.batch_runs.list_recent(query.limit.unwrap_or(20)).await?;
    Ok(Json(BatchRunsResponse { runs }))
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub by_job_type: Option<bool>,
}

pub async fn latest_run(State(state): State<AppState>, Query(query): Query<LatestQuery>) -> Result<Json<BatchRunsResponse>, ApiError> {
    if query.by_job_type.unwrap_or(false) {
        let mut runs = Vec::new();
        for job_kind in [JobKind::RegistrySweep, JobKind::TrackedAppSweep] {
            runs.extend(state.batch_runs.latest(Some(job_kind)).await?.into_iter().take(1));
        }
        Ok(Json(BatchRunsResponse { runs }))
    } else {
        Ok(Json(BatchRunsResponse { runs: state.batch_runs.latest(None).await?.into_iter().take(1).collect() }))
    }
}

pub async fn trigger(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(job_kind): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let job_kind: JobKind = job_kind.parse().map_err(ApiError::BadRequest)?;
    let run_id = state.batch_runner.run_now(job_kind, HashSet::from([user_id])).await?;
    Ok(Json(serde_json::json!({"run_id": run_id})))
}

pub async fn recent_notifications(State(state): State<AppState>) -> Json<Vec<NotificationEvent>> {
    let ring = state.recent_notifications.lock().await;
    Json(ring.iter().cloned().collect())
}
