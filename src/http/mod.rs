//! REST surface over the control plane (spec.md §6), grouped by resource
//! the way the table there is: containers, intents, executions, batch.

pub mod auth;
pub mod batch;
pub mod containers;
pub mod dto;
pub mod error;
pub mod intents;

use std::collections::VecDeque;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domain::ports::notifier::NotificationEvent;
use crate::domain::ports::{
    BatchRunRepository, ContainerInventoryPort, CredentialProvider, EndpointClient, InstanceRepository,
    IntentExecutionRepository, IntentRepository,
};
use crate::services::batch_runner::BatchRunner;
use crate::services::intent_executor::IntentExecutor;
use crate::services::lock_manager::UpgradeLockManager;
use crate::services::upgrade_executor::UpgradeExecutor;

/// Everything a handler needs, shared behind `Arc` the way the teacher's
/// MCP `*AppState` structs bundle their services for `Router::with_state`.
#[derive(Clone)]
pub struct AppState {
    pub intents: Arc<dyn IntentRepository>,
    pub executions: Arc<dyn IntentExecutionRepository>,
    pub instances: Arc<dyn InstanceRepository>,
    pub inventory: Arc<dyn ContainerInventoryPort>,
    pub endpoint_client: Arc<dyn EndpointClient>,
    pub lock_manager: Arc<UpgradeLockManager>,
    pub upgrade_executor: Arc<UpgradeExecutor>,
    pub intent_executor: Arc<IntentExecutor>,
    pub batch_runs: Arc<dyn BatchRunRepository>,
    pub batch_runner: Arc<BatchRunner>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub recent_notifications: Arc<Mutex<VecDeque<NotificationEvent>>>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/containers", get(containers::list_containers))
        .route("/api/containers/:id/upgrade", post(containers::upgrade_container))
        .route("/api/containers/batch-upgrade", post(containers::batch_upgrade))
        .route("/api/images/unused", get(containers::list_unused_images))
        .route("/api/images/delete", post(containers::delete_images))
        .route("/api/intents", get(intents::list_intents).post(intents::create_intent))
        .route(
            "/api/intents/:id",
            get(intents::get_intent).put(intents::update_intent).delete(intents::delete_intent),
        )
        .route("/api/intents/:id/toggle", post(intents::toggle_intent))
        .route("/api/intents/:id/execute", post(intents::execute_intent))
        .route("/api/intents/:id/dry-run", post(intents::dry_run_intent))
        .route("/api/intents/:id/preview", get(intents::preview_intent))
        .route("/api/intents/:id/executions", get(intents::list_executions))
        .route("/api/executions/:id", get(intents::get_execution))
        .route("/api/batch/runs", get(batch::list_runs))
        .route("/api/batch/runs/latest", get(batch::latest_run))
        .route("/api/batch/trigger/:job_kind", post(batch::trigger))
        .route("/api/notifications/recent", get(batch::recent_notifications))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
