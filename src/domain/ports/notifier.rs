use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events the control plane emits for the (out-of-scope) chat/webhook
/// transport. Treated as `notify(event)` with at-most-once-queued
/// semantics (spec.md §1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    IntentExecutionSummary {
        intent_id: Uuid,
        execution_id: Uuid,
        matched: u32,
        upgraded: u32,
        failed: u32,
        skipped: u32,
    },
    UpstreamUpdateDetected {
        user_id: i64,
        key: String,
        previous_tag: Option<String>,
        new_tag: Option<String>,
    },
    BatchRunFailed {
        job_kind: String,
        run_id: Uuid,
        error: String,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: NotificationEvent);
}
