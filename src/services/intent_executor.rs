//! Orchestrates one execution of an intent (spec.md §4.6).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    ContainerOutcome, ExecutionStatus, Intent, IntentExecution, IntentExecutionContainer, TriggerKind,
};
use crate::domain::ports::{
    ContainerInventoryPort, CredentialProvider, InstanceRepository, IntentExecutionRepository, Notifier,
};
use crate::domain::ports::notifier::NotificationEvent;
use crate::services::lock_manager::{with_lock, LockKey, UpgradeLockManager};
use crate::services::matching_engine::{MatchedContainer, MatchingEngine};
use crate::services::upgrade_executor::UpgradeExecutor;

/// A stack's containers, or a synthetic single-container group for
/// stack-less containers (spec.md §4.6 step 5: `__standalone_N`).
fn group_by_stack(matched: Vec<MatchedContainer>) -> Vec<(String, Vec<MatchedContainer>)> {
    let mut groups: HashMap<String, Vec<MatchedContainer>> = HashMap::new();
    let mut standalone_counter = 0usize;

    for m in matched {
        let key = match &m.container.stack_name {
            Some(stack) => stack.clone(),
            None => {
                let key = format!("__standalone_{standalone_counter}");
                standalone_counter += 1;
                key
            }
        };
        groups.entry(key).or_default().push(m);
    }

    groups.into_iter().collect()
}

#[derive(Clone, Copy)]
pub struct ExecuteOptions {
    pub trigger_kind: TriggerKind,
    /// Present for scheduled triggers (the cron point that fired); absent
    /// for manual/scan_detected triggers, which anchor on wall-clock now.
    pub trigger_time: Option<chrono::DateTime<Utc>>,
    pub dry_run_override: Option<bool>,
}

pub struct ExecutionSummary {
    pub execution: IntentExecution,
}

pub struct IntentExecutor {
    executions: Arc<dyn IntentExecutionRepository>,
    inventory: Arc<dyn ContainerInventoryPort>,
    instances: Arc<dyn InstanceRepository>,
    lock_manager: Arc<UpgradeLockManager>,
    upgrade_executor: Arc<UpgradeExecutor>,
    credentials: Arc<dyn CredentialProvider>,
    notifier: Arc<dyn Notifier>,
}

impl IntentExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        executions: Arc<dyn IntentExecutionRepository>,
        inventory: Arc<dyn ContainerInventoryPort>,
        instances: Arc<dyn InstanceRepository>,
        lock_manager: Arc<UpgradeLockManager>,
        upgrade_executor: Arc<UpgradeExecutor>,
        credentials: Arc<dyn CredentialProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { executions, inventory, instances, lock_manager, upgrade_executor, credentials, notifier }
    }

    /// `execute(intent, userId, {triggerKind, triggerTime?, dryRunOverride?})`.
    ///
    /// Returns the `Intent`'s new `lastEvaluatedAt`/`lastExecutionId` so the
    /// caller (whoever owns the `Intent` row — the Cron Evaluator or an
    /// HTTP handler) can persist the anchor update alongside its own
    /// bookkeeping; this function never mutates `intent` in place.
    pub async fn execute(&self, intent: &Intent, user_id: i64, opts: ExecuteOptions) -> DomainResult<ExecutionSummary> {
        let started_at = Utc::now();
        let matching_engine = MatchingEngine::new(self.inventory.as_ref(), self.instances.as_ref());
        let matched = matching_engine.find_matching(intent, user_id, true).await?;

        let mut execution = IntentExecution::new(intent.id, user_id, opts.trigger_kind, started_at);
        self.executions.create(&execution).await?;

        if matched.is_empty() {
            self.finalize(&mut execution, ExecutionStatus::Completed, None).await?;
            self.maybe_notify(intent, &execution, false).await;
            return Ok(ExecutionSummary { execution });
        }

        let effective_dry_run = opts.dry_run_override.unwrap_or(intent.dry_run);
        execution.containers_matched = matched.len() as u32;

        if effective_dry_run {
            for m in &matched {
                let row = IntentExecutionContainer {
                    id: Uuid::new_v4(),
                    execution_id: execution.id,
                    container_id: m.container.container_id.clone(),
                    container_name: m.container.name.clone(),
                    image: m.container.image.clone(),
                    instance_id: m.container.instance_id,
                    status: ContainerOutcome::DryRun,
                    old_image: Some(m.container.image.clone()),
                    new_image: None,
                    old_digest: None,
                    new_digest: None,
                    error_message: None,
                    duration_ms: None,
                };
                self.executions.add_container_row(&row).await?;
            }
            execution.containers_skipped = matched.len() as u32;
            self.finalize(&mut execution, ExecutionStatus::Completed, None).await?;
            self.maybe_notify(intent, &execution, true).await;
            return Ok(ExecutionSummary { execution });
        }

        let groups = group_by_stack(matched);
        let mut handles = Vec::with_capacity(groups.len());

        for (_stack, containers) in groups {
            let execution_id = execution.id;
            let intent_id = intent.id;
            let lock_manager = self.lock_manager.clone();
            let upgrade_executor = self.upgrade_executor.clone();
            let credentials = self.credentials.clone();

            handles.push(tokio::spawn(async move {
                let mut rows = Vec::with_capacity(containers.len());
                // Strictly sequential within a group (spec.md §5).
                for matched_container in containers {
                    let row = process_container(
                        execution_id,
                        intent_id,
                        user_id,
                        &matched_container,
                        &lock_manager,
                        &upgrade_executor,
                        credentials.as_ref(),
                    )
                    .await;
                    rows.push(row);
                }
                rows
            }));
        }

        // No ordering across groups (spec.md §5): join concurrently.
        for handle in handles {
            match handle.await {
                Ok(rows) => {
                    for row in rows {
                        self.tally(&mut execution, &row);
                        self.executions.add_container_row(&row).await?;
                    }
                }
                Err(e) => warn!(error = %e, "stack group task panicked"),
            }
        }

        let final_status = if execution.containers_failed == 0 {
            ExecutionStatus::Completed
        } else if execution.containers_upgraded == 0 {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Partial
        };

        self.finalize(&mut execution, final_status, None).await?;
        self.maybe_notify(intent, &execution, false).await;
        Ok(ExecutionSummary { execution })
    }

    fn tally(&self, execution: &mut IntentExecution, row: &IntentExecutionContainer) {
        match row.status {
            ContainerOutcome::Upgraded => execution.containers_upgraded += 1,
            ContainerOutcome::Failed => execution.containers_failed += 1,
            ContainerOutcome::Skipped => execution.containers_skipped += 1,
            ContainerOutcome::DryRun => {}
        }
    }

    async fn finalize(&self, execution: &mut IntentExecution, status: ExecutionStatus, error_message: Option<String>) -> DomainResult<()> {
        let completed_at = Utc::now();
        execution.status = status;
        execution.error_message = error_message;
        execution.completed_at = Some(completed_at);
        execution.duration_ms = Some((completed_at - execution.started_at).num_milliseconds());
        self.executions.update(execution).await
    }

    async fn maybe_notify(&self, intent: &Intent, execution: &IntentExecution, dry_run: bool) {
        if dry_run {
            return;
        }
        self.notifier
            .notify(NotificationEvent::IntentExecutionSummary {
                intent_id: intent.id,
                execution_id: execution.id,
                matched: execution.containers_matched,
                upgraded: execution.containers_upgraded,
                failed: execution.containers_failed,
                skipped: execution.containers_skipped,
            })
            .await;
    }

    /// Computes the anchor `Intent.lastEvaluatedAt` should move to after
    /// this execution (spec.md §4.6 "Anchor update rule"): the trigger
    /// time for scheduled triggers, wall-clock now otherwise.
    pub fn anchor_for(opts: &ExecuteOptions, now: chrono::DateTime<Utc>) -> chrono::DateTime<Utc> {
        match opts.trigger_kind {
            TriggerKind::Scheduled => opts.trigger_time.unwrap_or(now),
            TriggerKind::Manual | TriggerKind::ScanDetected => now,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn process_container(
    execution_id: Uuid,
    intent_id: Uuid,
    user_id: i64,
    matched: &MatchedContainer,
    lock_manager: &Arc<UpgradeLockManager>,
    upgrade_executor: &UpgradeExecutor,
    credentials: &dyn CredentialProvider,
) -> IntentExecutionContainer {
    let container = &matched.container;
    let key: LockKey = (container.instance_id, container.container_id.clone());
    let owner = format!("intent:{intent_id}");
    let started = std::time::Instant::now();

    let base_row = || IntentExecutionContainer {
        id: Uuid::new_v4(),
        execution_id,
        container_id: container.container_id.clone(),
        container_name: container.name.clone(),
        image: container.image.clone(),
        instance_id: container.instance_id,
        status: ContainerOutcome::Skipped,
        old_image: None,
        new_image: None,
        old_digest: None,
        new_digest: None,
        error_message: None,
        duration_ms: None,
    };

    match lock_manager.acquire(&key, &owner).await {
        Err(holder) => IntentExecutionContainer {
            error_message: Some(format!("locked-by-{holder}")),
            ..base_row()
        },
        Ok(()) => {
            let credential = credentials
                .credentials_for(user_id, &format!("instance:{}", container.instance_id))
                .await;
            let new_image_ref = container.latest_image_ref();
            let instance_url = container.instance_url.clone();
            let endpoint_id = container.endpoint_id;
            let container_id = container.container_id.clone();
            let old_image = container.image.clone();

            let result = with_lock(lock_manager, key, || async move {
                upgrade_executor
                    .upgrade_one(&instance_url, endpoint_id, &container_id, &old_image, &new_image_ref, credential.as_deref())
                    .await
            })
            .await;

            let duration_ms = started.elapsed().as_millis() as i64;

            match result {
                Ok(outcome) => IntentExecutionContainer {
                    status: ContainerOutcome::Upgraded,
                    old_image: Some(outcome.old_image),
                    new_image: Some(outcome.new_image),
                    duration_ms: Some(duration_ms),
                    ..base_row()
                },
                Err(e) => IntentExecutionContainer {
                    status: ContainerOutcome::Failed,
                    error_message: Some(e.to_string()),
                    duration_ms: Some(duration_ms),
                    ..base_row()
                },
            }
        }
    }
}
