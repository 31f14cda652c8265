//! Request/response bodies for the HTTP surface (spec.md §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AnnotatedContainer, BatchRun, Intent, IntentExecution, IntentExecutionContainer, IntentPatterns, ScheduleKind,
    UnusedImage,
};

/// Inbound shape of a create/update intent request. Kept separate from
/// the domain `Intent` so wire-field casing and optionality don't leak
/// into the domain model (SPEC_FULL.md §9 design note: "dynamic config
/// objects... model each as an explicit record").
#[derive(Debug, Deserialize)]
pub struct IntentPayload {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub schedule_kind: ScheduleKind,
    pub schedule_cron: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub match_containers: Vec<String>,
    #[serde(default)]
    pub match_images: Vec<String>,
    #[serde(default)]
    pub match_instances: Vec<i64>,
    #[serde(default)]
    pub match_stacks: Vec<String>,
    #[serde(default)]
    pub match_registries: Vec<String>,
    #[serde(default)]
    pub exclude_containers: Vec<String>,
    #[serde(default)]
    pub exclude_images: Vec<String>,
    #[serde(default)]
    pub exclude_stacks: Vec<String>,
    #[serde(default)]
    pub exclude_registries: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl IntentPayload {
    /// Builds and validates a brand-new `Intent` (spec.md §6 `POST
    /// /api/intents`). The anchor-reset rule for fresh scheduled intents
    /// (spec.md §4.7: "initialize `lastEvaluatedAt = now`") is applied here.
    pub fn into_new_intent(self, user_id: i64, now: DateTime<Utc>) -> DomainResult<Intent> {
        let last_evaluated_at = if self.schedule_kind == ScheduleKind::Scheduled { Some(now) } else { None };
        let intent = Intent {
            id: Uuid::new_v4(),
            user_id,
            name: self.name,
            description: self.description,
            enabled: self.enabled,
            schedule_kind: self.schedule_kind,
            schedule_cron: self.schedule_cron,
            dry_run: self.dry_run,
            patterns: self.into_patterns(),
            last_evaluated_at,
            last_execution_id: None,
            created_at: now,
        };
        intent.validate()?;
        Ok(intent)
    }

    /// Applies this payload onto an existing `Intent` (spec.md §6 `PUT
    /// /api/intents/:id`), implementing the anchor-reset preconditions from
    /// spec.md §4.7: a change to `scheduleKind`/`scheduleCron`, or an
    /// `enabled: false -> true` transition on a scheduled intent, resets
    /// `lastEvaluatedAt = now`.
    pub fn apply_to(self, existing: &Intent, now: DateTime<Utc>) -> DomainResult<Intent> {
        let schedule_changed = self.schedule_kind != existing.schedule_kind || self.schedule_cron != existing.schedule_cron;
        let re_enabled = !existing.enabled && self.enabled;

        let last_evaluated_at = if self.schedule_kind == ScheduleKind::Scheduled && (schedule_changed || re_enabled) {
            Some(now)
        } else {
            existing.last_evaluated_at
        };

        let updated = Intent {
            id: existing.id,
            user_id: existing.user_id,
            name: self.name,
            description: self.description,
            enabled: self.enabled,
            schedule_kind: self.schedule_kind,
            schedule_cron: self.schedule_cron,
            dry_run: self.dry_run,
            patterns: self.into_patterns(),
            last_evaluated_at,
            last_execution_id: existing.last_execution_id,
            created_at: existing.created_at,
        };
        updated.validate()?;
        Ok(updated)
    }

    fn into_patterns(self) -> IntentPatterns {
        IntentPatterns {
            match_containers: self.match_containers,
            match_images: self.match_images,
            match_instances: self.match_instances,
            match_stacks: self.match_stacks,
            match_registries: self.match_registries,
            exclude_containers: self.exclude_containers,
            exclude_images: self.exclude_images,
            exclude_stacks: self.exclude_stacks,
            exclude_registries: self.exclude_registries,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeContainerRequest {
    pub instance_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct BatchUpgradeRequest {
    pub containers: Vec<BatchUpgradeTarget>,
}

#[derive(Debug, Deserialize)]
pub struct BatchUpgradeTarget {
    pub instance_id: i64,
    pub container_id: String,
}

#[derive(Debug, Serialize)]
pub struct UpgradeResult {
    pub container_id: String,
    pub success: bool,
    pub old_image: Option<String>,
    pub new_image: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteImagesRequest {
    pub images: Vec<DeleteImageTarget>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteImageTarget {
    pub instance_id: i64,
    pub image_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteImageResult {
    pub id: String,
    pub success: bool,
    pub error: Option<String>,
}

/// One instance/stack group of the `GET /api/containers` response (spec.md
/// §4.2: "grouped upstream by (instance, stack) for rendering"; this
/// grouping is the consumer-side concern the core pushes onto the HTTP
/// layer rather than `ContainerInventoryPort` itself).
#[derive(Debug, Serialize)]
pub struct ContainerGroup {
    pub instance_id: i64,
    pub stack_name: Option<String>,
    pub containers: Vec<AnnotatedContainer>,
}

#[derive(Debug, Serialize)]
pub struct ContainersResponse {
    pub groups: Vec<ContainerGroup>,
    pub unused_image_count: usize,
}

pub fn group_by_instance_and_stack(containers: Vec<AnnotatedContainer>) -> Vec<ContainerGroup> {
    let mut groups: Vec<ContainerGroup> = Vec::new();
    for container in containers {
        match groups.iter_mut().find(|g| g.instance_id == container.instance_id && g.stack_name == container.stack_name) {
            Some(group) => group.containers.push(container),
            None => groups.push(ContainerGroup {
                instance_id: container.instance_id,
                stack_name: container.stack_name.clone(),
                containers: vec![container],
            }),
        }
    }
    groups
}

#[derive(Debug, Serialize)]
pub struct UnusedImagesResponse {
    pub images: Vec<UnusedImage>,
}

#[derive(Debug, Serialize)]
pub struct IntentPreviewResponse {
    pub matched_count: usize,
    pub upgradeable_count: usize,
    pub matched: Vec<AnnotatedContainer>,
}

#[derive(Debug, Serialize)]
pub struct ExecutionDetail {
    #[serde(flatten)]
    pub execution: IntentExecution,
    pub containers: Vec<IntentExecutionContainer>,
}

/// Authorization boundary (spec.md §7): confirms `owner_user_id` owns the
/// entity, surfacing a not-found rather than a distinct forbidden error so
/// existence isn't leaked to callers who don't own it.
pub fn ensure_owned(owner_user_id: i64, caller_user_id: i64) -> DomainResult<()> {
    if owner_user_id != caller_user_id {
        return Err(DomainError::NotOwned);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct BatchRunsResponse {
    pub runs: Vec<BatchRun>,
}
