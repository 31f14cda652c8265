use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Parses the common five-field cron form (`m h dom mon dow`, spec.md §6)
/// that users author intents with. The `cron` crate's own grammar is the
/// seconds-first six-field form, so a `"0 "` seconds field is prepended
/// before delegating — the single place that translation happens, shared
/// by `Intent::validate` and the Cron Evaluator.
pub fn parse_standard_cron(expr: &str) -> Result<cron::Schedule, cron::error::Error> {
    use std::str::FromStr;
    cron::Schedule::from_str(&format!("0 {expr}"))
}

/// Whether an intent is run on a cron schedule or only on explicit trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Immediate,
    Scheduled,
}

impl ScheduleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Scheduled => "scheduled",
        }
    }
}

impl std::str::FromStr for ScheduleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immediate" => Ok(Self::Immediate),
            "scheduled" => Ok(Self::Scheduled),
            other => Err(format!("unknown schedule kind: {other}")),
        }
    }
}

/// The nine glob/exact-match pattern arrays an intent evaluates a
/// container against (spec.md §3, §4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentPatterns {
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

impl IntentPatterns {
    /// At least one non-empty inclusion array is required at creation time.
    pub fn has_any_inclusion(&self) -> bool {
        !self.match_containers.is_empty()
            || !self.match_images.is_empty()
            || !self.match_instances.is_empty()
            || !self.match_stacks.is_empty()
            || !self.match_registries.is_empty()
    }
}

/// A declarative rule selecting containers and describing when and how to
/// upgrade them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub id: Uuid,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub schedule_kind: ScheduleKind,
    pub schedule_cron: Option<String>,
    pub dry_run: bool,
    pub patterns: IntentPatterns,
    pub last_evaluated_at: Option<DateTime<Utc>>,
    pub last_execution_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Intent {
    /// Validates the invariants from spec.md §3: schedule_cron required and
    /// parseable when scheduled, at least one non-empty inclusion array,
    /// name length 1..=100.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.is_empty() || self.name.chars().count() > 100 {
            return Err(DomainError::ValidationFailed(
                "name must be 1-100 characters".into(),
            ));
        }

        if self.schedule_kind == ScheduleKind::Scheduled {
            let cron_expr = self.schedule_cron.as_deref().ok_or_else(|| {
                DomainError::ValidationFailed("schedule_cron is required when scheduled".into())
            })?;
            parse_standard_cron(cron_expr).map_err(|e| {
                DomainError::ValidationFailed(format!("invalid cron expression '{cron_expr}': {e}"))
            })?;
        }

        if !self.patterns.has_any_inclusion() {
            return Err(DomainError::ValidationFailed(
                "at least one inclusion pattern array must be non-empty".into(),
            ));
        }

        Ok(())
    }
}

/// What caused an `IntentExecution` to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Manual,
    Scheduled,
    /// Reserved for a future feature: no scheduler currently emits this
    /// (spec.md §9 Open Questions). The enum value exists so execution
    /// rows can represent it once a detector is wired up.
    ScanDetected,
}

impl TriggerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
            Self::ScanDetected => "scan_detected",
        }
    }
}

impl std::str::FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "scheduled" => Ok(Self::Scheduled),
            "scan_detected" => Ok(Self::ScanDetected),
            other => Err(format!("unknown trigger kind: {other}")),
        }
    }
}

/// Lifecycle status of an `IntentExecution`. Terminal once not `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Partial,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::Running
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// One run of `Intent Executor::execute` (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentExecution {
    pub id: Uuid,
    pub intent_id: Uuid,
    pub user_id: i64,
    pub trigger_kind: TriggerKind,
    pub status: ExecutionStatus,
    pub containers_matched: u32,
    pub containers_upgraded: u32,
    pub containers_failed: u32,
    pub containers_skipped: u32,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl IntentExecution {
    pub fn new(intent_id: Uuid, user_id: i64, trigger_kind: TriggerKind, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            intent_id,
            user_id,
            trigger_kind,
            status: ExecutionStatus::Running,
            containers_matched: 0,
            containers_upgraded: 0,
            containers_failed: 0,
            containers_skipped: 0,
            duration_ms: None,
            error_message: None,
            started_at,
            completed_at: None,
        }
    }

    /// Invariant from spec.md §8: matched == upgraded + failed + skipped
    /// once terminal.
    pub fn counters_balance(&self) -> bool {
        self.containers_matched
            == self.containers_upgraded + self.containers_failed + self.containers_skipped
    }
}

/// Per-container outcome of one `IntentExecution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerOutcome {
    Upgraded,
    Failed,
    Skipped,
    DryRun,
}

impl ContainerOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upgraded => "upgraded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::DryRun => "dry_run",
        }
    }
}

impl std::str::FromStr for ContainerOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upgraded" => Ok(Self::Upgraded),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            "dry_run" => Ok(Self::DryRun),
            other => Err(format!("unknown container outcome: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentExecutionContainer {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub container_id: String,
    pub container_name: String,
    pub image: String,
    pub instance_id: i64,
    pub status: ContainerOutcome,
    pub old_image: Option<String>,
    pub new_image: Option<String>,
    pub old_digest: Option<String>,
    pub new_digest: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
}
