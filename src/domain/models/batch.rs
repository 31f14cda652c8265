use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two independent periodic sweeps the Batch Job Runner executes
/// (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    RegistrySweep,
    TrackedAppSweep,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegistrySweep => "registry-sweep",
            Self::TrackedAppSweep => "tracked-app-sweep",
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registry-sweep" => Ok(Self::RegistrySweep),
            "tracked-app-sweep" => Ok(Self::TrackedAppSweep),
            other => Err(format!("unknown job kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchRunStatus {
    Running,
    Completed,
    Failed,
}

impl BatchRunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for BatchRunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown batch run status: {other}")),
        }
    }
}

/// One execution of a sweep job, covering all targets for all users
/// (sweeps are global, not per-user, per spec.md §3 invariant: at most
/// one `running` BatchRun per `jobKind`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRun {
    pub id: Uuid,
    pub job_kind: JobKind,
    pub status: BatchRunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub containers_checked: u32,
    pub containers_updated: u32,
    pub error_message: Option<String>,
    pub is_manual: bool,
    pub logs: String,
}

impl BatchRun {
    pub fn start(job_kind: JobKind, is_manual: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_kind,
            status: BatchRunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            containers_checked: 0,
            containers_updated: 0,
            error_message: None,
            is_manual,
            logs: String::new(),
        }
    }
}

/// Per-`(user, jobKind)` schedule configuration for the Batch Job Runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJobConfig {
    pub user_id: i64,
    pub job_kind: JobKind,
    pub enabled: bool,
    pub interval_minutes: u32,
    pub log_level: String,
}
