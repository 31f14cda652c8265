use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{BatchJobConfig, BatchRun, JobKind};

#[async_trait]
pub trait BatchRunRepository: Send + Sync {
    async fn create(&self, run: &BatchRun) -> DomainResult<()>;
    async fn update(&self, run: &BatchRun) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<BatchRun>>;
    async fn list_recent(&self, limit: u32) -> DomainResult<Vec<BatchRun>>;
    async fn latest(&self, job_kind: Option<JobKind>) -> DomainResult<Vec<BatchRun>>;
    /// spec.md §3 invariant: exactly one `running` BatchRun per `jobKind`.
    async fn has_running(&self, job_kind: JobKind) -> DomainResult<bool>;
}

#[async_trait]
pub trait BatchJobConfigRepository: Send + Sync {
    async fn get(&self, user_id: i64, job_kind: JobKind) -> DomainResult<Option<BatchJobConfig>>;
    async fn upsert(&self, config: &BatchJobConfig) -> DomainResult<()>;
    /// All users with this job kind enabled, for the scheduler to iterate.
    async fn list_enabled(&self, job_kind: JobKind) -> DomainResult<Vec<BatchJobConfig>>;
}
