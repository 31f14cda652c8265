//! SQLite-backed `BatchRun` / `BatchJobConfig` persistence (spec.md §4.8).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BatchJobConfig, BatchRun, BatchRunStatus, JobKind};
use crate::domain::ports::{BatchJobConfigRepository, BatchRunRepository};

fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
}

fn parse_optional_datetime(s: Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    s.map(|s| DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
        .transpose()
        .map_err(|e| DomainError::SerializationError(e.to_string()))
}

#[derive(sqlx::FromRow)]
struct BatchRunRow {
    id: String,
    job_kind: String,
    status: String,
    started_at: String,
    completed_at: Option<String>,
    duration_ms: Option<i64>,
    containers_checked: i64,
    containers_updated: i64,
    error_message: Option<String>,
    is_manual: bool,
    logs: String,
}

impl TryFrom<BatchRunRow> for BatchRun {
    type Error = DomainError;

    fn try_from(row: BatchRunRow) -> Result<Self, Self::Error> {
        use std::str::FromStr;
        Ok(BatchRun {
            id: parse_uuid(&row.id)?,
            job_kind: JobKind::from_str(&row.job_kind).map_err(DomainError::SerializationError)?,
            status: BatchRunStatus::from_str(&row.status).map_err(DomainError::SerializationError)?,
            started_at: DateTime::parse_from_rfc3339(&row.started_at)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| DomainError::SerializationError(e.to_string()))?,
            completed_at: parse_optional_datetime(row.completed_at)?,
            duration_ms: row.duration_ms,
            containers_checked: row.containers_checked as u32,
            containers_updated: row.containers_updated as u32,
            error_message: row.error_message,
            is_manual: row.is_manual,
            logs: row.logs,
        })
    }
}

#[derive(Clone)]
pub struct SqliteBatchRunRepository {
    pool: SqlitePool,
}

impl SqliteBatchRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchRunRepository for SqliteBatchRunRepository {
    async fn create(&self, run: &BatchRun) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO batch_runs (
                id, job_kind, status, started_at, completed_at, duration_ms,
                containers_checked, containers_updated, error_message, is_manual, logs
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(run.id.to_string())
        .bind(run.job_kind.as_str())
        .bind(run.status.as_str())
        .bind(run.started_at.to_rfc3339())
        .bind(run.completed_at.map(|d| d.to_rfc3339()))
        .bind(run.duration_ms)
        .bind(run.containers_checked)
        .bind(run.containers_updated)
        .bind(&run.error_message)
        .bind(run.is_manual)
        .bind(&run.logs)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, run: &BatchRun) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE batch_runs SET
                status = ?, completed_at = ?, duration_ms = ?, containers_checked = ?,
                containers_updated = ?, error_message = ?, logs = ?
               WHERE id = ?"#,
        )
        .bind(run.status.as_str())
        .bind(run.completed_at.map(|d| d.to_rfc3339()))
        .bind(run.duration_ms)
        .bind(run.containers_checked)
        .bind(run.containers_updated)
        .bind(&run.error_message)
        .bind(&run.logs)
        .bind(run.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ValidationFailed(format!("batch run {} not found", run.id)));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<BatchRun>> {
        let row: Option<BatchRunRow> = sqlx::query_as(
            r#"SELECT id, job_kind, status, started_at, completed_at, duration_ms,
                containers_checked, containers_updated, error_message, is_manual, logs
               FROM batch_runs WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(BatchRun::try_from).transpose()
    }

    async fn list_recent(&self, limit: u32) -> DomainResult<Vec<BatchRun>> {
        let rows: Vec<BatchRunRow> = sqlx::query_as(
            r#"SELECT id, job_kind, status, started_at, completed_at, duration_ms,
                containers_checked, containers_updated, error_message, is_manual, logs
               FROM batch_runs ORDER BY started_at DESC LIMIT ?"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BatchRun::try_from).collect()
    }

    async fn latest(&self, job_kind: Option<JobKind>) -> DomainResult<Vec<BatchRun>> {
        let rows: Vec<BatchRunRow> = match job_kind {
            Some(kind) => {
                sqlx::query_as(
                    r#"SELECT id, job_kind, status, started_at, completed_at, duration_ms,
                        containers_checked, containers_updated, error_message, is_manual, logs
                       FROM batch_runs WHERE job_kind = ? ORDER BY started_at DESC LIMIT 1"#,
                )
                .bind(kind.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"SELECT br.id, br.job_kind, br.status, br.started_at, br.completed_at, br.duration_ms,
                        br.containers_checked, br.containers_updated, br.error_message, br.is_manual, br.logs
                       FROM batch_runs br
                       INNER JOIN (
                           SELECT job_kind, MAX(started_at) AS max_started_at FROM batch_runs GROUP BY job_kind
                       ) latest ON latest.job_kind = br.job_kind AND latest.max_started_at = br.started_at"#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(BatchRun::try_from).collect()
    }

    async fn has_running(&self, job_kind: JobKind) -> DomainResult<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM batch_runs WHERE job_kind = ? AND status = 'running' LIMIT 1")
                .bind(job_kind.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }
}

#[derive(sqlx::FromRow)]
struct BatchJobConfigRow {
    user_id: i64,
    job_kind: String,
    enabled: bool,
    interval_minutes: i64,
    log_level: String,
}

impl TryFrom<BatchJobConfigRow> for BatchJobConfig {
    type Error = DomainError;

    fn try_from(row: BatchJobConfigRow) -> Result<Self, Self::Error> {
        use std::str::FromStr;
        Ok(BatchJobConfig {
            user_id: row.user_id,
            job_kind: JobKind::from_str(&row.job_kind).map_err(DomainError::SerializationError)?,
            enabled: row.enabled,
            interval_minutes: row.interval_minutes as u32,
            log_level: row.log_level,
        })
    }
}

#[derive(Clone)]
pub struct SqliteBatchJobConfigRepository {
    pool: SqlitePool,
}

impl SqliteBatchJobConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchJobConfigRepository for SqliteBatchJobConfigRepository {
    async fn get(&self, user_id: i64, job_kind: JobKind) -> DomainResult<Option<BatchJobConfig>> {
        let row: Option<BatchJobConfigRow> = sqlx::query_as(
            "SELECT user_id, job_kind, enabled, interval_minutes, log_level FROM batch_job_configs WHERE user_id = ? AND job_kind = ?",
        )
        .bind(user_id)
        .bind(job_kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(BatchJobConfig::try_from).transpose()
    }

    async fn upsert(&self, config: &BatchJobConfig) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO batch_job_configs (user_id, job_kind, enabled, interval_minutes, log_level)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(user_id, job_kind) DO UPDATE SET
                 enabled = excluded.enabled, interval_minutes = excluded.interval_minutes, log_level = excluded.log_level"#,
        )
        .bind(config.user_id)
        .bind(config.job_kind.as_str())
        .bind(config.enabled)
        .bind(config.interval_minutes)
        .bind(&config.log_level)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_enabled(&self, job_kind: JobKind) -> DomainResult<Vec<BatchJobConfig>> {
        let rows: Vec<BatchJobConfigRow> = sqlx::query_as(
            "SELECT user_id, job_kind, enabled, interval_minutes, log_level FROM batch_job_configs WHERE job_kind = ? AND enabled = 1",
        )
        .bind(job_kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BatchJobConfig::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::connection::create_migrated_test_pool;

    async fn seed_user(pool: &SqlitePool) {
        sqlx::query("INSERT INTO users (id, username) VALUES (1, 'alice')").execute(pool).await.unwrap();
    }

    #[tokio::test]
    async fn has_running_reflects_status_transitions() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteBatchRunRepository::new(pool);
        let mut run = BatchRun::start(JobKind::RegistrySweep, false);
        repo.create(&run).await.unwrap();

        assert!(repo.has_running(JobKind::RegistrySweep).await.unwrap());
        assert!(!repo.has_running(JobKind::TrackedAppSweep).await.unwrap());

        run.status = BatchRunStatus::Completed;
        run.completed_at = Some(Utc::now());
        repo.update(&run).await.unwrap();

        assert!(!repo.has_running(JobKind::RegistrySweep).await.unwrap());
    }

    #[tokio::test]
    async fn latest_returns_one_row_per_job_kind() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteBatchRunRepository::new(pool);

        let older = BatchRun::start(JobKind::RegistrySweep, false);
        repo.create(&older).await.unwrap();
        let mut newer = BatchRun::start(JobKind::RegistrySweep, false);
        newer.started_at = older.started_at + chrono::Duration::seconds(5);
        repo.create(&newer).await.unwrap();

        let latest = repo.latest(Some(JobKind::RegistrySweep)).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].id, newer.id);

        let all_latest = repo.latest(None).await.unwrap();
        assert_eq!(all_latest.len(), 1);
    }

    #[tokio::test]
    async fn job_config_upsert_and_list_enabled() {
        let pool = create_migrated_test_pool().await.unwrap();
        seed_user(&pool).await;
        let repo = SqliteBatchJobConfigRepository::new(pool);

        let config = BatchJobConfig { user_id: 1, job_kind: JobKind::TrackedAppSweep, enabled: true, interval_minutes: 30, log_level: "info".into() };
        repo.upsert(&config).await.unwrap();

        let fetched = repo.get(1, JobKind::TrackedAppSweep).await.unwrap().unwrap();
        assert_eq!(fetched.interval_minutes, 30);

        assert_eq!(repo.list_enabled(JobKind::TrackedAppSweep).await.unwrap().len(), 1);
        assert!(repo.list_enabled(JobKind::RegistrySweep).await.unwrap().is_empty());
    }
}
