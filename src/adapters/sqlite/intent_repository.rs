//! SQLite-backed `Intent` / `IntentExecution` persistence (spec.md §3, §6).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ContainerOutcome, ExecutionStatus, Intent, IntentExecution, IntentExecutionContainer, IntentPatterns,
    ScheduleKind, TriggerKind,
};
use crate::domain::ports::{IntentExecutionRepository, IntentRepository};

fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
}

fn parse_optional_uuid(s: Option<String>) -> DomainResult<Option<Uuid>> {
    s.map(|s| Uuid::parse_str(&s)).transpose().map_err(|e| DomainError::SerializationError(e.to_string()))
}

fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc)).map_err(|e| DomainError::SerializationError(e.to_string()))
}

fn parse_optional_datetime(s: Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    s.map(|s| DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
        .transpose()
        .map_err(|e| DomainError::SerializationError(e.to_string()))
}

fn json_vec<T: serde::de::DeserializeOwned>(s: &str) -> DomainResult<Vec<T>> {
    Ok(serde_json::from_str(s)?)
}

#[derive(sqlx::FromRow)]
struct IntentRow {
    id: String,
    user_id: i64,
    name: String,
    description: Option<String>,
    enabled: bool,
    schedule_kind: String,
    schedule_cron: Option<String>,
    dry_run: bool,
    match_containers_json: String,
    match_images_json: String,
    match_instances_json: String,
    match_stacks_json: String,
    match_registries_json: String,
    exclude_containers_json: String,
    exclude_images_json: String,
    exclude_stacks_json: String,
    exclude_registries_json: String,
    last_evaluated_at: Option<String>,
    last_execution_id: Option<String>,
    created_at: String,
}

impl TryFrom<IntentRow> for Intent {
    type Error = DomainError;

    fn try_from(row: IntentRow) -> Result<Self, Self::Error> {
        use std::str::FromStr;
        Ok(Intent {
            id: parse_uuid(&row.id)?,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            enabled: row.enabled,
            schedule_kind: ScheduleKind::from_str(&row.schedule_kind).map_err(DomainError::SerializationError)?,
            schedule_cron: row.schedule_cron,
            dry_run: row.dry_run,
            patterns: IntentPatterns {
                match_containers: json_vec(&row.match_containers_json)?,
                match_images: json_vec(&row.match_images_json)?,
                match_instances: json_vec(&row.match_instances_json)?,
                match_stacks: json_vec(&row.match_stacks_json)?,
                match_registries: json_vec(&row.match_registries_json)?,
                exclude_containers: json_vec(&row.exclude_containers_json)?,
                exclude_images: json_vec(&row.exclude_images_json)?,
                exclude_stacks: json_vec(&row.exclude_stacks_json)?,
                exclude_registries: json_vec(&row.exclude_registries_json)?,
            },
            last_evaluated_at: parse_optional_datetime(row.last_evaluated_at)?,
            last_execution_id: parse_optional_uuid(row.last_execution_id)?,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(Clone)]
pub struct SqliteIntentRepository {
    pool: SqlitePool,
}

impl SqliteIntentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntentRepository for SqliteIntentRepository {
    async fn create(&self, intent: &Intent) -> DomainResult<()> {
        let p = &intent.patterns;
        sqlx::query(
            r#"INSERT INTO intents (
                id, user_id, name, description, enabled, schedule_kind, schedule_cron, dry_run,
                match_containers_json, match_images_json, match_instances_json, match_stacks_json, match_registries_json,
                exclude_containers_json, exclude_images_json, exclude_stacks_json, exclude_registries_json,
                last_evaluated_at, last_execution_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(intent.id.to_string())
        .bind(intent.user_id)
        .bind(&intent.name)
        .bind(&intent.description)
        .bind(intent.enabled)
        .bind(intent.schedule_kind.as_str())
        .bind(&intent.schedule_cron)
        .bind(intent.dry_run)
        .bind(serde_json::to_string(&p.match_containers)?)
        .bind(serde_json::to_string(&p.match_images)?)
        .bind(serde_json::to_string(&p.match_instances)?)
        .bind(serde_json::to_string(&p.match_stacks)?)
        .bind(serde_json::to_string(&p.match_registries)?)
        .bind(serde_json::to_string(&p.exclude_containers)?)
        .bind(serde_json::to_string(&p.exclude_images)?)
        .bind(serde_json::to_string(&p.exclude_stacks)?)
        .bind(serde_json::to_string(&p.exclude_registries)?)
        .bind(intent.last_evaluated_at.map(|d| d.to_rfc3339()))
        .bind(intent.last_execution_id.map(|id| id.to_string()))
        .bind(intent.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Intent>> {
        let row: Option<IntentRow> = sqlx::query_as(
            r#"SELECT id, user_id, name, description, enabled, schedule_kind, schedule_cron, dry_run,
                match_containers_json, match_images_json, match_instances_json, match_stacks_json, match_registries_json,
                exclude_containers_json, exclude_images_json, exclude_stacks_json, exclude_registries_json,
                last_evaluated_at, last_execution_id, created_at
               FROM intents WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Intent::try_from).transpose()
    }

    async fn update(&self, intent: &Intent) -> DomainResult<()> {
        let p = &intent.patterns;
        let result = sqlx::query(
            r#"UPDATE intents SET
                name = ?, description = ?, enabled = ?, schedule_kind = ?, schedule_cron = ?, dry_run = ?,
                match_containers_json = ?, match_images_json = ?, match_instances_json = ?, match_stacks_json = ?, match_registries_json = ?,
                exclude_containers_json = ?, exclude_images_json = ?, exclude_stacks_json = ?, exclude_registries_json = ?,
                last_evaluated_at = ?, last_execution_id = ?
               WHERE id = ?"#,
        )
        .bind(&intent.name)
        .bind(&intent.description)
        .bind(intent.enabled)
        .bind(intent.schedule_kind.as_str())
        .bind(&intent.schedule_cron)
        .bind(intent.dry_run)
        .bind(serde_json::to_string(&p.match_containers)?)
        .bind(serde_json::to_string(&p.match_images)?)
        .bind(serde_json::to_string(&p.match_instances)?)
        .bind(serde_json::to_string(&p.match_stacks)?)
        .bind(serde_json::to_string(&p.match_registries)?)
        .bind(serde_json::to_string(&p.exclude_containers)?)
        .bind(serde_json::to_string(&p.exclude_images)?)
        .bind(serde_json::to_string(&p.exclude_stacks)?)
        .bind(serde_json::to_string(&p.exclude_registries)?)
        .bind(intent.last_evaluated_at.map(|d| d.to_rfc3339()))
        .bind(intent.last_execution_id.map(|id| id.to_string()))
        .bind(intent.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::IntentNotFound(intent.id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM intents WHERE id = ?").bind(id.to_string()).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::IntentNotFound(id));
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: i64) -> DomainResult<Vec<Intent>> {
        let rows: Vec<IntentRow> = sqlx::query_as(
            r#"SELECT id, user_id, name, description, enabled, schedule_kind, schedule_cron, dry_run,
                match_containers_json, match_images_json, match_instances_json, match_stacks_json, match_registries_json,
                exclude_containers_json, exclude_images_json, exclude_stacks_json, exclude_registries_json,
                last_evaluated_at, last_execution_id, created_at
               FROM intents WHERE user_id = ? ORDER BY created_at"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Intent::try_from).collect()
    }

    async fn list_enabled_scheduled(&self) -> DomainResult<Vec<Intent>> {
        let rows: Vec<IntentRow> = sqlx::query_as(
            r#"SELECT id, user_id, name, description, enabled, schedule_kind, schedule_cron, dry_run,
                match_containers_json, match_images_json, match_instances_json, match_stacks_json, match_registries_json,
                exclude_containers_json, exclude_images_json, exclude_stacks_json, exclude_registries_json,
                last_evaluated_at, last_execution_id, created_at
               FROM intents WHERE enabled = 1 AND schedule_kind = 'scheduled'"#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Intent::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ExecutionRow {
    id: String,
    intent_id: String,
    user_id: i64,
    trigger_kind: String,
    status: String,
    containers_matched: i64,
    containers_upgraded: i64,
    containers_failed: i64,
    containers_skipped: i64,
    duration_ms: Option<i64>,
    error_message: Option<String>,
    started_at: String,
    completed_at: Option<String>,
}

impl TryFrom<ExecutionRow> for IntentExecution {
    type Error = DomainError;

    fn try_from(row: ExecutionRow) -> Result<Self, Self::Error> {
        use std::str::FromStr;
        Ok(IntentExecution {
            id: parse_uuid(&row.id)?,
            intent_id: parse_uuid(&row.intent_id)?,
            user_id: row.user_id,
            trigger_kind: TriggerKind::from_str(&row.trigger_kind).map_err(DomainError::SerializationError)?,
            status: ExecutionStatus::from_str(&row.status).map_err(DomainError::SerializationError)?,
            containers_matched: row.containers_matched as u32,
            containers_upgraded: row.containers_upgraded as u32,
            containers_failed: row.containers_failed as u32,
            containers_skipped: row.containers_skipped as u32,
            duration_ms: row.duration_ms,
            error_message: row.error_message,
            started_at: parse_datetime(&row.started_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ExecutionContainerRow {
    id: String,
    execution_id: String,
    container_id: String,
    container_name: String,
    image: String,
    instance_id: i64,
    status: String,
    old_image: Option<String>,
    new_image: Option<String>,
    old_digest: Option<String>,
    new_digest: Option<String>,
    error_message: Option<String>,
    duration_ms: Option<i64>,
}

impl TryFrom<ExecutionContainerRow> for IntentExecutionContainer {
    type Error = DomainError;

    fn try_from(row: ExecutionContainerRow) -> Result<Self, Self::Error> {
        use std::str::FromStr;
        Ok(IntentExecutionContainer {
            id: parse_uuid(&row.id)?,
            execution_id: parse_uuid(&row.execution_id)?,
            container_id: row.container_id,
            container_name: row.container_name,
            image: row.image,
            instance_id: row.instance_id,
            status: ContainerOutcome::from_str(&row.status).map_err(DomainError::SerializationError)?,
            old_image: row.old_image,
            new_image: row.new_image,
            old_digest: row.old_digest,
            new_digest: row.new_digest,
            error_message: row.error_message,
            duration_ms: row.duration_ms,
        })
    }
}

#[derive(Clone)]
pub struct SqliteIntentExecutionRepository {
    pool: SqlitePool,
}

impl SqliteIntentExecutionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntentExecutionRepository for SqliteIntentExecutionRepository {
    async fn create(&self, execution: &IntentExecution) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO intent_executions (
                id, intent_id, user_id, trigger_kind, status, containers_matched, containers_upgraded,
                containers_failed, containers_skipped, duration_ms, error_message, started_at, completed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(execution.id.to_string())
        .bind(execution.intent_id.to_string())
        .bind(execution.user_id)
        .bind(execution.trigger_kind.as_str())
        .bind(execution.status.as_str())
        .bind(execution.containers_matched)
        .bind(execution.containers_upgraded)
        .bind(execution.containers_failed)
        .bind(execution.containers_skipped)
        .bind(execution.duration_ms)
        .bind(&execution.error_message)
        .bind(execution.started_at.to_rfc3339())
        .bind(execution.completed_at.map(|d| d.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, execution: &IntentExecution) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE intent_executions SET
                status = ?, containers_matched = ?, containers_upgraded = ?, containers_failed = ?,
                containers_skipped = ?, duration_ms = ?, error_message = ?, completed_at = ?
               WHERE id = ?"#,
        )
        .bind(execution.status.as_str())
        .bind(execution.containers_matched)
        .bind(execution.containers_upgraded)
        .bind(execution.containers_failed)
        .bind(execution.containers_skipped)
        .bind(execution.duration_ms)
        .bind(&execution.error_message)
        .bind(execution.completed_at.map(|d| d.to_rfc3339()))
        .bind(execution.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ExecutionNotFound(execution.id));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<IntentExecution>> {
        let row: Option<ExecutionRow> = sqlx::query_as(
            r#"SELECT id, intent_id, user_id, trigger_kind, status, containers_matched, containers_upgraded,
                containers_failed, containers_skipped, duration_ms, error_message, started_at, completed_at
               FROM intent_executions WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(IntentExecution::try_from).transpose()
    }

    async fn list_for_intent(&self, intent_id: Uuid, limit: u32) -> DomainResult<Vec<IntentExecution>> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(
            r#"SELECT id, intent_id, user_id, trigger_kind, status, containers_matched, containers_upgraded,
                containers_failed, containers_skipped, duration_ms, error_message, started_at, completed_at
               FROM intent_executions WHERE intent_id = ? ORDER BY started_at DESC LIMIT ?"#,
        )
        .bind(intent_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(IntentExecution::try_from).collect()
    }

    async fn has_running(&self, intent_id: Uuid) -> DomainResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM intent_executions WHERE intent_id = ? AND status = 'running' LIMIT 1")
            .bind(intent_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn add_container_row(&self, row: &IntentExecutionContainer) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO intent_execution_containers (
                id, execution_id, container_id, container_name, image, instance_id, status,
                old_image, new_image, old_digest, new_digest, error_message, duration_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(row.id.to_string())
        .bind(row.execution_id.to_string())
        .bind(&row.container_id)
        .bind(&row.container_name)
        .bind(&row.image)
        .bind(row.instance_id)
        .bind(row.status.as_str())
        .bind(&row.old_image)
        .bind(&row.new_image)
        .bind(&row.old_digest)
        .bind(&row.new_digest)
        .bind(&row.error_message)
        .bind(row.duration_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_container_rows(&self, execution_id: Uuid) -> DomainResult<Vec<IntentExecutionContainer>> {
        let rows: Vec<ExecutionContainerRow> = sqlx::query_as(
            r#"SELECT id, execution_id, container_id, container_name, image, instance_id, status,
                old_image, new_image, old_digest, new_digest, error_message, duration_ms
               FROM intent_execution_containers WHERE execution_id = ?"#,
        )
        .bind(execution_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(IntentExecutionContainer::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::connection::create_migrated_test_pool;
    use crate::domain::models::ScheduleKind;
    use chrono::Utc;

    fn sample_intent() -> Intent {
        Intent {
            id: Uuid::new_v4(),
            user_id: 1,
            name: "nightly".into(),
            description: None,
            enabled: true,
            schedule_kind: ScheduleKind::Scheduled,
            schedule_cron: Some("0 3 * * *".into()),
            dry_run: false,
            patterns: IntentPatterns { match_images: vec!["acme/*".into()], ..Default::default() },
            last_evaluated_at: None,
            last_execution_id: None,
            created_at: Utc::now(),
        }
    }

    async fn seed_user(pool: &SqlitePool) {
        sqlx::query("INSERT INTO users (id, username) VALUES (1, 'alice')").execute(pool).await.unwrap();
    }

    #[tokio::test]
    async fn round_trips_intent_with_pattern_arrays() {
        let pool = create_migrated_test_pool().await.unwrap();
        seed_user(&pool).await;
        let repo = SqliteIntentRepository::new(pool);
        let intent = sample_intent();

        repo.create(&intent).await.unwrap();
        let fetched = repo.get(intent.id).await.unwrap().unwrap();

        assert_eq!(fetched.name, "nightly");
        assert_eq!(fetched.patterns.match_images, vec!["acme/*".to_string()]);
        assert_eq!(fetched.schedule_cron.as_deref(), Some("0 3 * * *"));
    }

    #[tokio::test]
    async fn update_persists_anchor_and_not_found_on_unknown_id() {
        let pool = create_migrated_test_pool().await.unwrap();
        seed_user(&pool).await;
        let repo = SqliteIntentRepository::new(pool);
        let mut intent = sample_intent();
        repo.create(&intent).await.unwrap();

        intent.last_evaluated_at = Some(Utc::now());
        repo.update(&intent).await.unwrap();
        let fetched = repo.get(intent.id).await.unwrap().unwrap();
        assert!(fetched.last_evaluated_at.is_some());

        let mut missing = sample_intent();
        missing.id = Uuid::new_v4();
        assert!(repo.update(&missing).await.is_err());
    }

    #[tokio::test]
    async fn list_enabled_scheduled_excludes_disabled_and_immediate() {
        let pool = create_migrated_test_pool().await.unwrap();
        seed_user(&pool).await;
        let repo = SqliteIntentRepository::new(pool);

        let scheduled = sample_intent();
        repo.create(&scheduled).await.unwrap();

        let mut disabled = sample_intent();
        disabled.id = Uuid::new_v4();
        disabled.enabled = false;
        repo.create(&disabled).await.unwrap();

        let mut immediate = sample_intent();
        immediate.id = Uuid::new_v4();
        immediate.schedule_kind = ScheduleKind::Immediate;
        immediate.schedule_cron = None;
        repo.create(&immediate).await.unwrap();

        let found = repo.list_enabled_scheduled().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, scheduled.id);
    }
}
