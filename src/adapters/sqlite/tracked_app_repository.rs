//! SQLite-backed `TrackedApp` / `LatestDescriptor` persistence (spec.md §3).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{LatestDescriptor, SourceKind, TrackedApp};
use crate::domain::ports::{LatestDescriptorRepository, TrackedAppRepository};

fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
}

fn parse_optional_datetime(s: Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    s.map(|s| DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
        .transpose()
        .map_err(|e| DomainError::SerializationError(e.to_string()))
}

#[derive(sqlx::FromRow)]
struct TrackedAppRow {
    id: String,
    user_id: i64,
    name: String,
    source_kind: String,
    source_ref: String,
    current_version: Option<String>,
    current_digest: Option<String>,
    latest_version: Option<String>,
    latest_digest: Option<String>,
    current_published_at: Option<String>,
    latest_published_at: Option<String>,
    has_update: bool,
    last_checked: Option<String>,
    forge_token_cipher: Option<String>,
}

impl TryFrom<TrackedAppRow> for TrackedApp {
    type Error = DomainError;

    fn try_from(row: TrackedAppRow) -> Result<Self, Self::Error> {
        use std::str::FromStr;
        Ok(TrackedApp {
            id: parse_uuid(&row.id)?,
            user_id: row.user_id,
            name: row.name,
            source_kind: SourceKind::from_str(&row.source_kind).map_err(DomainError::SerializationError)?,
            source_ref: row.source_ref,
            current_version: row.current_version,
            current_digest: row.current_digest,
            latest_version: row.latest_version,
            latest_digest: row.latest_digest,
            current_published_at: parse_optional_datetime(row.current_published_at)?,
            latest_published_at: parse_optional_datetime(row.latest_published_at)?,
            has_update: row.has_update,
            last_checked: parse_optional_datetime(row.last_checked)?,
            forge_token: row.forge_token_cipher,
        })
    }
}

#[derive(Clone)]
pub struct SqliteTrackedAppRepository {
    pool: SqlitePool,
}

impl SqliteTrackedAppRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackedAppRepository for SqliteTrackedAppRepository {
    async fn create(&self, app: &TrackedApp) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO tracked_apps (
                id, user_id, name, source_kind, source_ref, current_version, current_digest,
                latest_version, latest_digest, current_published_at, latest_published_at,
                has_update, last_checked, forge_token_cipher
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(app.id.to_string())
        .bind(app.user_id)
        .bind(&app.name)
        .bind(app.source_kind.as_str())
        .bind(&app.source_ref)
        .bind(&app.current_version)
        .bind(&app.current_digest)
        .bind(&app.latest_version)
        .bind(&app.latest_digest)
        .bind(app.current_published_at.map(|d| d.to_rfc3339()))
        .bind(app.latest_published_at.map(|d| d.to_rfc3339()))
        .bind(app.has_update)
        .bind(app.last_checked.map(|d| d.to_rfc3339()))
        .bind(&app.forge_token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, app: &TrackedApp) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE tracked_apps SET
                name = ?, source_kind = ?, source_ref = ?, current_version = ?, current_digest = ?,
                latest_version = ?, latest_digest = ?, current_published_at = ?, latest_published_at = ?,
                has_update = ?, last_checked = ?, forge_token_cipher = ?
               WHERE id = ?"#,
        )
        .bind(&app.name)
        .bind(app.source_kind.as_str())
        .bind(&app.source_ref)
        .bind(&app.current_version)
        .bind(&app.current_digest)
        .bind(&app.latest_version)
        .bind(&app.latest_digest)
        .bind(app.current_published_at.map(|d| d.to_rfc3339()))
        .bind(app.latest_published_at.map(|d| d.to_rfc3339()))
        .bind(app.has_update)
        .bind(app.last_checked.map(|d| d.to_rfc3339()))
        .bind(&app.forge_token)
        .bind(app.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TrackedAppNotFound(app.id));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<TrackedApp>> {
        let row: Option<TrackedAppRow> = sqlx::query_as(
            r#"SELECT id, user_id, name, source_kind, source_ref, current_version, current_digest,
                latest_version, latest_digest, current_published_at, latest_published_at,
                has_update, last_checked, forge_token_cipher
               FROM tracked_apps WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TrackedApp::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: i64) -> DomainResult<Vec<TrackedApp>> {
        let rows: Vec<TrackedAppRow> = sqlx::query_as(
            r#"SELECT id, user_id, name, source_kind, source_ref, current_version, current_digest,
                latest_version, latest_digest, current_published_at, latest_published_at,
                has_update, last_checked, forge_token_cipher
               FROM tracked_apps WHERE user_id = ? ORDER BY name"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TrackedApp::try_from).collect()
    }

    async fn list_all(&self) -> DomainResult<Vec<TrackedApp>> {
        let rows: Vec<TrackedAppRow> = sqlx::query_as(
            r#"SELECT id, user_id, name, source_kind, source_ref, current_version, current_digest,
                latest_version, latest_digest, current_published_at, latest_published_at,
                has_update, last_checked, forge_token_cipher
               FROM tracked_apps"#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TrackedApp::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct DescriptorRow {
    digest: Option<String>,
    tag: Option<String>,
    published_at: Option<String>,
    resolved_at: String,
}

impl TryFrom<DescriptorRow> for LatestDescriptor {
    type Error = DomainError;

    fn try_from(row: DescriptorRow) -> Result<Self, Self::Error> {
        Ok(LatestDescriptor {
            digest: row.digest,
            tag: row.tag,
            published_at: parse_optional_datetime(row.published_at)?,
            resolved_at: DateTime::parse_from_rfc3339(&row.resolved_at)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| DomainError::SerializationError(e.to_string()))?,
        })
    }
}

#[derive(Clone)]
pub struct SqliteLatestDescriptorRepository {
    pool: SqlitePool,
}

impl SqliteLatestDescriptorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LatestDescriptorRepository for SqliteLatestDescriptorRepository {
    async fn get(&self, user_id: i64, key: &str) -> DomainResult<Option<LatestDescriptor>> {
        let row: Option<DescriptorRow> = sqlx::query_as(
            "SELECT digest, tag, published_at, resolved_at FROM latest_descriptors WHERE user_id = ? AND descriptor_key = ?",
        )
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LatestDescriptor::try_from).transpose()
    }

    async fn upsert(&self, user_id: i64, key: &str, descriptor: &LatestDescriptor) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO latest_descriptors (user_id, descriptor_key, digest, tag, published_at, resolved_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(user_id, descriptor_key) DO UPDATE SET
                 digest = excluded.digest, tag = excluded.tag, published_at = excluded.published_at,
                 resolved_at = excluded.resolved_at"#,
        )
        .bind(user_id)
        .bind(key)
        .bind(&descriptor.digest)
        .bind(&descriptor.tag)
        .bind(descriptor.published_at.map(|d| d.to_rfc3339()))
        .bind(descriptor.resolved_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::connection::create_migrated_test_pool;

    async fn seed_user(pool: &SqlitePool) {
        sqlx::query("INSERT INTO users (id, username) VALUES (1, 'alice')").execute(pool).await.unwrap();
    }

    fn sample_app() -> TrackedApp {
        TrackedApp {
            id: Uuid::new_v4(),
            user_id: 1,
            name: "widget".into(),
            source_kind: SourceKind::ForgeA,
            source_ref: "acme/widget".into(),
            current_version: Some("v1.0.0".into()),
            current_digest: None,
            latest_version: None,
            latest_digest: None,
            current_published_at: None,
            latest_published_at: None,
            has_update: false,
            last_checked: None,
            forge_token: Some("secret".into()),
        }
    }

    #[tokio::test]
    async fn round_trips_tracked_app_and_reports_update_flag() {
        let pool = create_migrated_test_pool().await.unwrap();
        seed_user(&pool).await;
        let repo = SqliteTrackedAppRepository::new(pool);
        let mut app = sample_app();
        repo.create(&app).await.unwrap();

        app.latest_version = Some("v1.1.0".into());
        app.has_update = true;
        repo.update(&app).await.unwrap();

        let fetched = repo.get(app.id).await.unwrap().unwrap();
        assert!(fetched.has_update);
        assert_eq!(fetched.latest_version.as_deref(), Some("v1.1.0"));
    }

    #[tokio::test]
    async fn list_all_spans_users() {
        let pool = create_migrated_test_pool().await.unwrap();
        seed_user(&pool).await;
        sqlx::query("INSERT INTO users (id, username) VALUES (2, 'bob')").execute(&pool).await.unwrap();
        let repo = SqliteTrackedAppRepository::new(pool);

        let mut a = sample_app();
        repo.create(&a).await.unwrap();
        a.id = Uuid::new_v4();
        a.user_id = 2;
        repo.create(&a).await.unwrap();

        assert_eq!(repo.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn descriptor_upsert_overwrites_previous_value() {
        let pool = create_migrated_test_pool().await.unwrap();
        seed_user(&pool).await;
        let repo = SqliteLatestDescriptorRepository::new(pool);

        let first = LatestDescriptor { digest: Some("sha256:aaa".into()), tag: Some("1.0".into()), published_at: None, resolved_at: Utc::now() };
        repo.upsert(1, "acme/widget:latest", &first).await.unwrap();

        let second = LatestDescriptor { digest: Some("sha256:bbb".into()), tag: Some("1.1".into()), published_at: None, resolved_at: Utc::now() };
        repo.upsert(1, "acme/widget:latest", &second).await.unwrap();

        let fetched = repo.get(1, "acme/widget:latest").await.unwrap().unwrap();
        assert_eq!(fetched.digest.as_deref(), Some("sha256:bbb"));

        assert!(repo.get(1, "unknown").await.unwrap().is_none());
    }
}
