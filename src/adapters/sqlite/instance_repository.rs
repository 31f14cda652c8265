//! SQLite-backed Credential & Instance Registry (spec.md §2.1, §4.3 "owning
//! instance's base URL"). Credentials themselves are never read from this
//! table; they are resolved through `CredentialProvider`.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AuthKind, Instance};
use crate::domain::ports::InstanceRepository;

#[derive(sqlx::FromRow)]
struct InstanceRow {
    id: i64,
    user_id: i64,
    name: String,
    url: String,
    auth_kind: String,
}

impl TryFrom<InstanceRow> for Instance {
    type Error = crate::domain::errors::DomainError;

    fn try_from(row: InstanceRow) -> Result<Self, Self::Error> {
        use std::str::FromStr;
        Ok(Instance {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            url: row.url,
            auth_kind: AuthKind::from_str(&row.auth_kind)
                .map_err(crate::domain::errors::DomainError::SerializationError)?,
        })
    }
}

#[derive(Clone)]
pub struct SqliteInstanceRepository {
    pool: SqlitePool,
}

impl SqliteInstanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstanceRepository for SqliteInstanceRepository {
    async fn list_for_user(&self, user_id: i64) -> DomainResult<Vec<Instance>> {
        let rows: Vec<InstanceRow> =
            sqlx::query_as("SELECT id, user_id, name, url, auth_kind FROM instances WHERE user_id = ? ORDER BY id")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Instance::try_from).collect()
    }

    async fn get(&self, instance_id: i64) -> DomainResult<Option<Instance>> {
        let row: Option<InstanceRow> =
            sqlx::query_as("SELECT id, user_id, name, url, auth_kind FROM instances WHERE id = ?")
                .bind(instance_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Instance::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::connection::create_migrated_test_pool;

    async fn seed(pool: &SqlitePool) {
        sqlx::query("INSERT INTO users (id, username) VALUES (1, 'alice')").execute(pool).await.unwrap();
        sqlx::query("INSERT INTO instances (id, user_id, name, url, auth_kind) VALUES (1, 1, 'prod', 'https://prod.example', 'token')")
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn lists_instances_scoped_to_user() {
        let pool = create_migrated_test_pool().await.unwrap();
        seed(&pool).await;
        let repo = SqliteInstanceRepository::new(pool);

        let instances = repo.list_for_user(1).await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].name, "prod");

        assert!(repo.list_for_user(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_returns_none_for_unknown_instance() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteInstanceRepository::new(pool);
        assert!(repo.get(999).await.unwrap().is_none());
    }
}
