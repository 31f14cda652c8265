use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Intent, IntentExecution, IntentExecutionContainer};

#[async_trait]
pub trait IntentRepository: Send + Sync {
    async fn create(&self, intent: &Intent) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Intent>>;
    async fn update(&self, intent: &Intent) -> DomainResult<()>;
    async fn delete(&self, id: Uuid) -> DomainResult<()>;
    async fn list_for_user(&self, user_id: i64) -> DomainResult<Vec<Intent>>;
    /// Scheduled, enabled intents across all users, for the Cron Evaluator tick.
    async fn list_enabled_scheduled(&self) -> DomainResult<Vec<Intent>>;
}

#[async_trait]
pub trait IntentExecutionRepository: Send + Sync {
    async fn create(&self, execution: &IntentExecution) -> DomainResult<()>;
    async fn update(&self, execution: &IntentExecution) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<IntentExecution>>;
    async fn list_for_intent(&self, intent_id: Uuid, limit: u32) -> DomainResult<Vec<IntentExecution>>;
    /// True if `intent_id` has an execution currently `running` (used by the
    /// Cron Evaluator to avoid starting a concurrent scheduled run).
    async fn has_running(&self, intent_id: Uuid) -> DomainResult<bool>;

    async fn add_container_row(&self, row: &IntentExecutionContainer) -> DomainResult<()>;
    async fn list_container_rows(&self, execution_id: Uuid) -> DomainResult<Vec<IntentExecutionContainer>>;
}
