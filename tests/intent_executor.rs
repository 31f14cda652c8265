//! Exercises the Intent Executor's concurrency contract end to end
//! (spec.md §5, §8 Scenario 2): stack groups run concurrently, but
//! containers within one stack upgrade strictly sequentially.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use fleetctl::domain::errors::DomainResult;
use fleetctl::domain::models::{
    AnnotatedContainer, AuthKind, Instance, Intent, IntentExecution, IntentExecutionContainer, IntentPatterns,
    ScheduleKind, UnusedImage,
};
use fleetctl::domain::ports::endpoint_client::{ContainerConfigSnapshot, RawContainer, RemoteImage};
use fleetctl::domain::ports::notifier::NotificationEvent;
use fleetctl::domain::ports::{
    ContainerInventoryPort, CredentialProvider, EndpointClient, InstanceRepository, IntentExecutionRepository, Notifier,
};
use fleetctl::services::intent_executor::{ExecuteOptions, IntentExecutor};
use fleetctl::services::lock_manager::UpgradeLockManager;
use fleetctl::services::upgrade_executor::UpgradeExecutor;

struct FakeInstances;

#[async_trait]
impl InstanceRepository for FakeInstances {
    async fn list_for_user(&self, _user_id: i64) -> DomainResult<Vec<Instance>> {
        Ok(vec![Instance { id: 1, user_id: 1, name: "prod".into(), url: "https://prod.example".into(), auth_kind: AuthKind::Token }])
    }

    async fn get(&self, instance_id: i64) -> DomainResult<Option<Instance>> {
        Ok(if instance_id == 1 {
            Some(Instance { id: 1, user_id: 1, name: "prod".into(), url: "https://prod.example".into(), auth_kind: AuthKind::Token })
        } else {
            None
        })
    }
}

struct FakeInventory {
    containers: Vec<AnnotatedContainer>,
}

#[async_trait]
impl ContainerInventoryPort for FakeInventory {
    async fn list_annotated_containers(&self, _user_id: i64, _only_updates: bool) -> DomainResult<Vec<AnnotatedContainer>> {
        Ok(self.containers.clone())
    }

    async fn list_unused_images(&self, _user_id: i64) -> DomainResult<Vec<UnusedImage>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct FakeExecutions {
    executions: Mutex<HashMap<Uuid, IntentExecution>>,
    container_rows: Mutex<Vec<IntentExecutionContainer>>,
}

#[async_trait]
impl IntentExecutionRepository for FakeExecutions {
    async fn create(&self, execution: &IntentExecution) -> DomainResult<()> {
        self.executions.lock().unwrap().insert(execution.id, execution.clone());
        Ok(())
    }

    async fn update(&self, execution: &IntentExecution) -> DomainResult<()> {
        self.executions.lock().unwrap().insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<IntentExecution>> {
        Ok(self.executions.lock().unwrap().get(&id).cloned())
    }

    async fn list_for_intent(&self, intent_id: Uuid, _limit: u32) -> DomainResult<Vec<IntentExecution>> {
        Ok(self.executions.lock().unwrap().values().filter(|e| e.intent_id == intent_id).cloned().collect())
    }

    async fn has_running(&self, _intent_id: Uuid) -> DomainResult<bool> {
        Ok(false)
    }

    async fn add_container_row(&self, row: &IntentExecutionContainer) -> DomainResult<()> {
        self.container_rows.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn list_container_rows(&self, execution_id: Uuid) -> DomainResult<Vec<IntentExecutionContainer>> {
        Ok(self.container_rows.lock().unwrap().iter().filter(|r| r.execution_id == execution_id).cloned().collect())
    }
}

struct FakeCredentials;

#[async_trait]
impl CredentialProvider for FakeCredentials {
    async fn credentials_for(&self, _user_id: i64, _kind: &str) -> Option<String> {
        None
    }
}

struct FakeNotifier;

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, _event: NotificationEvent) {}
}

/// Records every upgrade-step call as `"{step}:{container_id}"`, with a
/// short sleep around `pull_image` so concurrently-spawned stack groups
/// get a real chance to interleave if the executor doesn't serialize
/// correctly.
struct RecordingEndpointClient {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EndpointClient for RecordingEndpointClient {
    async fn list_containers(&self, _instance_url: &str, _endpoint_id: i64) -> DomainResult<Vec<RawContainer>> {
        Ok(Vec::new())
    }

    async fn pull_image(&self, _instance_url: &str, _endpoint_id: i64, image_ref: &str, _credential: Option<&str>) -> DomainResult<()> {
        self.log.lock().unwrap().push(format!("pull:{image_ref}"));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Ok(())
    }

    async fn snapshot_config(&self, _instance_url: &str, _endpoint_id: i64, container_id: &str) -> DomainResult<ContainerConfigSnapshot> {
        self.log.lock().unwrap().push(format!("snapshot:{container_id}"));
        Ok(ContainerConfigSnapshot {
            name: container_id.to_string(),
            env: Vec::new(),
            mounts: Vec::new(),
            networks: Vec::new(),
            restart_policy: "always".into(),
            labels: Default::default(),
        })
    }

    async fn stop(&self, _instance_url: &str, _endpoint_id: i64, container_id: &str) -> DomainResult<()> {
        self.log.lock().unwrap().push(format!("stop:{container_id}"));
        Ok(())
    }

    async fn remove(&self, _instance_url: &str, _endpoint_id: i64, container_id: &str) -> DomainResult<()> {
        self.log.lock().unwrap().push(format!("remove:{container_id}"));
        Ok(())
    }

    async fn create(&self, _instance_url: &str, _endpoint_id: i64, _snapshot: &ContainerConfigSnapshot, image_ref: &str) -> DomainResult<String> {
        self.log.lock().unwrap().push(format!("create:{image_ref}"));
        Ok(format!("new-{image_ref}"))
    }

    async fn start_and_wait_running(&self, _instance_url: &str, _endpoint_id: i64, container_id: &str) -> DomainResult<()> {
        self.log.lock().unwrap().push(format!("start:{container_id}"));
        Ok(())
    }

    async fn list_images(&self, _instance_url: &str, _endpoint_id: i64) -> DomainResult<Vec<RemoteImage>> {
        Ok(Vec::new())
    }

    async fn delete_image(&self, _instance_url: &str, _endpoint_id: i64, _image_id: &str) -> DomainResult<()> {
        Ok(())
    }
}

fn container(id: &str, stack: Option<&str>) -> AnnotatedContainer {
    AnnotatedContainer {
        container_id: id.to_string(),
        instance_id: 1,
        endpoint_id: 1,
        name: id.to_string(),
        stack_name: stack.map(str::to_string),
        image: format!("registry.example/app-{id}:1.0.0"),
        status: "running".into(),
        state: "running".into(),
        current_digest: None,
        current_digest_full: None,
        registry: "registry.example".into(),
        repo: format!("app-{id}"),
        tag: "1.0.0".into(),
        has_update: true,
        instance_url: "https://prod.example".into(),
        latest_tag: Some("1.1.0".into()),
        latest_digest: None,
    }
}

fn test_intent() -> Intent {
    Intent {
        id: Uuid::new_v4(),
        user_id: 1,
        name: "upgrade everything".into(),
        description: None,
        enabled: true,
        schedule_kind: ScheduleKind::Immediate,
        schedule_cron: None,
        dry_run: false,
        patterns: IntentPatterns { match_containers: vec!["*".to_string()], ..Default::default() },
        last_evaluated_at: None,
        last_execution_id: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn stack_groups_upgrade_sequentially_within_a_stack_and_concurrently_across_stacks() {
    let containers = vec![
        container("alpha-1", Some("alpha")),
        container("alpha-2", Some("alpha")),
        container("beta-1", Some("beta")),
    ];

    let log = Arc::new(Mutex::new(Vec::new()));
    let executor = IntentExecutor::new(
        Arc::new(FakeExecutions::default()),
        Arc::new(FakeInventory { containers }),
        Arc::new(FakeInstances),
        UpgradeLockManager::shared(),
        Arc::new(UpgradeExecutor::new(Arc::new(RecordingEndpointClient { log: log.clone() }))),
        Arc::new(FakeCredentials),
        Arc::new(FakeNotifier),
    );

    let intent = test_intent();
    let summary = executor
        .execute(&intent, 1, ExecuteOptions { trigger_kind: fleetctl::domain::models::TriggerKind::Manual, trigger_time: None, dry_run_override: None })
        .await
        .expect("execution should succeed");

    assert_eq!(summary.execution.containers_matched, 3);
    assert_eq!(summary.execution.containers_upgraded, 3);
    assert_eq!(summary.execution.containers_failed, 0);

    let log = log.lock().unwrap();
    let index_of = |needle: &str| log.iter().position(|entry| entry.contains(needle)).unwrap_or_else(|| panic!("missing {needle} in {log:?}"));

    // Within stack "alpha": every step for alpha-1 happens before alpha-2's
    // first step (strictly sequential, spec.md §5).
    let alpha1_last = index_of("start:alpha-1");
    let alpha2_first = index_of("pull:registry.example/app-alpha-2:1.1.0");
    assert!(alpha1_last < alpha2_first, "alpha-2 started before alpha-1 finished: {log:?}");

    // Both stacks completed; no ordering constraint between them is
    // asserted (spec.md §5: "no ordering across groups").
    assert!(log.iter().any(|e| e.contains("beta-1")));
}

#[tokio::test]
async fn a_locked_container_is_skipped_not_retried() {
    let containers = vec![container("locked-1", None)];
    let lock_manager = UpgradeLockManager::shared();
    lock_manager.acquire(&(1, "locked-1".to_string()), "someone-else").await.unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let executor = IntentExecutor::new(
        Arc::new(FakeExecutions::default()),
        Arc::new(FakeInventory { containers }),
        Arc::new(FakeInstances),
        lock_manager,
        Arc::new(UpgradeExecutor::new(Arc::new(RecordingEndpointClient { log: log.clone() }))),
        Arc::new(FakeCredentials),
        Arc::new(FakeNotifier),
    );

    let intent = test_intent();
    let summary = executor
        .execute(&intent, 1, ExecuteOptions { trigger_kind: fleetctl::domain::models::TriggerKind::Manual, trigger_time: None, dry_run_override: None })
        .await
        .expect("execution should succeed even when every container is locked");

    assert_eq!(summary.execution.containers_skipped, 1);
    assert_eq!(summary.execution.containers_upgraded, 0);
    assert!(log.lock().unwrap().is_empty(), "a locked container must never reach the endpoint client");
}

#[tokio::test]
async fn dry_run_never_calls_the_endpoint_client() {
    let containers = vec![container("dry-1", None)];
    let log = Arc::new(Mutex::new(Vec::new()));
    let executor = IntentExecutor::new(
        Arc::new(FakeExecutions::default()),
        Arc::new(FakeInventory { containers }),
        Arc::new(FakeInstances),
        UpgradeLockManager::shared(),
        Arc::new(UpgradeExecutor::new(Arc::new(RecordingEndpointClient { log: log.clone() }))),
        Arc::new(FakeCredentials),
        Arc::new(FakeNotifier),
    );

    let mut intent = test_intent();
    intent.dry_run = true;
    let summary = executor
        .execute(&intent, 1, ExecuteOptions { trigger_kind: fleetctl::domain::models::TriggerKind::Manual, trigger_time: None, dry_run_override: None })
        .await
        .unwrap();

    assert_eq!(summary.execution.containers_skipped, 1);
    assert!(log.lock().unwrap().is_empty());
}
