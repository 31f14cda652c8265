//! fleetctl entry point: loads configuration, opens the store, wires every
//! service to its adapters, and serves the HTTP surface alongside the
//! Cron Evaluator and Batch Job Runner background loops.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use tracing::info;

use fleetctl::adapters::sqlite::{
    create_pool, PoolConfig, SqliteBatchJobConfigRepository, SqliteBatchRunRepository, SqliteInstanceRepository,
    SqliteIntentExecutionRepository, SqliteIntentRepository, SqliteLatestDescriptorRepository, SqliteTrackedAppRepository,
};
use fleetctl::adapters::{EnvCredentialProvider, ForgeClient, ForgeKind, HttpEndpointClient, RegistryClient};
use fleetctl::config::ConfigLoader;
use fleetctl::http::{build_router, AppState};
use fleetctl::logging::init_tracing;
use fleetctl::services::batch_runner::BatchRunner;
use fleetctl::services::cron_evaluator::CronEvaluator;
use fleetctl::services::intent_executor::IntentExecutor;
use fleetctl::services::inventory_service::InventoryService;
use fleetctl::services::lock_manager::UpgradeLockManager;
use fleetctl::services::notifier::ChannelNotifier;
use fleetctl::services::upgrade_executor::UpgradeExecutor;
use fleetctl::services::upstream_resolver::UpstreamResolver;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigLoader::load().context("failed to load configuration")?;
    init_tracing(&config.logging).context("failed to initialize logging")?;

    info!(bind_address = %config.server.bind_address, database = %config.database.path, "starting fleetctl");

    let database_url = format!("sqlite:{}", config.database.path);
    let pool = create_pool(
        &database_url,
        Some(PoolConfig { max_connections: config.database.max_connections, ..PoolConfig::default() }),
    )
    .await
    .context("failed to open and migrate the store")?;

    let instances = Arc::new(SqliteInstanceRepository::new(pool.clone()));
    let intents = Arc::new(SqliteIntentRepository::new(pool.clone()));
    let executions = Arc::new(SqliteIntentExecutionRepository::new(pool.clone()));
    let tracked_apps = Arc::new(SqliteTrackedAppRepository::new(pool.clone()));
    let descriptors = Arc::new(SqliteLatestDescriptorRepository::new(pool.clone()));
    let batch_runs = Arc::new(SqliteBatchRunRepository::new(pool.clone()));
    let batch_configs = Arc::new(SqliteBatchJobConfigRepository::new(pool.clone()));

    let credentials = Arc::new(EnvCredentialProvider::new());
    let endpoint_client = Arc::new(HttpEndpointClient::new());

    let inventory = Arc::new(InventoryService::new(instances.clone(), endpoint_client.clone(), descriptors.clone()));

    let forge_kind: ForgeKind = config.upstream.forge_kind.parse().expect("validated by ConfigLoader::validate");
    let registry_provider = Arc::new(RegistryClient::new(config.upstream.registry_base_url.clone()));
    let forge_provider = Arc::new(ForgeClient::new(forge_kind, config.upstream.forge_base_url.clone()));
    let resolver = Arc::new(UpstreamResolver::new(registry_provider, forge_provider));

    let lock_manager = Arc::new(UpgradeLockManager::with_stale_after(Duration::minutes(config.locking.stale_lock_timeout_minutes)));
    let upgrade_executor = Arc::new(UpgradeExecutor::new(endpoint_client.clone()));

    let (notifier, recent_notifications) = ChannelNotifier::spawn();
    let notifier = Arc::new(notifier);

    let intent_executor = Arc::new(IntentExecutor::new(
        executions.clone(),
        inventory.clone(),
        instances.clone(),
        lock_manager.clone(),
        upgrade_executor.clone(),
        credentials.clone(),
        notifier.clone(),
    ));

    let cron_evaluator = Arc::new(CronEvaluator::new(intents.clone(), executions.clone(), intent_executor.clone()));
    cron_evaluator.start();

    let batch_runner = Arc::new(BatchRunner::new(
        batch_runs.clone(),
        batch_configs,
        inventory.clone(),
        tracked_apps,
        descriptors,
        resolver,
        credentials.clone(),
        notifier,
    ));
    batch_runner.clone().start();

    let state = AppState {
        intents,
        executions,
        instances,
        inventory,
        endpoint_client,
        lock_manager,
        upgrade_executor,
        intent_executor,
        batch_runs,
        batch_runner,
        credentials,
        recent_notifications,
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_address))?;

    info!(bind_address = %config.server.bind_address, "listening");
    axum::serve(listener, app).await.context("server exited")?;

    Ok(())
}
