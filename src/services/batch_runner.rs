//! Periodic registry and tracked-app sweeps (spec.md §4.8).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{error, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainResult, ProviderError};
use crate::domain::models::{BatchJobConfig, BatchRun, BatchRunStatus, JobKind, LatestDescriptor, SourceKind};
use crate::domain::ports::notifier::NotificationEvent;
use crate::domain::ports::{
    BatchJobConfigRepository, BatchRunRepository, ContainerInventoryPort, CredentialProvider,
    LatestDescriptorRepository, Notifier, TrackedAppRepository,
};
use crate::services::inventory_service::registry_descriptor_key;
use crate::services::upstream_resolver::{ResolveOptions, UpstreamResolver};
use crate::services::version_normalize::has_update;

const TICK_INTERVAL: StdDuration = StdDuration::from_secs(30);
/// Delay before the first sweep of a job kind that has never run, per
/// spec.md §4.8 ("schedule an initial run after a small fixed delay").
const INITIAL_RUN_DELAY: Duration = Duration::minutes(1);

pub struct BatchRunner {
    batch_runs: Arc<dyn BatchRunRepository>,
    batch_configs: Arc<dyn BatchJobConfigRepository>,
    inventory: Arc<dyn ContainerInventoryPort>,
    tracked_apps: Arc<dyn TrackedAppRepository>,
    descriptors: Arc<dyn LatestDescriptorRepository>,
    resolver: Arc<UpstreamResolver>,
    credentials: Arc<dyn CredentialProvider>,
    notifier: Arc<dyn Notifier>,
    next_run_cache: RwLock<HashMap<JobKind, DateTime<Utc>>>,
}

impl BatchRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        batch_runs: Arc<dyn BatchRunRepository>,
        batch_configs: Arc<dyn BatchJobConfigRepository>,
        inventory: Arc<dyn ContainerInventoryPort>,
        tracked_apps: Arc<dyn TrackedAppRepository>,
        descriptors: Arc<dyn LatestDescriptorRepository>,
        resolver: Arc<UpstreamResolver>,
        credentials: Arc<dyn CredentialProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            batch_runs,
            batch_configs,
            inventory,
            tracked_apps,
            descriptors,
            resolver,
            credentials,
            notifier,
            next_run_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn start(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            loop {
                ticker.tick().await;
                let now = Utc::now();
                if let Err(e) = self.tick(JobKind::RegistrySweep, now).await {
                    error!(error = %e, "registry sweep tick failed");
                }
                if let Err(e) = self.tick(JobKind::TrackedAppSweep, now).await {
                    error!(error = %e, "tracked app sweep tick failed");
                }
            }
        });
    }

    /// One tick for one job kind: checks whether a sweep is due across all
    /// users with that job kind enabled, and if so, runs it.
    pub async fn tick(&self, job_kind: JobKind, now: DateTime<Utc>) -> DomainResult<()> {
        let configs = self.batch_configs.list_enabled(job_kind).await?;
        if configs.is_empty() {
            return Ok(());
        }

        if self.batch_runs.has_running(job_kind).await? {
            return Ok(());
        }

        let next_run = self.next_run_for(job_kind, &configs).await?;
        if now < next_run {
            return Ok(());
        }

        let user_ids: HashSet<i64> = configs.iter().map(|c| c.user_id).collect();
        self.run_sweep(job_kind, user_ids, false).await?;
        self.next_run_cache.write().await.remove(&job_kind);
        Ok(())
    }

    /// Manual "run now" trigger: always runs regardless of schedule, and
    /// does not reset the recurring anchor (spec.md §4.8).
    pub async fn run_now(&self, job_kind: JobKind, user_ids: HashSet<i64>) -> DomainResult<Uuid> {
        self.run_sweep(job_kind, user_ids, true).await
    }

    async fn next_run_for(&self, job_kind: JobKind, configs: &[BatchJobConfig]) -> DomainResult<DateTime<Utc>> {
        if let Some(cached) = self.next_run_cache.read().await.get(&job_kind) {
            return Ok(*cached);
        }

        let min_interval = configs.iter().map(|c| c.interval_minutes).min().unwrap_or(60);
        let recent = self.batch_runs.latest(Some(job_kind)).await?;

        let next_run = match recent.first() {
            Some(last) if last.status != BatchRunStatus::Running => {
                last.completed_at.unwrap_or(last.started_at) + Duration::minutes(min_interval as i64)
            }
            Some(last) => last.started_at + Duration::minutes(min_interval as i64),
            None => Utc::now() + INITIAL_RUN_DELAY,
        };

        self.next_run_cache.write().await.insert(job_kind, next_run);
        Ok(next_run)
    }

    async fn run_sweep(&self, job_kind: JobKind, user_ids: HashSet<i64>, is_manual: bool) -> DomainResult<Uuid> {
        let mut run = BatchRun::start(job_kind, is_manual);
        self.batch_runs.create(&run).await?;

        let outcome = match job_kind {
            JobKind::RegistrySweep => self.sweep_registry_images(&user_ids).await,
            JobKind::TrackedAppSweep => self.sweep_tracked_apps(&user_ids).await,
        };

        let completed_at = Utc::now();
        run.completed_at = Some(completed_at);
        run.duration_ms = Some((completed_at - run.started_at).num_milliseconds());

        match outcome {
            Ok((checked, updated, logs)) => {
                run.containers_checked = checked;
                run.containers_updated = updated;
                run.status = BatchRunStatus::Completed;
                run.logs = logs;
            }
            Err(reason) => {
                run.status = BatchRunStatus::Failed;
                run.error_message = Some(reason.clone());
                self.notifier
                    .notify(NotificationEvent::BatchRunFailed { job_kind: job_kind.as_str().to_string(), run_id: run.id, error: reason })
                    .await;
            }
        }

        self.batch_runs.update(&run).await?;
        Ok(run.id)
    }

    /// Returns `(containersChecked, containersUpdated, logs)`, or an error
    /// string when the sweep was aborted by a rate limit (spec.md §4.8
    /// step 4: untouched targets are left untouched).
    async fn sweep_registry_images(&self, user_ids: &HashSet<i64>) -> Result<(u32, u32, String), String> {
        let mut checked = 0u32;
        let mut updated = 0u32;
        let mut logs = String::new();

        for &user_id in user_ids {
            let containers = self.inventory.list_annotated_containers(user_id, false).await.map_err(|e| e.to_string())?;

            let mut seen = HashSet::new();
            for container in containers {
                let key = registry_descriptor_key(&container.repo, &container.tag);
                if !seen.insert((user_id, key.clone())) {
                    continue;
                }

                let credential = self.credentials.credentials_for(user_id, &format!("registry:{}", container.registry)).await;
                let previous_has_update = container.has_update;

                let result = self
                    .resolver
                    .resolve_latest(
                        &container.repo,
                        &container.tag,
                        ResolveOptions { forge_ref: None, forge_token: None, use_fallback: false, registry_credential: credential.as_deref() },
                    )
                    .await;

                checked += 1;
                match result {
                    Ok(Some(descriptor)) => {
                        let new_has_update = has_update(
                            container.current_digest_full.as_deref(),
                            Some(container.tag.as_str()),
                            descriptor.digest.as_deref(),
                            descriptor.tag.as_deref(),
                        );
                        self.descriptors.upsert(user_id, &key, &descriptor).await.map_err(|e| e.to_string())?;

                        if new_has_update && !previous_has_update {
                            updated += 1;
                        }
                        if new_has_update && !previous_has_update {
                            self.notifier
                                .notify(NotificationEvent::UpstreamUpdateDetected {
                                    user_id,
                                    key: key.clone(),
                                    previous_tag: Some(container.tag.clone()),
                                    new_tag: descriptor.tag.clone(),
                                })
                                .await;
                        }
                        logs.push_str(&format!("checked {key}: has_update={new_has_update}\n"));
                    }
                    Ok(None) => {
                        logs.push_str(&format!("checked {key}: no descriptor resolved\n"));
                    }
                    Err(ProviderError::RateLimited) => {
                        return Err(format!("rate limited by upstream provider while checking {key}"));
                    }
                    Err(ProviderError::Transient(reason)) => {
                        warn!(key, reason, "transient error resolving registry image, continuing");
                        logs.push_str(&format!("checked {key}: transient error: {reason}\n"));
                    }
                }
            }
        }

        Ok((checked, updated, logs))
    }

    async fn sweep_tracked_apps(&self, user_ids: &HashSet<i64>) -> Result<(u32, u32, String), String> {
        let mut checked = 0u32;
        let mut updated = 0u32;
        let mut logs = String::new();

        let all_apps = self.tracked_apps.list_all().await.map_err(|e| e.to_string())?;
        for mut app in all_apps.into_iter().filter(|a| user_ids.contains(&a.user_id)) {
            let previous_has_update = app.has_update;

            // Three capability implementations chosen by source kind
            // (spec.md §9): a registry-backed app resolves through the
            // digest path like a deployed container's image, while the
            // two forge kinds resolve through the release-feed path.
            let result = match app.source_kind {
                SourceKind::Registry => {
                    let credential = self.credentials.credentials_for(app.user_id, &format!("registry:app:{}", app.id)).await;
                    let tag = app.current_version.as_deref().unwrap_or("latest");
                    self.resolver
                        .resolve_latest(
                            &app.source_ref,
                            tag,
                            ResolveOptions { forge_ref: None, forge_token: None, use_fallback: false, registry_credential: credential.as_deref() },
                        )
                        .await
                }
                SourceKind::ForgeA | SourceKind::ForgeB => {
                    let token = self
                        .credentials
                        .credentials_for(app.user_id, &format!("forge-token:{}", app.id))
                        .await
                        .or_else(|| app.forge_token.clone());
                    match &app.current_version {
                        Some(tag) => self.resolver.resolve_forge_by_tag(&app.source_ref, tag, token.as_deref()).await,
                        None => self.resolver.resolve_forge_latest(&app.source_ref, token.as_deref()).await,
                    }
                }
            };

            checked += 1;
            match result {
                Ok(Some(descriptor)) => {
                    apply_descriptor_to_tracked_app(&mut app, &descriptor);
                    let new_has_update = has_update(
                        app.current_digest.as_deref(),
                        app.current_version.as_deref(),
                        app.latest_digest.as_deref(),
                        app.latest_version.as_deref(),
                    );
                    app.has_update = new_has_update;
                    app.last_checked = Some(Utc::now());
                    self.tracked_apps.update(&app).await.map_err(|e| e.to_string())?;

                    if new_has_update && !previous_has_update {
                        updated += 1;
                    }
                    if new_has_update && !previous_has_update {
                        self.notifier
                            .notify(NotificationEvent::UpstreamUpdateDetected {
                                user_id: app.user_id,
                                key: format!("tracked-app:{}", app.id),
                                previous_tag: app.current_version.clone(),
                                new_tag: app.latest_version.clone(),
                            })
                            .await;
                    }
                    logs.push_str(&format!("checked {}: has_update={new_has_update}\n", app.name));
                }
                Ok(None) => {
                    logs.push_str(&format!("checked {}: no release resolved\n", app.name));
                }
                Err(ProviderError::RateLimited) => {
                    return Err(format!("rate limited by upstream provider while checking {}", app.name));
                }
                Err(ProviderError::Transient(reason)) => {
                    warn!(app = %app.name, reason, "transient error resolving tracked app, continuing");
                    logs.push_str(&format!("checked {}: transient error: {reason}\n", app.name));
                }
            }
        }

        Ok((checked, updated, logs))
    }
}

fn apply_descriptor_to_tracked_app(app: &mut crate::domain::models::TrackedApp, descriptor: &LatestDescriptor) {
    app.latest_version = descriptor.tag.clone();
    app.latest_digest = descriptor.digest.clone();
    app.latest_published_at = descriptor.published_at;
}
