//! Scheduled-intent tick loop (spec.md §4.7).

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tracing::{error, warn};

use crate::domain::models::{parse_standard_cron, Intent, TriggerKind};
use crate::domain::ports::{IntentExecutionRepository, IntentRepository};
use crate::services::intent_executor::{ExecuteOptions, IntentExecutor};

const TICK_INTERVAL: StdDuration = StdDuration::from_secs(60);

pub struct CronEvaluator {
    intents: Arc<dyn IntentRepository>,
    executions: Arc<dyn IntentExecutionRepository>,
    executor: Arc<IntentExecutor>,
}

impl CronEvaluator {
    pub fn new(intents: Arc<dyn IntentRepository>, executions: Arc<dyn IntentExecutionRepository>, executor: Arc<IntentExecutor>) -> Self {
        Self { intents, executions, executor }
    }

    /// Spawns the self-contained tick loop, ticking once a minute for the
    /// life of the process.
    pub fn start(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(e) = self.tick(Utc::now()).await {
                    error!(error = %e, "cron evaluator tick failed");
                }
            }
        });
    }

    /// One tick: evaluate every enabled scheduled intent against `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> crate::domain::errors::DomainResult<()> {
        let intents = self.intents.list_enabled_scheduled().await?;
        for intent in intents {
            if let Err(e) = self.evaluate_one(&intent, now).await {
                error!(intent_id = %intent.id, error = %e, "failed to evaluate scheduled intent");
            }
        }
        Ok(())
    }

    async fn evaluate_one(&self, intent: &Intent, now: DateTime<Utc>) -> crate::domain::errors::DomainResult<()> {
        let Some(cron_expr) = intent.schedule_cron.as_deref() else {
            warn!(intent_id = %intent.id, "scheduled intent missing schedule_cron, skipping");
            return Ok(());
        };
        let schedule = match parse_standard_cron(cron_expr) {
            Ok(s) => s,
            Err(e) => {
                warn!(intent_id = %intent.id, error = %e, "invalid cron expression, skipping");
                return Ok(());
            }
        };

        let anchor = intent.last_evaluated_at.unwrap_or(intent.created_at);
        let Some(next_fire) = most_recent_due(&schedule, anchor, now) else {
            return Ok(());
        };

        // Never start a second execution of the same intent while one is
        // still running (spec.md §5 ordering guarantees).
        if self.executions.has_running(intent.id).await? {
            return Ok(());
        }

        let opts = ExecuteOptions { trigger_kind: TriggerKind::Scheduled, trigger_time: Some(next_fire), dry_run_override: None };
        let new_anchor = IntentExecutor::anchor_for(&opts, now);
        let summary = self.executor.execute(intent, intent.user_id, opts).await?;

        let mut updated = intent.clone();
        updated.last_evaluated_at = Some(new_anchor);
        updated.last_execution_id = Some(summary.execution.id);
        self.intents.update(&updated).await
    }
}

/// The most recent cron point in `(anchor, now]`, coalescing any earlier
/// missed points (spec.md §4.7: "only the most recent one fires").
fn most_recent_due(schedule: &Schedule, anchor: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut last = None;
    for fire in schedule.after(&anchor) {
        if fire > now {
            break;
        }
        last = Some(fire);
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesces_multiple_missed_points_to_the_most_recent() {
        let schedule = parse_standard_cron("* * * * *").unwrap(); // every minute
        let anchor = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:05:30Z").unwrap().with_timezone(&Utc);

        let due = most_recent_due(&schedule, anchor, now).unwrap();
        assert_eq!(due, DateTime::parse_from_rfc3339("2026-01-01T00:05:00Z").unwrap().with_timezone(&Utc));
    }

    #[test]
    fn returns_none_when_nothing_is_due_yet() {
        let schedule = parse_standard_cron("0 * * * *").unwrap(); // hourly
        let anchor = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:30:00Z").unwrap().with_timezone(&Utc);

        assert!(most_recent_due(&schedule, anchor, now).is_none());
    }

    #[test]
    fn quarter_hour_cron_coalesces_to_the_cron_point_45_minutes_after_anchor() {
        // Scenario 1 (spec.md §8): cron `*/15 * * * *`, tick 47 min after the
        // anchor fires exactly once, at the cron point 45 min after it.
        let schedule = parse_standard_cron("*/15 * * * *").unwrap();
        let anchor = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let now = anchor + chrono::Duration::minutes(47);

        let due = most_recent_due(&schedule, anchor, now).unwrap();
        assert_eq!(due, anchor + chrono::Duration::minutes(45));
    }
}
