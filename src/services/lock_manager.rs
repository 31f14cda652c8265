//! In-process keyed mutex guarding at-most-one in-flight upgrade per
//! `(instanceId, containerId)` (spec.md §4.4).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use tokio::sync::RwLock;
use tracing::warn;

/// A holder older than this is treated as abandoned and forcibly released.
const STALE_AFTER: Duration = Duration::minutes(10);

pub type LockKey = (i64, String);

#[derive(Debug, Clone)]
struct Holder {
    owner: String,
    acquired_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LockInspection {
    pub held: bool,
    pub owner: Option<String>,
    pub acquired_at: Option<DateTime<Utc>>,
}

/// Process-wide singleton keyed mutex. Lock acquisition never suspends:
/// it returns `false` immediately rather than waiting (spec.md §5).
pub struct UpgradeLockManager {
    holders: RwLock<HashMap<LockKey, Holder>>,
    stale_after: Duration,
}

impl Default for UpgradeLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UpgradeLockManager {
    pub fn new() -> Self {
        Self::with_stale_after(STALE_AFTER)
    }

    /// Same as `new`, with the stale-lock timeout sourced from config
    /// instead of the built-in default.
    pub fn with_stale_after(stale_after: Duration) -> Self {
        Self { holders: RwLock::new(HashMap::new()), stale_after }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Fails if the key is held by a fresh holder; succeeds (replacing the
    /// holder) if the existing holder is stale. Returns the owner that
    /// currently holds the lock on failure, for the caller's skip reason.
    pub async fn acquire(&self, key: &LockKey, owner: &str) -> Result<(), String> {
        let now = Utc::now();
        let mut holders = self.holders.write().await;

        if let Some(existing) = holders.get(key) {
            let age = now.signed_duration_since(existing.acquired_at);
            if age < self.stale_after {
                return Err(existing.owner.clone());
            }
            warn!(instance_id = key.0, container_id = %key.1, stale_owner = %existing.owner, "forcibly releasing stale lock");
        }

        holders.insert(key.clone(), Holder { owner: owner.to_string(), acquired_at: now });
        Ok(())
    }

    pub async fn release(&self, key: &LockKey) {
        self.holders.write().await.remove(key);
    }

    pub async fn inspect(&self, key: &LockKey) -> LockInspection {
        match self.holders.read().await.get(key) {
            Some(h) => LockInspection { held: true, owner: Some(h.owner.clone()), acquired_at: Some(h.acquired_at) },
            None => LockInspection { held: false, owner: None, acquired_at: None },
        }
    }
}

/// Runs `body` while holding `key`, releasing it in a guaranteed-cleanup
/// scope regardless of whether `body` succeeds, fails, or panics
/// (spec.md §4.6 step 5: "Release the lock in a guaranteed-cleanup scope").
///
/// Async `Drop` can't await, so this is a plain scope guard rather than a
/// RAII guard type: the `AssertUnwindSafe` + `catch_unwind` pairing ensures
/// `release` still runs if `body`'s future panics during polling.
pub async fn with_lock<T, F, Fut>(
    manager: &Arc<UpgradeLockManager>,
    key: LockKey,
    body: F,
) -> T
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    let result = std::panic::AssertUnwindSafe(body()).catch_unwind().await;
    manager.release(&key).await;
    match result {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_on_same_key_fails_with_owner() {
        let manager = UpgradeLockManager::new();
        let key: LockKey = (1, "c1".to_string());

        manager.acquire(&key, "intent:1").await.unwrap();
        let err = manager.acquire(&key, "manual:user-1").await.unwrap_err();
        assert_eq!(err, "intent:1");
    }

    #[tokio::test]
    async fn release_then_acquire_succeeds() {
        let manager = UpgradeLockManager::new();
        let key: LockKey = (1, "c1".to_string());

        manager.acquire(&key, "intent:1").await.unwrap();
        manager.release(&key).await;
        manager.acquire(&key, "manual:user-1").await.unwrap();
    }

    #[tokio::test]
    async fn inspect_reports_current_holder() {
        let manager = UpgradeLockManager::new();
        let key: LockKey = (1, "c1".to_string());
        manager.acquire(&key, "intent:1").await.unwrap();

        let inspection = manager.inspect(&key).await;
        assert!(inspection.held);
        assert_eq!(inspection.owner.as_deref(), Some("intent:1"));
    }
}
