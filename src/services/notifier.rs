//! Bounded-channel notification transport (spec.md §9 design note).
//!
//! The chat/webhook transport itself is out of scope; this consumer only
//! logs each event and appends it to an in-memory ring buffer so tests and
//! the HTTP surface's `/api/notifications/recent` endpoint have something
//! to read.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

use crate::domain::ports::notifier::NotificationEvent;
use crate::domain::ports::Notifier;

const CHANNEL_CAPACITY: usize = 256;
const RING_BUFFER_CAPACITY: usize = 100;

/// `Notifier` implementation: `notify` only pushes onto a bounded channel
/// and returns, so callers never block on however slow the consumer is.
pub struct ChannelNotifier {
    sender: mpsc::Sender<NotificationEvent>,
}

impl ChannelNotifier {
    /// Spawns the single consumer task and returns the notifier handle
    /// alongside the ring buffer the consumer populates.
    pub fn spawn() -> (Self, Arc<Mutex<VecDeque<NotificationEvent>>>) {
        let (sender, mut receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let recent = Arc::new(Mutex::new(VecDeque::with_capacity(RING_BUFFER_CAPACITY)));
        let recent_for_task = recent.clone();

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                info!(?event, "notification");
                let mut ring = recent_for_task.lock().await;
                if ring.len() == RING_BUFFER_CAPACITY {
                    ring.pop_front();
                }
                ring.push_back(event);
            }
        });

        (Self { sender }, recent)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, event: NotificationEvent) {
        // A full channel means the consumer is behind; drop rather than
        // block the caller, since notifications are best-effort.
        if self.sender.try_send(event).is_err() {
            tracing::warn!("notification channel full, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notified_events_appear_in_ring_buffer() {
        let (notifier, recent) = ChannelNotifier::spawn();
        notifier
            .notify(NotificationEvent::BatchRunFailed {
                job_kind: "registry-sweep".into(),
                run_id: uuid::Uuid::new_v4(),
                error: "boom".into(),
            })
            .await;

        // Give the consumer task a chance to drain the channel.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(recent.lock().await.len(), 1);
    }
}
