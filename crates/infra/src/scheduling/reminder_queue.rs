//! In-process reminder work queue
//!
//! One timer task per reminder, keyed by work name so re-scheduling the
//! same reminder replaces the pending timer instead of stacking a second
//! one. Timers are cheap sleeps; all state a fire needs is re-read from
//! the store by the handler, so a lost timer costs nothing but delay and
//! the catch-up sweep restores it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use waypoint_core::reminders::ports::ReminderScheduler;
use waypoint_core::reminders::ReminderFireHandler;
use waypoint_domain::constants::REMINDER_WORK_PREFIX;
use waypoint_domain::Result;

/// Callback invoked when a queued reminder becomes due.
///
/// Installed after construction because the fire handler itself needs the
/// queue as its scheduler.
#[async_trait]
pub trait DueReminderHandler: Send + Sync {
    async fn on_due_reminder(&self, reminder_id: &str) -> Result<()>;
}

#[async_trait]
impl DueReminderHandler for ReminderFireHandler {
    async fn on_due_reminder(&self, reminder_id: &str) -> Result<()> {
        // Outcome is already logged by the handler; the queue only cares
        // whether the store was reachable
        self.handle_due_reminder(reminder_id).await.map(|_| ())
    }
}

struct QueuedReminder {
    generation: u64,
    fire_at_ms: i64,
    handle: JoinHandle<()>,
}

/// Timer-based implementation of [`ReminderScheduler`]
pub struct ReminderQueue {
    entries: Arc<DashMap<String, QueuedReminder>>,
    handler: Arc<RwLock<Option<Arc<dyn DueReminderHandler>>>>,
    cancellation: CancellationToken,
    generation: AtomicU64,
}

impl ReminderQueue {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            handler: Arc::new(RwLock::new(None)),
            cancellation: CancellationToken::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Install the due-reminder callback. Work that fires before this is
    /// called is dropped with a warning.
    pub fn set_fire_handler(&self, handler: Arc<dyn DueReminderHandler>) {
        *self.handler.write() = Some(handler);
    }

    /// Number of reminders with pending timers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The instant the queued timer for a reminder will fire, if queued
    pub fn queued_fire_time(&self, reminder_id: &str) -> Option<i64> {
        self.entries.get(&work_key(reminder_id)).map(|entry| entry.fire_at_ms)
    }

    /// Abort every pending timer. The queue stays usable afterwards only
    /// for inspection; used on application shutdown.
    pub fn shutdown(&self) {
        self.cancellation.cancel();
        for entry in self.entries.iter() {
            entry.value().handle.abort();
        }
        self.entries.clear();
        debug!("Reminder queue shut down");
    }
}

impl Default for ReminderQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReminderScheduler for ReminderQueue {
    async fn schedule_reminder(&self, reminder_id: &str, fire_at_ms: i64) -> Result<()> {
        let key = work_key(reminder_id);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let delay = delay_until(fire_at_ms);

        let entries = Arc::clone(&self.entries);
        let handler = Arc::clone(&self.handler);
        let cancel = self.cancellation.child_token();
        let id = reminder_id.to_string();
        let task_key = key.clone();
        let (registered_tx, registered_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            // The map entry must exist before the timer runs, or a past-due
            // fire races its own registration and leaves it behind
            if registered_rx.await.is_err() {
                return;
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(reminder_id = %id, "Queued reminder cancelled before firing");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            // Only remove our own entry; a replacement registered under the
            // same key carries a newer generation
            entries.remove_if(&task_key, |_, entry| entry.generation == generation);

            let handler = handler.read().clone();
            match handler {
                Some(handler) => {
                    if let Err(err) = handler.on_due_reminder(&id).await {
                        error!(
                            reminder_id = %id,
                            error = %err,
                            "Due reminder handling failed; the catch-up sweep retries it"
                        );
                    }
                }
                None => warn!(reminder_id = %id, "Reminder fired with no handler installed"),
            }
        });

        if let Some(previous) =
            self.entries.insert(key, QueuedReminder { generation, fire_at_ms, handle })
        {
            previous.handle.abort();
            debug!(reminder_id, "Replaced queued reminder work");
        } else {
            debug!(reminder_id, fire_at_ms, "Queued reminder work");
        }
        let _ = registered_tx.send(());
        Ok(())
    }

    async fn cancel_reminder(&self, reminder_id: &str) -> Result<()> {
        if let Some((_, entry)) = self.entries.remove(&work_key(reminder_id)) {
            entry.handle.abort();
            debug!(reminder_id, "Cancelled queued reminder work");
        }
        Ok(())
    }
}

fn work_key(reminder_id: &str) -> String {
    format!("{REMINDER_WORK_PREFIX}{reminder_id}")
}

fn delay_until(fire_at_ms: i64) -> Duration {
    let now = Utc::now().timestamp_millis();
    Duration::from_millis(fire_at_ms.saturating_sub(now).max(0) as u64)
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct CountingHandler {
        fired: Mutex<Vec<String>>,
    }

    impl CountingHandler {
        fn fired(&self) -> Vec<String> {
            self.fired.lock().clone()
        }
    }

    #[async_trait]
    impl DueReminderHandler for CountingHandler {
        async fn on_due_reminder(&self, reminder_id: &str) -> Result<()> {
            self.fired.lock().push(reminder_id.to_string());
            Ok(())
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    fn queue_with_handler() -> (ReminderQueue, Arc<CountingHandler>) {
        let queue = ReminderQueue::new();
        let handler = Arc::new(CountingHandler::default());
        queue.set_fire_handler(handler.clone());
        (queue, handler)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn past_due_reminder_fires_immediately() {
        let (queue, handler) = queue_with_handler();
        let past = Utc::now().timestamp_millis() - 60_000;

        queue.schedule_reminder("r1", past).await.unwrap();

        assert!(wait_until(|| handler.fired() == vec!["r1"], Duration::from_secs(2)).await);
        assert!(queue.is_empty(), "fired work leaves the queue");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rescheduling_replaces_pending_timer() {
        let (queue, handler) = queue_with_handler();
        let far_future = Utc::now().timestamp_millis() + 60_000;
        let due_now = Utc::now().timestamp_millis();

        queue.schedule_reminder("r1", far_future).await.unwrap();
        assert_eq!(queue.queued_fire_time("r1"), Some(far_future));
        assert_eq!(queue.len(), 1);

        queue.schedule_reminder("r1", due_now).await.unwrap();

        assert!(wait_until(|| handler.fired().len() == 1, Duration::from_secs(2)).await);
        // The far-future timer was aborted, nothing else fires
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handler.fired(), vec!["r1"]);
        assert!(queue.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_removes_pending_work() {
        let (queue, handler) = queue_with_handler();
        let soon = Utc::now().timestamp_millis() + 50;

        queue.schedule_reminder("r1", soon).await.unwrap();
        queue.cancel_reminder("r1").await.unwrap();

        assert!(queue.is_empty());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(handler.fired().is_empty(), "cancelled work never fires");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_unknown_reminder_is_noop() {
        let (queue, _handler) = queue_with_handler();
        queue.cancel_reminder("missing").await.unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn distinct_reminders_queue_independently() {
        let (queue, handler) = queue_with_handler();
        let now = Utc::now().timestamp_millis();

        queue.schedule_reminder("r1", now).await.unwrap();
        queue.schedule_reminder("r2", now).await.unwrap();

        assert!(wait_until(|| handler.fired().len() == 2, Duration::from_secs(2)).await);
        let mut fired = handler.fired();
        fired.sort();
        assert_eq!(fired, vec!["r1", "r2"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_aborts_all_pending_timers() {
        let (queue, handler) = queue_with_handler();
        let far_future = Utc::now().timestamp_millis() + 60_000;

        queue.schedule_reminder("r1", far_future).await.unwrap();
        queue.schedule_reminder("r2", far_future).await.unwrap();
        queue.shutdown();

        assert!(queue.is_empty());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handler.fired().is_empty());
    }
}
