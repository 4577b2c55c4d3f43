//! Port interfaces for reminder scheduling and notification delivery
//!
//! Deferred work items carry only the reminder id. State is re-read from
//! the store when work executes, never trusted from schedule time.

use async_trait::async_trait;
use waypoint_domain::Result;

/// Durable deferred-work capability for reminders
#[async_trait]
pub trait ReminderScheduler: Send + Sync {
    /// Enqueue the single deferred fire for a reminder, replacing any
    /// not-yet-fired work queued under the same reminder id
    async fn schedule_reminder(&self, reminder_id: &str, fire_at_ms: i64) -> Result<()>;

    /// Remove the reminder's deferred work; no-op when absent
    async fn cancel_reminder(&self, reminder_id: &str) -> Result<()>;
}

/// A user-visible reminder notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderNotification {
    pub reminder_id: String,
    pub milestone_id: String,
    pub application_id: String,
    pub title: String,
    pub body: String,
}

/// Notification-emission capability
#[async_trait]
pub trait ReminderNotifier: Send + Sync {
    /// Whether notifications can currently be delivered at all
    fn notifications_available(&self) -> bool;

    /// Post (or refresh) the visible notification for a reminder
    async fn post(&self, notification: ReminderNotification) -> Result<()>;

    /// Remove the visible notification for a reminder; no-op when absent
    async fn cancel(&self, reminder_id: &str) -> Result<()>;
}
