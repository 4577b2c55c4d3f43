//! In-process notification hub
//!
//! Registry of currently-visible reminder notifications plus a broadcast
//! channel for delivery events. Posting is keyed by reminder id, so
//! re-posting refreshes the visible entry instead of stacking a second one.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;
use waypoint_core::reminders::ports::{ReminderNotification, ReminderNotifier};
use waypoint_domain::constants::{
    NOTIFICATION_ACTION_DISMISS, NOTIFICATION_ACTION_SNOOZE, NOTIFICATION_CHANNEL_DESCRIPTION,
    NOTIFICATION_CHANNEL_ID, NOTIFICATION_CHANNEL_NAME,
};
use waypoint_domain::Result;

const EVENT_CAPACITY: usize = 100;

/// The single channel reminder notifications are delivered on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationChannel {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

impl NotificationChannel {
    pub fn reminders() -> Self {
        Self {
            id: NOTIFICATION_CHANNEL_ID,
            name: NOTIFICATION_CHANNEL_NAME,
            description: NOTIFICATION_CHANNEL_DESCRIPTION,
        }
    }
}

/// A notification currently visible to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedNotification {
    pub notification: ReminderNotification,
    pub actions: [&'static str; 2],
    pub posted_at: i64,
}

/// Events published to hub subscribers
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    Posted(PostedNotification),
    Cancelled { reminder_id: String },
}

/// In-process implementation of [`ReminderNotifier`]
pub struct NotificationHub {
    channel: NotificationChannel,
    enabled: AtomicBool,
    posted: DashMap<String, PostedNotification>,
    events: broadcast::Sender<NotificationEvent>,
}

impl NotificationHub {
    pub fn new(enabled: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            channel: NotificationChannel::reminders(),
            enabled: AtomicBool::new(enabled),
            posted: DashMap::new(),
            events,
        }
    }

    /// Channel metadata for the platform notification surface
    pub fn channel(&self) -> &NotificationChannel {
        &self.channel
    }

    /// Flip the delivery capability; already-posted notifications stay
    /// visible
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Subscribe to posted/cancelled events
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }

    /// Snapshot of currently visible notifications
    pub fn posted(&self) -> Vec<PostedNotification> {
        self.posted.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn is_posted(&self, reminder_id: &str) -> bool {
        self.posted.contains_key(reminder_id)
    }

    /// Remove every visible notification; used by the full data wipe
    pub fn clear_all(&self) {
        let ids: Vec<String> = self.posted.iter().map(|entry| entry.key().clone()).collect();
        for reminder_id in ids {
            if self.posted.remove(&reminder_id).is_some() {
                let _ = self.events.send(NotificationEvent::Cancelled { reminder_id });
            }
        }
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ReminderNotifier for NotificationHub {
    fn notifications_available(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn post(&self, notification: ReminderNotification) -> Result<()> {
        let posted = PostedNotification {
            notification,
            actions: [NOTIFICATION_ACTION_SNOOZE, NOTIFICATION_ACTION_DISMISS],
            posted_at: Utc::now().timestamp_millis(),
        };
        debug!(reminder_id = %posted.notification.reminder_id, "Posting reminder notification");
        self.posted.insert(posted.notification.reminder_id.clone(), posted.clone());
        // Ignore errors - no active receivers is fine
        let _ = self.events.send(NotificationEvent::Posted(posted));
        Ok(())
    }

    async fn cancel(&self, reminder_id: &str) -> Result<()> {
        if self.posted.remove(reminder_id).is_some() {
            debug!(reminder_id, "Cancelled reminder notification");
            let _ = self
                .events
                .send(NotificationEvent::Cancelled { reminder_id: reminder_id.to_string() });
        }
        Ok(())
    }
}
