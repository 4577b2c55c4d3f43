//! Notification action handling
//!
//! Reacts to user interaction with a delivered reminder notification.
//! The visible notification is cleared before any store write, so the
//! user's action takes effect on screen even if persistence fails.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};
use waypoint_domain::constants::SNOOZE_DURATION_MS;
use waypoint_domain::Result;

use super::ports::{ReminderNotifier, ReminderScheduler};
use crate::tracker::changes::{ChangeNotifier, Table};
use crate::tracker::ports::ReminderRepository;

/// Applies snooze and dismiss actions to reminders
pub struct ReminderActionHandler {
    reminders: Arc<dyn ReminderRepository>,
    scheduler: Arc<dyn ReminderScheduler>,
    notifier: Arc<dyn ReminderNotifier>,
    changes: Arc<ChangeNotifier>,
}

impl ReminderActionHandler {
    pub fn new(
        reminders: Arc<dyn ReminderRepository>,
        scheduler: Arc<dyn ReminderScheduler>,
        notifier: Arc<dyn ReminderNotifier>,
        changes: Arc<ChangeNotifier>,
    ) -> Self {
        Self { reminders, scheduler, notifier, changes }
    }

    /// Push the reminder one hour out and replace its queued work
    #[instrument(skip(self))]
    pub async fn snooze(&self, reminder_id: &str) -> Result<()> {
        self.notifier.cancel(reminder_id).await?;

        let new_time = Utc::now().timestamp_millis() + SNOOZE_DURATION_MS;
        self.reminders.snooze_reminder(reminder_id, new_time).await?;
        self.scheduler.schedule_reminder(reminder_id, new_time).await?;
        self.changes.notify(Table::Reminders);
        info!(reminder_id, new_time, "Reminder snoozed");
        Ok(())
    }

    /// Dismiss the reminder and cancel its queued work.
    ///
    /// Dismissing a first reminder also dismisses the milestone's active
    /// follow-up, so an addressed step cannot nudge a second time. A
    /// dismissed follow-up never touches its originating reminder.
    #[instrument(skip(self))]
    pub async fn dismiss(&self, reminder_id: &str) -> Result<()> {
        self.notifier.cancel(reminder_id).await?;

        let reminder = self.reminders.get_reminder_by_id(reminder_id).await?;

        self.reminders.dismiss_reminder(reminder_id).await?;
        self.scheduler.cancel_reminder(reminder_id).await?;

        if let Some(reminder) = reminder {
            if !reminder.is_follow_up {
                if let Some(follow_up) = self
                    .reminders
                    .get_active_follow_up_for_milestone(&reminder.milestone_id)
                    .await?
                {
                    self.reminders.dismiss_reminder(&follow_up.id).await?;
                    self.scheduler.cancel_reminder(&follow_up.id).await?;
                    debug!(follow_up_id = %follow_up.id, "Cascade dismissed follow-up");
                }
            }
        }

        self.changes.notify(Table::Reminders);
        info!(reminder_id, "Reminder dismissed");
        Ok(())
    }
}
