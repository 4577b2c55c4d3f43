//! Reminder fire handling
//!
//! Runs when a reminder's deferred work becomes due. The scheduled work
//! item is a weak reference: every check here re-reads live store state,
//! so a dismiss or snooze that landed while the work was in flight wins.
//! Every terminal state except a store failure reports success, because
//! the conditions are permanent and must not be retried by the queue.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use waypoint_domain::constants::FOLLOW_UP_DELAY_MS;
use waypoint_domain::{Milestone, Reminder, Result};

use super::ports::{ReminderNotification, ReminderNotifier, ReminderScheduler};
use crate::tracker::changes::{ChangeNotifier, Table};
use crate::tracker::ports::{ApplicationRepository, MilestoneRepository, ReminderRepository};

/// Terminal state of one fire invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Reminder id blank or row no longer in the store
    Missing,
    /// Reminder was dismissed after scheduling
    Dismissed,
    /// Snooze window still open; work rescheduled for snooze end
    SnoozedFuture,
    /// Notification capability unavailable
    NotificationsBlocked,
    /// Milestone or application row missing
    DataMissing,
    /// The application's own notifications flag is off
    AppNotificationsOff,
    /// Notification emitted
    Fired,
}

/// Executes due reminder work against live store state
pub struct ReminderFireHandler {
    applications: Arc<dyn ApplicationRepository>,
    milestones: Arc<dyn MilestoneRepository>,
    reminders: Arc<dyn ReminderRepository>,
    scheduler: Arc<dyn ReminderScheduler>,
    notifier: Arc<dyn ReminderNotifier>,
    changes: Arc<ChangeNotifier>,
}

impl ReminderFireHandler {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        milestones: Arc<dyn MilestoneRepository>,
        reminders: Arc<dyn ReminderRepository>,
        scheduler: Arc<dyn ReminderScheduler>,
        notifier: Arc<dyn ReminderNotifier>,
        changes: Arc<ChangeNotifier>,
    ) -> Self {
        Self { applications, milestones, reminders, scheduler, notifier, changes }
    }

    /// Re-validate and fire one due reminder.
    ///
    /// Checks run in order; the first match is terminal for this
    /// invocation. Store failures propagate so the work queue can retry;
    /// everything else absorbs as success.
    #[instrument(skip(self))]
    pub async fn handle_due_reminder(&self, reminder_id: &str) -> Result<FireOutcome> {
        if reminder_id.trim().is_empty() {
            debug!("Fired with blank reminder id");
            return Ok(FireOutcome::Missing);
        }

        let Some(reminder) = self.reminders.get_reminder_by_id(reminder_id).await? else {
            debug!("Reminder row gone before firing");
            return Ok(FireOutcome::Missing);
        };

        if reminder.is_dismissed {
            debug!("Reminder dismissed before firing");
            return Ok(FireOutcome::Dismissed);
        }

        let now = Utc::now().timestamp_millis();
        if let Some(snooze_until) = reminder.snooze_until {
            if snooze_until > now {
                self.scheduler.schedule_reminder(&reminder.id, snooze_until).await?;
                debug!(snooze_until, "Reminder snoozed into the future; rescheduled");
                return Ok(FireOutcome::SnoozedFuture);
            }
        }

        if !self.notifier.notifications_available() {
            debug!("Notifications unavailable; reminder absorbed");
            return Ok(FireOutcome::NotificationsBlocked);
        }

        let milestone = self.milestones.get_milestone_by_id(&reminder.milestone_id).await?;
        let application = match &milestone {
            Some(m) => self.applications.get_application_by_id(&m.application_id).await?,
            None => None,
        };
        let (Some(milestone), Some(application)) = (milestone, application) else {
            debug!("Milestone or application row missing; reminder absorbed");
            return Ok(FireOutcome::DataMissing);
        };

        if !application.notifications_enabled {
            debug!("Application notifications disabled; reminder absorbed");
            return Ok(FireOutcome::AppNotificationsOff);
        }

        let notification = ReminderNotification {
            reminder_id: reminder.id.clone(),
            milestone_id: milestone.id.clone(),
            application_id: application.id.clone(),
            title: format!("Next step: {}", milestone.title),
            body: format!("For {} — {}", application.company_name, application.role_title),
        };
        if let Err(err) = self.notifier.post(notification).await {
            warn!(error = %err, "Notification delivery failed; not retried");
        }

        if !reminder.is_follow_up {
            self.schedule_follow_up_if_needed(&reminder, &milestone, now).await?;
        }

        info!(reminder_id = %reminder.id, "Reminder fired");
        Ok(FireOutcome::Fired)
    }

    /// Synthesize the single 24h follow-up nudge for a milestone.
    ///
    /// The existence check bounds write amplification to one active
    /// follow-up per milestone, also under a double fire race.
    async fn schedule_follow_up_if_needed(
        &self,
        first: &Reminder,
        milestone: &Milestone,
        now: i64,
    ) -> Result<()> {
        if self
            .reminders
            .get_active_follow_up_for_milestone(&milestone.id)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let fire_at = now + FOLLOW_UP_DELAY_MS;
        let follow_up = Reminder {
            id: Uuid::new_v4().to_string(),
            milestone_id: milestone.id.clone(),
            application_id: first.application_id.clone(),
            scheduled_time: fire_at,
            is_follow_up: true,
            is_dismissed: false,
            is_snoozed: false,
            snooze_until: None,
            created_at: now,
        };
        self.reminders.insert_reminder(&follow_up).await?;
        self.changes.notify(Table::Reminders);
        self.scheduler.schedule_reminder(&follow_up.id, fire_at).await?;
        info!(follow_up_id = %follow_up.id, milestone_id = %milestone.id, "Follow-up scheduled");
        Ok(())
    }
}
