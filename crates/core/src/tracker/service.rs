//! Tracking use-case service
//!
//! Validation boundary over the repositories: trims input, stamps ids and
//! timestamps, keeps reminder work in step with milestone changes and
//! publishes change notifications. Entitlement gating stays with the UI
//! collaborators; this service never blocks an add on slot limits.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use waypoint_domain::{
    Application, ApplicationStatus, Milestone, Reminder, Result, WaypointError,
};

use super::changes::{ChangeNotifier, Table};
use super::ports::{ApplicationRepository, MilestoneRepository, ReminderRepository};
use crate::reminders::ports::{ReminderNotifier, ReminderScheduler};

/// Input for creating a new application
#[derive(Debug, Clone, Default)]
pub struct NewApplication {
    pub company_name: String,
    pub role_title: String,
    pub job_link: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// Input for creating a new milestone
#[derive(Debug, Clone, Default)]
pub struct NewMilestone {
    pub application_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<i64>,
    pub is_primary: bool,
}

/// Application tracking service
pub struct TrackerService {
    applications: Arc<dyn ApplicationRepository>,
    milestones: Arc<dyn MilestoneRepository>,
    reminders: Arc<dyn ReminderRepository>,
    scheduler: Arc<dyn ReminderScheduler>,
    notifier: Arc<dyn ReminderNotifier>,
    changes: Arc<ChangeNotifier>,
}

impl TrackerService {
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

    /// Validate and create an application with its default milestones.
    ///
    /// The application row and both default milestones are written as one
    /// atomic unit; the primary milestone gets its first reminder scheduled
    /// at its due date.
    #[instrument(skip(self, input), fields(company = %input.company_name))]
    pub async fn add_application(&self, input: NewApplication) -> Result<Application> {
        let company_name = input.company_name.trim();
        if company_name.is_empty() {
            return Err(WaypointError::InvalidInput("Company name is required".to_string()));
        }
        let role_title = input.role_title.trim();
        if role_title.is_empty() {
            return Err(WaypointError::InvalidInput("Role title is required".to_string()));
        }

        let now = now_ms();
        let application = Application {
            id: Uuid::new_v4().to_string(),
            company_name: company_name.to_string(),
            role_title: role_title.to_string(),
            job_link: normalize_optional(input.job_link),
            location: normalize_optional(input.location),
            applied_date: now,
            notes: normalize_optional(input.notes),
            status: ApplicationStatus::Applied,
            is_archived: false,
            notifications_enabled: true,
            created_at: now,
            updated_at: now,
        };

        let default_milestones = Milestone::default_milestones_for(&application.id, now);
        self.applications.add_application(&application, &default_milestones).await?;
        self.changes.notify(Table::Applications);
        self.changes.notify(Table::Milestones);

        for milestone in &default_milestones {
            if milestone.is_primary {
                self.ensure_first_reminder(milestone).await?;
            }
        }

        info!(application_id = %application.id, "Application created");
        Ok(application)
    }

    pub async fn update_application(&self, mut application: Application) -> Result<()> {
        application.updated_at = now_ms();
        self.applications.update_application(&application).await?;
        self.changes.notify(Table::Applications);
        Ok(())
    }

    /// Delete an application; row cascade removes milestones and reminders,
    /// scheduled work and visible notifications are cancelled here
    #[instrument(skip(self))]
    pub async fn delete_application(&self, id: &str) -> Result<()> {
        let reminders = self.reminders.get_reminders_for_application(id).await?;
        for reminder in &reminders {
            self.scheduler.cancel_reminder(&reminder.id).await?;
            self.notifier.cancel(&reminder.id).await?;
        }

        self.applications.delete_application(id).await?;
        self.changes.notify(Table::Applications);
        self.changes.notify(Table::Milestones);
        self.changes.notify(Table::Reminders);
        Ok(())
    }

    pub async fn archive_application(&self, id: &str) -> Result<()> {
        self.applications.set_archived(id, true, now_ms()).await?;
        self.changes.notify(Table::Applications);
        Ok(())
    }

    pub async fn unarchive_application(&self, id: &str) -> Result<()> {
        self.applications.set_archived(id, false, now_ms()).await?;
        self.changes.notify(Table::Applications);
        Ok(())
    }

    pub async fn update_status(&self, id: &str, status: ApplicationStatus) -> Result<()> {
        self.applications.update_status(id, status, now_ms()).await?;
        self.changes.notify(Table::Applications);
        Ok(())
    }

    pub async fn set_notifications_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        self.applications.update_notifications_enabled(id, enabled, now_ms()).await?;
        self.changes.notify(Table::Applications);
        Ok(())
    }

    pub async fn get_application_by_id(&self, id: &str) -> Result<Option<Application>> {
        self.applications.get_application_by_id(id).await
    }

    pub async fn get_all_applications(&self) -> Result<Vec<Application>> {
        self.applications.get_all_applications().await
    }

    pub async fn get_active_applications(&self) -> Result<Vec<Application>> {
        self.applications.get_active_applications().await
    }

    pub async fn get_archived_applications(&self) -> Result<Vec<Application>> {
        self.applications.get_archived_applications().await
    }

    pub async fn get_active_application_count(&self) -> Result<u32> {
        self.applications.get_active_application_count().await
    }

    /// Validate and append a milestone; a due date gets a first reminder
    #[instrument(skip(self, input), fields(application_id = %input.application_id))]
    pub async fn add_milestone(&self, input: NewMilestone) -> Result<Milestone> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(WaypointError::InvalidInput("Milestone title is required".to_string()));
        }

        let existing =
            self.milestones.get_milestones_for_application(&input.application_id).await?;
        let next_order = existing.iter().map(|m| m.sort_order).max().map_or(0, |o| o + 1);

        let milestone = Milestone {
            id: Uuid::new_v4().to_string(),
            application_id: input.application_id.clone(),
            title: title.to_string(),
            description: normalize_optional(input.description),
            due_date: input.due_date,
            is_completed: false,
            is_primary: false,
            created_at: now_ms(),
            sort_order: next_order,
        };
        self.milestones.insert_milestone(&milestone).await?;

        if input.is_primary {
            self.milestones
                .set_primary_milestone(&input.application_id, &milestone.id)
                .await?;
        }
        self.changes.notify(Table::Milestones);

        self.ensure_first_reminder(&milestone).await?;
        Ok(milestone)
    }

    pub async fn update_milestone(&self, milestone: Milestone) -> Result<()> {
        self.milestones.update_milestone(&milestone).await?;
        self.changes.notify(Table::Milestones);
        Ok(())
    }

    /// Complete a milestone; the next incomplete milestone (lowest sort
    /// order) becomes primary and gets a first reminder at its due date
    #[instrument(skip(self))]
    pub async fn complete_milestone(&self, id: &str) -> Result<()> {
        let promoted = self.milestones.complete_milestone(id).await?;
        self.changes.notify(Table::Milestones);

        if let Some(next) = promoted {
            info!(milestone_id = %next.id, "Promoted next milestone to primary");
            self.ensure_first_reminder(&next).await?;
        }
        Ok(())
    }

    pub async fn set_primary_milestone(
        &self,
        application_id: &str,
        milestone_id: &str,
    ) -> Result<()> {
        self.milestones.set_primary_milestone(application_id, milestone_id).await?;
        self.changes.notify(Table::Milestones);
        Ok(())
    }

    pub async fn get_milestones_for_application(
        &self,
        application_id: &str,
    ) -> Result<Vec<Milestone>> {
        self.milestones.get_milestones_for_application(application_id).await
    }

    /// Delete every row, child tables first, cancelling all reminder work
    /// and visible notifications. The store file itself stays in place.
    #[instrument(skip(self))]
    pub async fn wipe_all_data(&self) -> Result<()> {
        let active = self.reminders.get_active_reminders().await?;
        for reminder in &active {
            self.scheduler.cancel_reminder(&reminder.id).await?;
            self.notifier.cancel(&reminder.id).await?;
        }

        self.reminders.delete_all_reminders().await?;
        self.milestones.delete_all_milestones().await?;
        self.applications.delete_all_applications().await?;

        self.changes.notify(Table::Reminders);
        self.changes.notify(Table::Milestones);
        self.changes.notify(Table::Applications);
        warn!("All tracked data wiped");
        Ok(())
    }

    /// Subscribe to change versions for a table
    pub fn watch(&self, table: Table) -> watch::Receiver<u64> {
        self.changes.subscribe(table)
    }

    /// Create and schedule the first reminder for a milestone with a due
    /// date, unless an active one already exists
    async fn ensure_first_reminder(&self, milestone: &Milestone) -> Result<()> {
        let Some(due) = milestone.due_date else {
            return Ok(());
        };
        if self
            .reminders
            .get_active_first_reminder_for_milestone(&milestone.id)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let reminder = Reminder {
            id: Uuid::new_v4().to_string(),
            milestone_id: milestone.id.clone(),
            application_id: milestone.application_id.clone(),
            scheduled_time: due,
            is_follow_up: false,
            is_dismissed: false,
            is_snoozed: false,
            snooze_until: None,
            created_at: now_ms(),
        };
        self.reminders.insert_reminder(&reminder).await?;
        self.changes.notify(Table::Reminders);
        self.scheduler.schedule_reminder(&reminder.id, due).await?;
        Ok(())
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{new_service, seeded_application};

    #[tokio::test]
    async fn add_application_rejects_blank_company() {
        let (service, _env) = new_service();
        let result = service
            .add_application(NewApplication {
                company_name: "   ".to_string(),
                role_title: "Engineer".to_string(),
                ..NewApplication::default()
            })
            .await;
        assert!(matches!(result, Err(WaypointError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn add_application_rejects_blank_role() {
        let (service, _env) = new_service();
        let result = service
            .add_application(NewApplication {
                company_name: "Acme".to_string(),
                role_title: "".to_string(),
                ..NewApplication::default()
            })
            .await;
        assert!(matches!(result, Err(WaypointError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn add_application_creates_default_milestones() {
        let (service, env) = new_service();
        let app = service
            .add_application(NewApplication {
                company_name: "Acme".to_string(),
                role_title: "Engineer".to_string(),
                ..NewApplication::default()
            })
            .await
            .unwrap();

        let milestones = service.get_milestones_for_application(&app.id).await.unwrap();
        assert_eq!(milestones.len(), 2);
        assert_eq!(milestones[0].title, "Wait for initial response");
        assert!(milestones[0].is_primary);
        assert_eq!(milestones[1].title, "Consider follow-up");
        assert!(!milestones[1].is_primary);

        let week = 7 * 24 * 60 * 60 * 1000;
        let due = milestones[0].due_date.unwrap();
        assert!((due - (app.created_at + week)).abs() < 1000);

        // the primary milestone got a scheduled first reminder
        assert_eq!(env.scheduler.live().len(), 1);
    }

    #[tokio::test]
    async fn add_application_trims_and_empties_optionals() {
        let (service, _env) = new_service();
        let app = service
            .add_application(NewApplication {
                company_name: "  Acme  ".to_string(),
                role_title: " Engineer ".to_string(),
                job_link: Some("   ".to_string()),
                location: Some(" Berlin ".to_string()),
                notes: None,
            })
            .await
            .unwrap();

        assert_eq!(app.company_name, "Acme");
        assert_eq!(app.role_title, "Engineer");
        assert_eq!(app.job_link, None);
        assert_eq!(app.location.as_deref(), Some("Berlin"));
    }

    #[tokio::test]
    async fn completing_primary_promotes_second_milestone() {
        let (service, _env) = new_service();
        let app = seeded_application(&service).await;
        let milestones = service.get_milestones_for_application(&app.id).await.unwrap();

        service.complete_milestone(&milestones[0].id).await.unwrap();

        let after = service.get_milestones_for_application(&app.id).await.unwrap();
        let first = after.iter().find(|m| m.id == milestones[0].id).unwrap();
        let second = after.iter().find(|m| m.id == milestones[1].id).unwrap();
        assert!(first.is_completed);
        assert!(!first.is_primary);
        assert!(second.is_primary);
    }

    #[tokio::test]
    async fn completing_last_milestone_leaves_none_primary() {
        let (service, _env) = new_service();
        let app = seeded_application(&service).await;
        let milestones = service.get_milestones_for_application(&app.id).await.unwrap();

        service.complete_milestone(&milestones[0].id).await.unwrap();
        service.complete_milestone(&milestones[1].id).await.unwrap();

        let after = service.get_milestones_for_application(&app.id).await.unwrap();
        assert!(after.iter().all(|m| !(m.is_primary && !m.is_completed)));
        assert!(after.iter().all(|m| !m.is_primary));
    }

    #[tokio::test]
    async fn archive_excludes_from_active_count_and_list() {
        let (service, _env) = new_service();
        let mut ids = Vec::new();
        for i in 0..3 {
            let app = service
                .add_application(NewApplication {
                    company_name: format!("Company {i}"),
                    role_title: "Engineer".to_string(),
                    ..NewApplication::default()
                })
                .await
                .unwrap();
            ids.push(app.id);
        }
        assert_eq!(service.get_active_application_count().await.unwrap(), 3);

        service.archive_application(&ids[0]).await.unwrap();

        assert_eq!(service.get_active_application_count().await.unwrap(), 2);
        let active = service.get_active_applications().await.unwrap();
        assert!(active.iter().all(|a| a.id != ids[0]));
        let archived = service.get_archived_applications().await.unwrap();
        assert_eq!(archived.len(), 1);
    }

    #[tokio::test]
    async fn add_milestone_appends_sort_order() {
        let (service, _env) = new_service();
        let app = seeded_application(&service).await;

        let milestone = service
            .add_milestone(NewMilestone {
                application_id: app.id.clone(),
                title: "Send thank-you note".to_string(),
                ..NewMilestone::default()
            })
            .await
            .unwrap();

        assert_eq!(milestone.sort_order, 2);
    }

    #[tokio::test]
    async fn add_milestone_with_due_date_schedules_reminder() {
        let (service, env) = new_service();
        let app = seeded_application(&service).await;
        let scheduled_before = env.scheduler.live().len();

        let due = Utc::now().timestamp_millis() + 60_000;
        service
            .add_milestone(NewMilestone {
                application_id: app.id.clone(),
                title: "Prepare for interview".to_string(),
                due_date: Some(due),
                ..NewMilestone::default()
            })
            .await
            .unwrap();

        let live = env.scheduler.live();
        assert_eq!(live.len(), scheduled_before + 1);
        assert!(live.iter().any(|(_, at)| *at == due));
    }

    #[tokio::test]
    async fn wipe_clears_rows_and_cancels_work() {
        let (service, env) = new_service();
        seeded_application(&service).await;
        assert!(!env.scheduler.live().is_empty());

        service.wipe_all_data().await.unwrap();

        assert_eq!(service.get_all_applications().await.unwrap().len(), 0);
        assert!(env.scheduler.live().is_empty());
    }

    #[tokio::test]
    async fn delete_application_cancels_its_reminders() {
        let (service, env) = new_service();
        let app = seeded_application(&service).await;
        assert_eq!(env.scheduler.live().len(), 1);

        service.delete_application(&app.id).await.unwrap();

        assert!(env.scheduler.live().is_empty());
        assert!(service.get_application_by_id(&app.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn watch_ticks_on_mutation() {
        let (service, _env) = new_service();
        let mut rx = service.watch(Table::Applications);
        let before = *rx.borrow_and_update();

        seeded_application(&service).await;

        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update() > before);
    }
}
