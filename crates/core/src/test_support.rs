//! In-memory fakes shared by the service and handler tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use waypoint_domain::{
    Application, ApplicationStatus, Milestone, Reminder, Result, WaypointError,
};

use crate::reminders::ports::{ReminderNotification, ReminderNotifier, ReminderScheduler};
use crate::tracker::changes::ChangeNotifier;
use crate::tracker::ports::{ApplicationRepository, MilestoneRepository, ReminderRepository};
use crate::tracker::service::{NewApplication, TrackerService};

/// Shared in-memory tables standing in for the encrypted store
#[derive(Default)]
pub struct MemoryStore {
    applications: Mutex<HashMap<String, Application>>,
    milestones: Mutex<HashMap<String, Milestone>>,
    reminders: Mutex<HashMap<String, Reminder>>,
}

impl MemoryStore {
    pub fn insert_reminder_row(&self, reminder: Reminder) {
        self.reminders.lock().insert(reminder.id.clone(), reminder);
    }

    pub fn insert_milestone_row(&self, milestone: Milestone) {
        self.milestones.lock().insert(milestone.id.clone(), milestone);
    }

    pub fn insert_application_row(&self, application: Application) {
        self.applications.lock().insert(application.id.clone(), application);
    }

    pub fn reminder(&self, id: &str) -> Option<Reminder> {
        self.reminders.lock().get(id).cloned()
    }

    pub fn reminder_count(&self) -> usize {
        self.reminders.lock().len()
    }
}

#[async_trait]
impl ApplicationRepository for MemoryStore {
    async fn add_application(
        &self,
        application: &Application,
        milestones: &[Milestone],
    ) -> Result<()> {
        self.applications.lock().insert(application.id.clone(), application.clone());
        let mut table = self.milestones.lock();
        for milestone in milestones {
            table.insert(milestone.id.clone(), milestone.clone());
        }
        Ok(())
    }

    async fn update_application(&self, application: &Application) -> Result<()> {
        self.applications.lock().insert(application.id.clone(), application.clone());
        Ok(())
    }

    async fn delete_application(&self, id: &str) -> Result<()> {
        self.applications.lock().remove(id);
        self.milestones.lock().retain(|_, m| m.application_id != id);
        self.reminders.lock().retain(|_, r| r.application_id != id);
        Ok(())
    }

    async fn get_application_by_id(&self, id: &str) -> Result<Option<Application>> {
        Ok(self.applications.lock().get(id).cloned())
    }

    async fn get_all_applications(&self) -> Result<Vec<Application>> {
        let mut rows: Vec<_> = self.applications.lock().values().cloned().collect();
        rows.sort_by_key(|a| std::cmp::Reverse(a.updated_at));
        Ok(rows)
    }

    async fn get_active_applications(&self) -> Result<Vec<Application>> {
        let mut rows: Vec<_> =
            self.applications.lock().values().filter(|a| !a.is_archived).cloned().collect();
        rows.sort_by_key(|a| std::cmp::Reverse(a.updated_at));
        Ok(rows)
    }

    async fn get_archived_applications(&self) -> Result<Vec<Application>> {
        let mut rows: Vec<_> =
            self.applications.lock().values().filter(|a| a.is_archived).cloned().collect();
        rows.sort_by_key(|a| std::cmp::Reverse(a.updated_at));
        Ok(rows)
    }

    async fn get_active_application_count(&self) -> Result<u32> {
        Ok(self.applications.lock().values().filter(|a| !a.is_archived).count() as u32)
    }

    async fn set_archived(&self, id: &str, archived: bool, updated_at: i64) -> Result<()> {
        let mut table = self.applications.lock();
        let app = table
            .get_mut(id)
            .ok_or_else(|| WaypointError::NotFound(format!("application {id}")))?;
        app.is_archived = archived;
        app.updated_at = updated_at;
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: ApplicationStatus,
        updated_at: i64,
    ) -> Result<()> {
        let mut table = self.applications.lock();
        let app = table
            .get_mut(id)
            .ok_or_else(|| WaypointError::NotFound(format!("application {id}")))?;
        app.status = status;
        app.updated_at = updated_at;
        Ok(())
    }

    async fn update_notifications_enabled(
        &self,
        id: &str,
        enabled: bool,
        updated_at: i64,
    ) -> Result<()> {
        let mut table = self.applications.lock();
        let app = table
            .get_mut(id)
            .ok_or_else(|| WaypointError::NotFound(format!("application {id}")))?;
        app.notifications_enabled = enabled;
        app.updated_at = updated_at;
        Ok(())
    }

    async fn delete_all_applications(&self) -> Result<()> {
        self.applications.lock().clear();
        Ok(())
    }
}

#[async_trait]
impl MilestoneRepository for MemoryStore {
    async fn insert_milestone(&self, milestone: &Milestone) -> Result<()> {
        self.milestones.lock().insert(milestone.id.clone(), milestone.clone());
        Ok(())
    }

    async fn update_milestone(&self, milestone: &Milestone) -> Result<()> {
        self.milestones.lock().insert(milestone.id.clone(), milestone.clone());
        Ok(())
    }

    async fn get_milestone_by_id(&self, id: &str) -> Result<Option<Milestone>> {
        Ok(self.milestones.lock().get(id).cloned())
    }

    async fn get_milestones_for_application(
        &self,
        application_id: &str,
    ) -> Result<Vec<Milestone>> {
        let mut rows: Vec<_> = self
            .milestones
            .lock()
            .values()
            .filter(|m| m.application_id == application_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.sort_order);
        Ok(rows)
    }

    async fn get_primary_milestone(&self, application_id: &str) -> Result<Option<Milestone>> {
        Ok(self
            .milestones
            .lock()
            .values()
            .find(|m| m.application_id == application_id && m.is_primary && !m.is_completed)
            .cloned())
    }

    async fn complete_milestone(&self, id: &str) -> Result<Option<Milestone>> {
        let mut table = self.milestones.lock();
        let application_id = match table.get_mut(id) {
            Some(milestone) => {
                milestone.is_completed = true;
                milestone.application_id.clone()
            }
            None => return Ok(None),
        };

        let next = table
            .values()
            .filter(|m| m.application_id == application_id && !m.is_completed && m.id != id)
            .min_by(|a, b| {
                (a.sort_order, a.created_at, &a.id).cmp(&(b.sort_order, b.created_at, &b.id))
            })
            .cloned();

        for milestone in table.values_mut().filter(|m| m.application_id == application_id) {
            milestone.is_primary = false;
        }
        if let Some(ref winner) = next {
            if let Some(milestone) = table.get_mut(&winner.id) {
                milestone.is_primary = true;
            }
        }
        Ok(next.map(|mut m| {
            m.is_primary = true;
            m
        }))
    }

    async fn set_primary_milestone(
        &self,
        application_id: &str,
        milestone_id: &str,
    ) -> Result<()> {
        let mut table = self.milestones.lock();
        for milestone in table.values_mut().filter(|m| m.application_id == application_id) {
            milestone.is_primary = false;
        }
        let target = table
            .get_mut(milestone_id)
            .ok_or_else(|| WaypointError::NotFound(format!("milestone {milestone_id}")))?;
        target.is_primary = true;
        Ok(())
    }

    async fn delete_all_milestones(&self) -> Result<()> {
        self.milestones.lock().clear();
        Ok(())
    }
}

#[async_trait]
impl ReminderRepository for MemoryStore {
    async fn insert_reminder(&self, reminder: &Reminder) -> Result<()> {
        self.reminders.lock().insert(reminder.id.clone(), reminder.clone());
        Ok(())
    }

    async fn get_reminder_by_id(&self, id: &str) -> Result<Option<Reminder>> {
        Ok(self.reminders.lock().get(id).cloned())
    }

    async fn get_reminders_for_application(&self, application_id: &str) -> Result<Vec<Reminder>> {
        Ok(self
            .reminders
            .lock()
            .values()
            .filter(|r| r.application_id == application_id)
            .cloned()
            .collect())
    }

    async fn get_active_reminders(&self) -> Result<Vec<Reminder>> {
        let mut rows: Vec<_> =
            self.reminders.lock().values().filter(|r| !r.is_dismissed).cloned().collect();
        rows.sort_by_key(|r| r.scheduled_time);
        Ok(rows)
    }

    async fn get_pending_reminders(&self, now_ms: i64) -> Result<Vec<Reminder>> {
        Ok(self
            .reminders
            .lock()
            .values()
            .filter(|r| r.is_pending(now_ms))
            .cloned()
            .collect())
    }

    async fn dismiss_reminder(&self, id: &str) -> Result<()> {
        if let Some(reminder) = self.reminders.lock().get_mut(id) {
            reminder.is_dismissed = true;
        }
        Ok(())
    }

    async fn snooze_reminder(&self, id: &str, snooze_until: i64) -> Result<()> {
        if let Some(reminder) = self.reminders.lock().get_mut(id) {
            reminder.is_snoozed = true;
            reminder.snooze_until = Some(snooze_until);
        }
        Ok(())
    }

    async fn get_active_follow_up_for_milestone(
        &self,
        milestone_id: &str,
    ) -> Result<Option<Reminder>> {
        Ok(self
            .reminders
            .lock()
            .values()
            .filter(|r| r.milestone_id == milestone_id && r.is_follow_up && !r.is_dismissed)
            .max_by_key(|r| r.scheduled_time)
            .cloned())
    }

    async fn get_active_first_reminder_for_milestone(
        &self,
        milestone_id: &str,
    ) -> Result<Option<Reminder>> {
        Ok(self
            .reminders
            .lock()
            .values()
            .filter(|r| r.milestone_id == milestone_id && !r.is_follow_up && !r.is_dismissed)
            .max_by_key(|r| r.scheduled_time)
            .cloned())
    }

    async fn delete_all_reminders(&self) -> Result<()> {
        self.reminders.lock().clear();
        Ok(())
    }
}

/// Scheduler double recording live work with replace semantics
#[derive(Default)]
pub struct RecordingScheduler {
    live: Mutex<HashMap<String, i64>>,
    history: Mutex<Vec<(String, i64)>>,
    cancelled: Mutex<Vec<String>>,
}

impl RecordingScheduler {
    /// Currently queued (reminder id, fire time) pairs
    pub fn live(&self) -> Vec<(String, i64)> {
        self.live.lock().iter().map(|(id, at)| (id.clone(), *at)).collect()
    }

    pub fn fire_time_for(&self, reminder_id: &str) -> Option<i64> {
        self.live.lock().get(reminder_id).copied()
    }

    pub fn schedule_history(&self) -> Vec<(String, i64)> {
        self.history.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().clone()
    }
}

#[async_trait]
impl ReminderScheduler for RecordingScheduler {
    async fn schedule_reminder(&self, reminder_id: &str, fire_at_ms: i64) -> Result<()> {
        self.live.lock().insert(reminder_id.to_string(), fire_at_ms);
        self.history.lock().push((reminder_id.to_string(), fire_at_ms));
        Ok(())
    }

    async fn cancel_reminder(&self, reminder_id: &str) -> Result<()> {
        self.live.lock().remove(reminder_id);
        self.cancelled.lock().push(reminder_id.to_string());
        Ok(())
    }
}

/// Notifier double recording posted and cancelled notifications
pub struct RecordingNotifier {
    available: AtomicBool,
    posted: Mutex<Vec<ReminderNotification>>,
    cancelled: Mutex<Vec<String>>,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(true),
            posted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingNotifier {
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn posted(&self) -> Vec<ReminderNotification> {
        self.posted.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().clone()
    }
}

#[async_trait]
impl ReminderNotifier for RecordingNotifier {
    fn notifications_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn post(&self, notification: ReminderNotification) -> Result<()> {
        self.posted.lock().push(notification);
        Ok(())
    }

    async fn cancel(&self, reminder_id: &str) -> Result<()> {
        self.cancelled.lock().push(reminder_id.to_string());
        Ok(())
    }
}

/// Handles to the fakes backing a service under test
pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub scheduler: Arc<RecordingScheduler>,
    pub notifier: Arc<RecordingNotifier>,
    pub changes: Arc<ChangeNotifier>,
}

pub fn new_env() -> TestEnv {
    TestEnv {
        store: Arc::new(MemoryStore::default()),
        scheduler: Arc::new(RecordingScheduler::default()),
        notifier: Arc::new(RecordingNotifier::default()),
        changes: Arc::new(ChangeNotifier::new()),
    }
}

pub fn new_service() -> (TrackerService, TestEnv) {
    let env = new_env();
    let service = TrackerService::new(
        env.store.clone(),
        env.store.clone(),
        env.store.clone(),
        env.scheduler.clone(),
        env.notifier.clone(),
        env.changes.clone(),
    );
    (service, env)
}

pub async fn seeded_application(service: &TrackerService) -> Application {
    service
        .add_application(NewApplication {
            company_name: "Acme".to_string(),
            role_title: "Engineer".to_string(),
            ..NewApplication::default()
        })
        .await
        .unwrap_or_else(|err| panic!("seed application failed: {err}"))
}
