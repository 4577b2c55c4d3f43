//! Port interfaces for the tracking store
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations. The store is the sole persistence
//! authority; implementations own all row-level invariants that need
//! multi-statement atomicity.

use async_trait::async_trait;
use waypoint_domain::{Application, ApplicationStatus, Milestone, Reminder, Result};

/// Trait for persisting job applications
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Insert an application together with its default milestones as one
    /// atomic unit
    async fn add_application(&self, application: &Application, milestones: &[Milestone])
        -> Result<()>;

    /// Update an existing application row
    async fn update_application(&self, application: &Application) -> Result<()>;

    /// Delete an application; milestones and reminders cascade
    async fn delete_application(&self, id: &str) -> Result<()>;

    /// Fetch a single application
    async fn get_application_by_id(&self, id: &str) -> Result<Option<Application>>;

    /// All applications, most recently updated first
    async fn get_all_applications(&self) -> Result<Vec<Application>>;

    /// Non-archived applications, most recently updated first
    async fn get_active_applications(&self) -> Result<Vec<Application>>;

    /// Archived applications, most recently updated first
    async fn get_archived_applications(&self) -> Result<Vec<Application>>;

    /// Count of non-archived applications
    async fn get_active_application_count(&self) -> Result<u32>;

    /// Flip the archived flag and bump `updated_at`
    async fn set_archived(&self, id: &str, archived: bool, updated_at: i64) -> Result<()>;

    /// Persist a status change and bump `updated_at`
    async fn update_status(
        &self,
        id: &str,
        status: ApplicationStatus,
        updated_at: i64,
    ) -> Result<()>;

    /// Persist the per-application notifications flag and bump `updated_at`
    async fn update_notifications_enabled(
        &self,
        id: &str,
        enabled: bool,
        updated_at: i64,
    ) -> Result<()>;

    /// Delete every application row
    async fn delete_all_applications(&self) -> Result<()>;
}

/// Trait for persisting milestones
#[async_trait]
pub trait MilestoneRepository: Send + Sync {
    /// Insert one milestone
    async fn insert_milestone(&self, milestone: &Milestone) -> Result<()>;

    /// Update an existing milestone row
    async fn update_milestone(&self, milestone: &Milestone) -> Result<()>;

    /// Fetch a single milestone
    async fn get_milestone_by_id(&self, id: &str) -> Result<Option<Milestone>>;

    /// Milestones for one application ordered by `sort_order`
    async fn get_milestones_for_application(&self, application_id: &str)
        -> Result<Vec<Milestone>>;

    /// The current primary, incomplete milestone of an application
    async fn get_primary_milestone(&self, application_id: &str) -> Result<Option<Milestone>>;

    /// Mark a milestone completed and promote the next incomplete milestone
    /// (lowest `sort_order`, ties broken by `created_at` then id) to primary.
    /// The whole sequence is atomic; returns the promoted milestone if any.
    async fn complete_milestone(&self, id: &str) -> Result<Option<Milestone>>;

    /// Atomically clear primary flags for the application and set the target
    async fn set_primary_milestone(&self, application_id: &str, milestone_id: &str)
        -> Result<()>;

    /// Delete every milestone row
    async fn delete_all_milestones(&self) -> Result<()>;
}

/// Trait for persisting reminders
#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Insert one reminder
    async fn insert_reminder(&self, reminder: &Reminder) -> Result<()>;

    /// Fetch a single reminder
    async fn get_reminder_by_id(&self, id: &str) -> Result<Option<Reminder>>;

    /// Reminders belonging to one application
    async fn get_reminders_for_application(&self, application_id: &str)
        -> Result<Vec<Reminder>>;

    /// Non-dismissed reminders ordered by scheduled time
    async fn get_active_reminders(&self) -> Result<Vec<Reminder>>;

    /// Due reminders: scheduled in the past, not dismissed, snooze elapsed
    async fn get_pending_reminders(&self, now_ms: i64) -> Result<Vec<Reminder>>;

    /// Set the dismissed flag
    async fn dismiss_reminder(&self, id: &str) -> Result<()>;

    /// Set the snoozed flag and the snooze-until instant
    async fn snooze_reminder(&self, id: &str, snooze_until: i64) -> Result<()>;

    /// The newest non-dismissed follow-up for a milestone, if any
    async fn get_active_follow_up_for_milestone(
        &self,
        milestone_id: &str,
    ) -> Result<Option<Reminder>>;

    /// The newest non-dismissed first (non-follow-up) reminder for a milestone
    async fn get_active_first_reminder_for_milestone(
        &self,
        milestone_id: &str,
    ) -> Result<Option<Reminder>>;

    /// Delete every reminder row
    async fn delete_all_reminders(&self) -> Result<()>;
}
