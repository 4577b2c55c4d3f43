use std::sync::Arc;

use tempfile::TempDir;
use waypoint_domain::{Application, ApplicationStatus, Milestone, Reminder};
use waypoint_infra::database::DbManager;

pub const TEST_DB_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new temporary database with migrations applied.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("test.db");

        let manager =
            DbManager::new(&db_path, 4, Some(TEST_DB_KEY)).expect("db manager should be created");
        manager.run_migrations().expect("schema migrations should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    /// Execute a batch of SQL statements against the database.
    #[allow(dead_code)]
    pub fn execute_batch(&self, sql: &str) {
        let conn = self
            .manager
            .get_connection()
            .expect("connection should be available for execute_batch");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Utility helper for constructing applications inside tests.
pub fn make_application(id: &str, company: &str, applied_date: i64) -> Application {
    Application {
        id: id.to_string(),
        company_name: company.to_string(),
        role_title: "Engineer".to_string(),
        job_link: None,
        location: Some("Remote".to_string()),
        applied_date,
        notes: None,
        status: ApplicationStatus::Applied,
        is_archived: false,
        notifications_enabled: true,
        created_at: applied_date,
        updated_at: applied_date,
    }
}

/// Utility helper for constructing milestones inside tests.
pub fn make_milestone(id: &str, application_id: &str, title: &str, sort_order: i32) -> Milestone {
    Milestone {
        id: id.to_string(),
        application_id: application_id.to_string(),
        title: title.to_string(),
        description: None,
        due_date: None,
        is_completed: false,
        is_primary: sort_order == 0,
        created_at: 1_000 + i64::from(sort_order),
        sort_order,
    }
}

/// Utility helper for constructing reminders inside tests.
pub fn make_reminder(
    id: &str,
    milestone_id: &str,
    application_id: &str,
    scheduled_time: i64,
) -> Reminder {
    Reminder {
        id: id.to_string(),
        milestone_id: milestone_id.to_string(),
        application_id: application_id.to_string(),
        scheduled_time,
        is_follow_up: false,
        is_dismissed: false,
        is_snoozed: false,
        snooze_until: None,
        created_at: scheduled_time,
    }
}
