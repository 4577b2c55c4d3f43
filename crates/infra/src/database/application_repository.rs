//! Application repository implementation using SQLCipher
//!
//! Persistence for job application records. Creating an application also
//! inserts its default milestones inside the same transaction so a crash
//! between the two writes cannot leave a milestone-less application.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Row, ToSql};
use tokio::task;
use waypoint_core::tracker::ports::ApplicationRepository as ApplicationRepositoryPort;
use waypoint_domain::{Application, ApplicationStatus, Milestone, Result as DomainResult, WaypointError};

use super::manager::DbManager;
use super::milestone_repository::insert_milestone_row;
use crate::errors::InfraError;

const APPLICATION_COLUMNS: &str = "id, company_name, role_title, job_link, location, applied_date,
        notes, status, is_archived, notifications_enabled, created_at, updated_at";

/// SQLCipher-backed implementation of `ApplicationRepository`
pub struct SqlCipherApplicationRepository {
    db: Arc<DbManager>,
}

impl SqlCipherApplicationRepository {
    /// Create a new repository instance
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ApplicationRepositoryPort for SqlCipherApplicationRepository {
    async fn add_application(
        &self,
        application: &Application,
        milestones: &[Milestone],
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let application = application.clone();
        let milestones = milestones.to_vec();

        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;

            insert_application(&tx, &application).map_err(map_sql_error)?;
            for milestone in &milestones {
                insert_milestone_row(&tx, milestone).map_err(map_sql_error)?;
            }

            tx.commit().map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_application(&self, application: &Application) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let application = application.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            update_application_row(&conn, &application).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_application(&self, id: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM applications WHERE id = ?1", params![&id])
                .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_application_by_id(&self, id: &str) -> DomainResult<Option<Application>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<Application>> {
            let conn = db.get_connection()?;

            let result = conn.query_row(
                &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
                params![&id],
                map_application_row,
            );

            match result {
                Ok(application) => Ok(Some(application)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(map_sql_error(err)),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_all_applications(&self) -> DomainResult<Vec<Application>> {
        self.query_applications(format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications ORDER BY updated_at DESC"
        ))
        .await
    }

    async fn get_active_applications(&self) -> DomainResult<Vec<Application>> {
        self.query_applications(format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications
             WHERE is_archived = 0 ORDER BY updated_at DESC"
        ))
        .await
    }

    async fn get_archived_applications(&self) -> DomainResult<Vec<Application>> {
        self.query_applications(format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications
             WHERE is_archived = 1 ORDER BY updated_at DESC"
        ))
        .await
    }

    async fn get_active_application_count(&self) -> DomainResult<u32> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<u32> {
            let conn = db.get_connection()?;
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM applications WHERE is_archived = 0",
                    [],
                    |row| row.get(0),
                )
                .map_err(map_sql_error)?;
            Ok(count.max(0) as u32)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_archived(&self, id: &str, archived: bool, updated_at: i64) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE applications SET is_archived = ?1, updated_at = ?2 WHERE id = ?3",
                params![bool_to_int(archived), updated_at, &id],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_status(
        &self,
        id: &str,
        status: ApplicationStatus,
        updated_at: i64,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE applications SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), updated_at, &id],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_notifications_enabled(
        &self,
        id: &str,
        enabled: bool,
        updated_at: i64,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE applications SET notifications_enabled = ?1, updated_at = ?2 WHERE id = ?3",
                params![bool_to_int(enabled), updated_at, &id],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_all_applications(&self) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM applications", []).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

impl SqlCipherApplicationRepository {
    async fn query_applications(&self, sql: String) -> DomainResult<Vec<Application>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<Application>> {
            let conn = db.get_connection()?;
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let rows = stmt
                .query_map([], map_application_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
            Ok(rows)
        })
        .await
        .map_err(map_join_error)?
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Map a row to an Application
fn map_application_row(row: &Row) -> rusqlite::Result<Application> {
    let raw_status: String = row.get(7)?;
    let status = ApplicationStatus::from_str_or_default(&raw_status);
    if status.as_str() != raw_status {
        tracing::warn!(stored = %raw_status, "Unknown application status; defaulting to APPLIED");
    }
    Ok(Application {
        id: row.get(0)?,
        company_name: row.get(1)?,
        role_title: row.get(2)?,
        job_link: row.get(3)?,
        location: row.get(4)?,
        applied_date: row.get(5)?,
        notes: row.get(6)?,
        status,
        is_archived: int_to_bool(row.get(8)?),
        notifications_enabled: int_to_bool(row.get(9)?),
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Insert an application row
fn insert_application(
    conn: &rusqlite::Connection,
    application: &Application,
) -> rusqlite::Result<()> {
    let status = application.status.as_str();
    let params: [&dyn ToSql; 12] = [
        &application.id,
        &application.company_name,
        &application.role_title,
        &application.job_link,
        &application.location,
        &application.applied_date,
        &application.notes,
        &status,
        &bool_to_int(application.is_archived),
        &bool_to_int(application.notifications_enabled),
        &application.created_at,
        &application.updated_at,
    ];

    conn.execute(
        "INSERT INTO applications (
            id, company_name, role_title, job_link, location, applied_date,
            notes, status, is_archived, notifications_enabled, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params.as_slice(),
    )?;

    Ok(())
}

/// Update an application row
fn update_application_row(
    conn: &rusqlite::Connection,
    application: &Application,
) -> rusqlite::Result<()> {
    let status = application.status.as_str();
    let params: [&dyn ToSql; 11] = [
        &application.company_name,
        &application.role_title,
        &application.job_link,
        &application.location,
        &application.applied_date,
        &application.notes,
        &status,
        &bool_to_int(application.is_archived),
        &bool_to_int(application.notifications_enabled),
        &application.updated_at,
        &application.id, // WHERE clause
    ];

    conn.execute(
        "UPDATE applications SET
            company_name = ?1, role_title = ?2, job_link = ?3, location = ?4,
            applied_date = ?5, notes = ?6, status = ?7, is_archived = ?8,
            notifications_enabled = ?9, updated_at = ?10
         WHERE id = ?11",
        params.as_slice(),
    )?;

    Ok(())
}

// =============================================================================
// Error Mapping
// =============================================================================

fn map_sql_error(err: rusqlite::Error) -> WaypointError {
    WaypointError::from(InfraError::from(err))
}

fn map_join_error(err: task::JoinError) -> WaypointError {
    WaypointError::Internal(format!("Task join error: {err}"))
}

// =============================================================================
// Utility Functions
// =============================================================================

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn int_to_bool(value: i64) -> bool {
    value != 0
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;

    const TEST_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn setup_test_db() -> (Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let manager = DbManager::new(&db_path, 5, Some(TEST_KEY)).expect("create db manager");
        manager.run_migrations().expect("run migrations");
        (Arc::new(manager), temp_dir)
    }

    fn create_test_application(company: &str, created_at: i64) -> Application {
        Application {
            id: Uuid::new_v4().to_string(),
            company_name: company.to_string(),
            role_title: "Engineer".to_string(),
            job_link: Some("https://example.com/job".to_string()),
            location: Some("Remote".to_string()),
            applied_date: created_at,
            notes: Some("Referred by Sam".to_string()),
            status: ApplicationStatus::Applied,
            is_archived: false,
            notifications_enabled: true,
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_and_get_by_id() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqlCipherApplicationRepository::new(db);
        let app = create_test_application("Acme", 1_000);

        repo.add_application(&app, &[]).await.expect("add application");

        let retrieved =
            repo.get_application_by_id(&app.id).await.expect("get application").unwrap();
        assert_eq!(retrieved.company_name, "Acme");
        assert_eq!(retrieved.status, ApplicationStatus::Applied);
        assert_eq!(retrieved.notes, Some("Referred by Sam".to_string()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_with_milestones_is_atomic() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqlCipherApplicationRepository::new(Arc::clone(&db));
        let app = create_test_application("Acme", 1_000);
        let milestones = Milestone::default_milestones_for(&app.id, 1_000);

        repo.add_application(&app, &milestones).await.expect("add application");

        let conn = db.get_connection().expect("connection");
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM milestones WHERE application_id = ?1",
                params![&app.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_rolls_back_on_milestone_conflict() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqlCipherApplicationRepository::new(db);
        let app = create_test_application("Acme", 1_000);
        let mut milestones = Milestone::default_milestones_for(&app.id, 1_000);
        // Duplicate primary key forces the second milestone insert to fail
        milestones[1].id = milestones[0].id.clone();

        let result = repo.add_application(&app, &milestones).await;
        assert!(result.is_err());

        let retrieved = repo.get_application_by_id(&app.id).await.expect("query");
        assert!(retrieved.is_none(), "application insert must roll back too");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_nonexistent_returns_none() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqlCipherApplicationRepository::new(db);

        let retrieved = repo.get_application_by_id("missing").await.expect("query");
        assert!(retrieved.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_application() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqlCipherApplicationRepository::new(db);
        let mut app = create_test_application("Acme", 1_000);

        repo.add_application(&app, &[]).await.expect("add");

        app.role_title = "Staff Engineer".to_string();
        app.location = None;
        app.updated_at = 2_000;
        repo.update_application(&app).await.expect("update");

        let retrieved = repo.get_application_by_id(&app.id).await.expect("get").unwrap();
        assert_eq!(retrieved.role_title, "Staff Engineer");
        assert_eq!(retrieved.location, None);
        assert_eq!(retrieved.updated_at, 2_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lists_order_by_updated_at_desc() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqlCipherApplicationRepository::new(db);

        let older = create_test_application("Older", 1_000);
        let newer = create_test_application("Newer", 2_000);
        repo.add_application(&older, &[]).await.expect("add older");
        repo.add_application(&newer, &[]).await.expect("add newer");

        let all = repo.get_all_applications().await.expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].company_name, "Newer");
        assert_eq!(all[1].company_name, "Older");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_archive_partitions_lists_and_count() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqlCipherApplicationRepository::new(db);

        let active = create_test_application("Active", 1_000);
        let archived = create_test_application("Archived", 2_000);
        repo.add_application(&active, &[]).await.expect("add active");
        repo.add_application(&archived, &[]).await.expect("add archived");

        repo.set_archived(&archived.id, true, 3_000).await.expect("archive");

        let active_list = repo.get_active_applications().await.expect("active list");
        assert_eq!(active_list.len(), 1);
        assert_eq!(active_list[0].company_name, "Active");

        let archived_list = repo.get_archived_applications().await.expect("archived list");
        assert_eq!(archived_list.len(), 1);
        assert_eq!(archived_list[0].company_name, "Archived");
        assert_eq!(archived_list[0].updated_at, 3_000);

        let count = repo.get_active_application_count().await.expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_status_and_notifications_flag() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqlCipherApplicationRepository::new(db);
        let app = create_test_application("Acme", 1_000);
        repo.add_application(&app, &[]).await.expect("add");

        repo.update_status(&app.id, ApplicationStatus::Interviewing, 2_000)
            .await
            .expect("status");
        repo.update_notifications_enabled(&app.id, false, 3_000).await.expect("flag");

        let retrieved = repo.get_application_by_id(&app.id).await.expect("get").unwrap();
        assert_eq!(retrieved.status, ApplicationStatus::Interviewing);
        assert!(!retrieved.notifications_enabled);
        assert_eq!(retrieved.updated_at, 3_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_status_reads_back_as_applied() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqlCipherApplicationRepository::new(Arc::clone(&db));
        let app = create_test_application("Acme", 1_000);
        repo.add_application(&app, &[]).await.expect("add");

        let conn = db.get_connection().expect("connection");
        conn.execute(
            "UPDATE applications SET status = 'REJECTED' WHERE id = ?1",
            params![&app.id],
        )
        .unwrap();

        let retrieved = repo.get_application_by_id(&app.id).await.expect("get").unwrap();
        assert_eq!(retrieved.status, ApplicationStatus::Applied);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_cascades_to_milestones() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqlCipherApplicationRepository::new(Arc::clone(&db));
        let app = create_test_application("Acme", 1_000);
        let milestones = Milestone::default_milestones_for(&app.id, 1_000);
        repo.add_application(&app, &milestones).await.expect("add");

        repo.delete_application(&app.id).await.expect("delete");

        let conn = db.get_connection().expect("connection");
        let remaining: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM milestones WHERE application_id = ?1",
                params![&app.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_all_applications() {
        let (db, _temp_dir) = setup_test_db();
        let repo = SqlCipherApplicationRepository::new(db);
        repo.add_application(&create_test_application("A", 1), &[]).await.expect("add");
        repo.add_application(&create_test_application("B", 2), &[]).await.expect("add");

        repo.delete_all_applications().await.expect("delete all");

        let all = repo.get_all_applications().await.expect("list");
        assert!(all.is_empty());
    }
}
