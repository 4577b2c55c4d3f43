//! Reminder repository implementation using SQLCipher
//!
//! Reminder rows are the durable record behind every queued nudge. The
//! pending predicate here must match `Reminder::is_pending` exactly; the
//! catch-up sweep relies on it to find work lost to a restart.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Row, ToSql};
use tokio::task;
use waypoint_core::tracker::ports::ReminderRepository as ReminderRepositoryPort;
use waypoint_domain::{Reminder, Result as DomainResult, WaypointError};

use super::manager::DbManager;
use crate::errors::InfraError;

const REMINDER_COLUMNS: &str = "id, milestone_id, application_id, scheduled_time,
        is_follow_up, is_dismissed, is_snoozed, snooze_until, created_at";

/// SQLCipher-backed implementation of `ReminderRepository`
pub struct SqlCipherReminderRepository {
    db: Arc<DbManager>,
}

impl SqlCipherReminderRepository {
    /// Create a new repository instance
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn query_reminders(
        &self,
        sql: String,
        bind: Vec<rusqlite::types::Value>,
    ) -> DomainResult<Vec<Reminder>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<Reminder>> {
            let conn = db.get_connection()?;
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(bind), map_reminder_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
            Ok(rows)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn query_newest_for_milestone(
        &self,
        milestone_id: &str,
        is_follow_up: bool,
    ) -> DomainResult<Option<Reminder>> {
        let db = Arc::clone(&self.db);
        let milestone_id = milestone_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<Reminder>> {
            let conn = db.get_connection()?;

            let result = conn.query_row(
                &format!(
                    "SELECT {REMINDER_COLUMNS} FROM reminders
                     WHERE milestone_id = ?1 AND is_follow_up = ?2 AND is_dismissed = 0
                     ORDER BY scheduled_time DESC
                     LIMIT 1"
                ),
                params![&milestone_id, bool_to_int(is_follow_up)],
                map_reminder_row,
            );

            match result {
                Ok(reminder) => Ok(Some(reminder)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(map_sql_error(err)),
            }
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl ReminderRepositoryPort for SqlCipherReminderRepository {
    async fn insert_reminder(&self, reminder: &Reminder) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let reminder = reminder.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            insert_reminder_row(&conn, &reminder).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_reminder_by_id(&self, id: &str) -> DomainResult<Option<Reminder>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<Reminder>> {
            let conn = db.get_connection()?;

            let result = conn.query_row(
                &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"),
                params![&id],
                map_reminder_row,
            );

            match result {
                Ok(reminder) => Ok(Some(reminder)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(map_sql_error(err)),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_reminders_for_application(
        &self,
        application_id: &str,
    ) -> DomainResult<Vec<Reminder>> {
        self.query_reminders(
            format!(
                "SELECT {REMINDER_COLUMNS} FROM reminders
                 WHERE application_id = ?1
                 ORDER BY scheduled_time ASC"
            ),
            vec![rusqlite::types::Value::Text(application_id.to_string())],
        )
        .await
    }

    async fn get_active_reminders(&self) -> DomainResult<Vec<Reminder>> {
        self.query_reminders(
            format!(
                "SELECT {REMINDER_COLUMNS} FROM reminders
                 WHERE is_dismissed = 0
                 ORDER BY scheduled_time ASC"
            ),
            vec![],
        )
        .await
    }

    async fn get_pending_reminders(&self, now_ms: i64) -> DomainResult<Vec<Reminder>> {
        self.query_reminders(
            format!(
                "SELECT {REMINDER_COLUMNS} FROM reminders
                 WHERE scheduled_time <= ?1
                   AND is_dismissed = 0
                   AND (snooze_until IS NULL OR snooze_until <= ?1)
                 ORDER BY scheduled_time ASC"
            ),
            vec![rusqlite::types::Value::Integer(now_ms)],
        )
        .await
    }

    async fn dismiss_reminder(&self, id: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute("UPDATE reminders SET is_dismissed = 1 WHERE id = ?1", params![&id])
                .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn snooze_reminder(&self, id: &str, snooze_until: i64) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE reminders SET is_snoozed = 1, snooze_until = ?1 WHERE id = ?2",
                params![snooze_until, &id],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_active_follow_up_for_milestone(
        &self,
        milestone_id: &str,
    ) -> DomainResult<Option<Reminder>> {
        self.query_newest_for_milestone(milestone_id, true).await
    }

    async fn get_active_first_reminder_for_milestone(
        &self,
        milestone_id: &str,
    ) -> DomainResult<Option<Reminder>> {
        self.query_newest_for_milestone(milestone_id, false).await
    }

    async fn delete_all_reminders(&self) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM reminders", []).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Map a row to a Reminder
fn map_reminder_row(row: &Row) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: row.get(0)?,
        milestone_id: row.get(1)?,
        application_id: row.get(2)?,
        scheduled_time: row.get(3)?,
        is_follow_up: int_to_bool(row.get(4)?),
        is_dismissed: int_to_bool(row.get(5)?),
        is_snoozed: int_to_bool(row.get(6)?),
        snooze_until: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Insert a reminder row
fn insert_reminder_row(conn: &rusqlite::Connection, reminder: &Reminder) -> rusqlite::Result<()> {
    let params: [&dyn ToSql; 9] = [
        &reminder.id,
        &reminder.milestone_id,
        &reminder.application_id,
        &reminder.scheduled_time,
        &bool_to_int(reminder.is_follow_up),
        &bool_to_int(reminder.is_dismissed),
        &bool_to_int(reminder.is_snoozed),
        &reminder.snooze_until,
        &reminder.created_at,
    ];

    conn.execute(
        "INSERT INTO reminders (
            id, milestone_id, application_id, scheduled_time,
            is_follow_up, is_dismissed, is_snoozed, snooze_until, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
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
