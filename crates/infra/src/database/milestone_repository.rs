//! Milestone repository implementation using SQLCipher
//!
//! Owns the only-one-primary invariant: completion promotion and explicit
//! primary changes run clear-then-set inside one transaction so readers
//! never observe two primary milestones for the same application.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Row, ToSql};
use tokio::task;
use waypoint_core::tracker::ports::MilestoneRepository as MilestoneRepositoryPort;
use waypoint_domain::{Milestone, Result as DomainResult, WaypointError};

use super::manager::DbManager;
use crate::errors::InfraError;

const MILESTONE_COLUMNS: &str = "id, application_id, title, description, due_date,
        is_completed, is_primary, created_at, sort_order";

/// SQLCipher-backed implementation of `MilestoneRepository`
pub struct SqlCipherMilestoneRepository {
    db: Arc<DbManager>,
}

impl SqlCipherMilestoneRepository {
    /// Create a new repository instance
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MilestoneRepositoryPort for SqlCipherMilestoneRepository {
    async fn insert_milestone(&self, milestone: &Milestone) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let milestone = milestone.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            insert_milestone_row(&conn, &milestone).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_milestone(&self, milestone: &Milestone) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let milestone = milestone.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            update_milestone_row(&conn, &milestone).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_milestone_by_id(&self, id: &str) -> DomainResult<Option<Milestone>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<Milestone>> {
            let conn = db.get_connection()?;

            let result = conn.query_row(
                &format!("SELECT {MILESTONE_COLUMNS} FROM milestones WHERE id = ?1"),
                params![&id],
                map_milestone_row,
            );

            match result {
                Ok(milestone) => Ok(Some(milestone)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(map_sql_error(err)),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_milestones_for_application(
        &self,
        application_id: &str,
    ) -> DomainResult<Vec<Milestone>> {
        let db = Arc::clone(&self.db);
        let application_id = application_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<Milestone>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {MILESTONE_COLUMNS} FROM milestones
                     WHERE application_id = ?1
                     ORDER BY sort_order ASC, created_at ASC"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![&application_id], map_milestone_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
            Ok(rows)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_primary_milestone(&self, application_id: &str) -> DomainResult<Option<Milestone>> {
        let db = Arc::clone(&self.db);
        let application_id = application_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<Milestone>> {
            let conn = db.get_connection()?;

            let result = conn.query_row(
                &format!(
                    "SELECT {MILESTONE_COLUMNS} FROM milestones
                     WHERE application_id = ?1 AND is_primary = 1 AND is_completed = 0
                     LIMIT 1"
                ),
                params![&application_id],
                map_milestone_row,
            );

            match result {
                Ok(milestone) => Ok(Some(milestone)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(map_sql_error(err)),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    async fn complete_milestone(&self, id: &str) -> DomainResult<Option<Milestone>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<Milestone>> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;

            let application_id: String = match tx.query_row(
                "SELECT application_id FROM milestones WHERE id = ?1",
                params![&id],
                |row| row.get(0),
            ) {
                Ok(application_id) => application_id,
                // Completing a milestone that was deleted underneath us is a no-op
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                Err(err) => return Err(map_sql_error(err)),
            };

            tx.execute("UPDATE milestones SET is_completed = 1 WHERE id = ?1", params![&id])
                .map_err(map_sql_error)?;

            let next = match tx.query_row(
                &format!(
                    "SELECT {MILESTONE_COLUMNS} FROM milestones
                     WHERE application_id = ?1 AND is_completed = 0 AND id != ?2
                     ORDER BY sort_order ASC, created_at ASC, id ASC
                     LIMIT 1"
                ),
                params![&application_id, &id],
                map_milestone_row,
            ) {
                Ok(milestone) => Some(milestone),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(err) => return Err(map_sql_error(err)),
            };

            tx.execute(
                "UPDATE milestones SET is_primary = 0 WHERE application_id = ?1",
                params![&application_id],
            )
            .map_err(map_sql_error)?;
            if let Some(ref winner) = next {
                tx.execute(
                    "UPDATE milestones SET is_primary = 1 WHERE id = ?1",
                    params![&winner.id],
                )
                .map_err(map_sql_error)?;
            }

            tx.commit().map_err(map_sql_error)?;
            Ok(next.map(|mut milestone| {
                milestone.is_primary = true;
                milestone
            }))
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_primary_milestone(
        &self,
        application_id: &str,
        milestone_id: &str,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let application_id = application_id.to_string();
        let milestone_id = milestone_id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;

            tx.execute(
                "UPDATE milestones SET is_primary = 0 WHERE application_id = ?1",
                params![&application_id],
            )
            .map_err(map_sql_error)?;

            let changed = tx
                .execute(
                    "UPDATE milestones SET is_primary = 1
                     WHERE id = ?1 AND application_id = ?2",
                    params![&milestone_id, &application_id],
                )
                .map_err(map_sql_error)?;
            if changed == 0 {
                // Dropping the transaction keeps the previous primary intact
                return Err(WaypointError::NotFound(format!("milestone {milestone_id}")));
            }

            tx.commit().map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete_all_milestones(&self) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM milestones", []).map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Map a row to a Milestone
fn map_milestone_row(row: &Row) -> rusqlite::Result<Milestone> {
    Ok(Milestone {
        id: row.get(0)?,
        application_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        due_date: row.get(4)?,
        is_completed: int_to_bool(row.get(5)?),
        is_primary: int_to_bool(row.get(6)?),
        created_at: row.get(7)?,
        sort_order: row.get(8)?,
    })
}

/// Insert a milestone row. Shared with the application repository so the
/// create-with-default-milestones transaction writes identical rows.
pub(crate) fn insert_milestone_row(
    conn: &rusqlite::Connection,
    milestone: &Milestone,
) -> rusqlite::Result<()> {
    let params: [&dyn ToSql; 9] = [
        &milestone.id,
        &milestone.application_id,
        &milestone.title,
        &milestone.description,
        &milestone.due_date,
        &bool_to_int(milestone.is_completed),
        &bool_to_int(milestone.is_primary),
        &milestone.created_at,
        &milestone.sort_order,
    ];

    conn.execute(
        "INSERT INTO milestones (
            id, application_id, title, description, due_date,
            is_completed, is_primary, created_at, sort_order
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params.as_slice(),
    )?;

    Ok(())
}

/// Update a milestone row
fn update_milestone_row(
    conn: &rusqlite::Connection,
    milestone: &Milestone,
) -> rusqlite::Result<()> {
    let params: [&dyn ToSql; 7] = [
        &milestone.title,
        &milestone.description,
        &milestone.due_date,
        &bool_to_int(milestone.is_completed),
        &bool_to_int(milestone.is_primary),
        &milestone.sort_order,
        &milestone.id, // WHERE clause
    ];

    conn.execute(
        "UPDATE milestones SET
            title = ?1, description = ?2, due_date = ?3, is_completed = ?4,
            is_primary = ?5, sort_order = ?6
         WHERE id = ?7",
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
