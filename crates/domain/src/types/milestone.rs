//! Milestone types
//!
//! A milestone is a next-action step within one application. At most one
//! milestone per application may be primary and incomplete at the same time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DEFAULT_FIRST_MILESTONE_OFFSET_MS, DEFAULT_SECOND_MILESTONE_OFFSET_MS};

/// One next-action step tied to an application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub application_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<i64>,
    pub is_completed: bool,
    pub is_primary: bool,
    pub created_at: i64,
    pub sort_order: i32,
}

impl Milestone {
    /// Default milestones suggested when a new application is created.
    ///
    /// The first is primary and due in a week, the second follows a week
    /// later. Meant as calm suggestions, not pressure.
    pub fn default_milestones_for(application_id: &str, now_ms: i64) -> Vec<Self> {
        vec![
            Self {
                id: Uuid::new_v4().to_string(),
                application_id: application_id.to_string(),
                title: "Wait for initial response".to_string(),
                description: Some("Companies typically respond within 1-2 weeks".to_string()),
                due_date: Some(now_ms + DEFAULT_FIRST_MILESTONE_OFFSET_MS),
                is_completed: false,
                is_primary: true,
                created_at: now_ms,
                sort_order: 0,
            },
            Self {
                id: Uuid::new_v4().to_string(),
                application_id: application_id.to_string(),
                title: "Consider follow-up".to_string(),
                description: Some("If no response, a polite follow-up email can help".to_string()),
                due_date: Some(now_ms + DEFAULT_SECOND_MILESTONE_OFFSET_MS),
                is_completed: false,
                is_primary: false,
                created_at: now_ms,
                sort_order: 1,
            },
        ]
    }
}
