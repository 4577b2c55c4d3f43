//! Job application types
//!
//! An application row is the root record; milestones and reminders cascade
//! from it. Notes are confidentiality-sensitive and only ever live inside
//! the encrypted store.

use serde::{Deserialize, Serialize};

/// Status of a job application
///
/// Persisted by canonical name. Unknown persisted values parse back as
/// `Applied` so a single bad row cannot break list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Applied,
    Interviewing,
    Offered,
    Accepted,
    Declined,
    NoResponse,
    Archived,
}

impl ApplicationStatus {
    /// Canonical name used for persistence
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "APPLIED",
            Self::Interviewing => "INTERVIEWING",
            Self::Offered => "OFFERED",
            Self::Accepted => "ACCEPTED",
            Self::Declined => "DECLINED",
            Self::NoResponse => "NO_RESPONSE",
            Self::Archived => "ARCHIVED",
        }
    }

    /// Parse a persisted name, falling back to `Applied` on unknown values
    pub fn from_str_or_default(value: &str) -> Self {
        match value {
            "APPLIED" => Self::Applied,
            "INTERVIEWING" => Self::Interviewing,
            "OFFERED" => Self::Offered,
            "ACCEPTED" => Self::Accepted,
            "DECLINED" => Self::Declined,
            "NO_RESPONSE" => Self::NoResponse,
            "ARCHIVED" => Self::Archived,
            _ => Self::Applied,
        }
    }

    /// Short label for UI surfaces
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Applied => "Applied",
            Self::Interviewing => "Interviewing",
            Self::Offered => "Offered",
            Self::Accepted => "Accepted",
            Self::Declined => "Declined",
            Self::NoResponse => "No Response",
            Self::Archived => "Archived",
        }
    }

    /// One-line description for UI surfaces
    pub fn description(&self) -> &'static str {
        match self {
            Self::Applied => "Waiting to hear back",
            Self::Interviewing => "In the interview process",
            Self::Offered => "Received an offer!",
            Self::Accepted => "You got the job!",
            Self::Declined => "You decided not to proceed",
            Self::NoResponse => "Haven't heard back yet",
            Self::Archived => "No longer active",
        }
    }
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        Self::Applied
    }
}

/// One job application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub company_name: String,
    pub role_title: String,
    pub job_link: Option<String>,
    pub location: Option<String>,
    pub applied_date: i64,
    pub notes: Option<String>,
    pub status: ApplicationStatus,
    pub is_archived: bool,
    pub notifications_enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Application {
    /// True when the record counts toward the user's active slots
    pub fn is_active(&self) -> bool {
        !self.is_archived
    }
}
