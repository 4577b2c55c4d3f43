//! Reminder types
//!
//! A reminder is a scheduled nudge for one milestone, denormalized to its
//! application for query efficiency. The scheduled work item carries only
//! the reminder id; state is re-read from the store at fire time.

use serde::{Deserialize, Serialize};

/// One scheduled nudge tied to a milestone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub milestone_id: String,
    pub application_id: String,
    pub scheduled_time: i64,
    pub is_follow_up: bool,
    pub is_dismissed: bool,
    pub is_snoozed: bool,
    pub snooze_until: Option<i64>,
    pub created_at: i64,
}

impl Reminder {
    /// True when the reminder has not been dismissed
    pub fn is_active(&self) -> bool {
        !self.is_dismissed
    }

    /// True when the reminder is due: scheduled in the past, not dismissed,
    /// and any snooze window has elapsed
    pub fn is_pending(&self, now_ms: i64) -> bool {
        self.scheduled_time <= now_ms
            && !self.is_dismissed
            && self.snooze_until.map_or(true, |until| until <= now_ms)
    }

    /// The instant the reminder should next fire, honoring an active snooze
    pub fn effective_time(&self) -> i64 {
        self.snooze_until.unwrap_or(self.scheduled_time)
    }
}
