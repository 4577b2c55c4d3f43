//! Reminder queue diagnostics
//!
//! Snapshot of the live reminder set for a debug surface: how many nudges
//! are due right now, how many are active at all, and when the next one
//! is expected to fire.

use waypoint_domain::Reminder;

/// Point-in-time view over the active reminder set
#[derive(Debug, Clone, Default)]
pub struct ReminderDiagnostics {
    pub pending_count: usize,
    pub active_count: usize,
    pub next_scheduled_time: Option<i64>,
    pub active_reminders: Vec<Reminder>,
}

impl ReminderDiagnostics {
    /// Build a snapshot from the non-dismissed reminders
    pub fn from_reminders(mut active: Vec<Reminder>, now_ms: i64) -> Self {
        let pending_count = active.iter().filter(|r| r.is_pending(now_ms)).count();
        let next_scheduled_time = active
            .iter()
            .filter(|r| {
                r.scheduled_time > now_ms
                    || r.snooze_until.map_or(false, |until| until > now_ms)
            })
            .map(Reminder::effective_time)
            .min();

        active.sort_by_key(|r| r.scheduled_time);
        Self {
            pending_count,
            active_count: active.len(),
            next_scheduled_time,
            active_reminders: active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reminder(id: &str, scheduled: i64, snooze: Option<i64>) -> Reminder {
        Reminder {
            id: id.to_string(),
            milestone_id: "m1".to_string(),
            application_id: "a1".to_string(),
            scheduled_time: scheduled,
            is_follow_up: false,
            is_dismissed: false,
            is_snoozed: snooze.is_some(),
            snooze_until: snooze,
            created_at: 0,
        }
    }

    #[test]
    fn counts_due_and_future_reminders() {
        let now = 10_000;
        let diagnostics = ReminderDiagnostics::from_reminders(
            vec![
                reminder("due", 5_000, None),
                reminder("future", 20_000, None),
                reminder("snoozed", 1_000, Some(30_000)),
            ],
            now,
        );

        assert_eq!(diagnostics.active_count, 3);
        assert_eq!(diagnostics.pending_count, 1);
        // next fire: min(20_000, snooze 30_000)
        assert_eq!(diagnostics.next_scheduled_time, Some(20_000));
    }

    #[test]
    fn empty_set_has_no_next_time() {
        let diagnostics = ReminderDiagnostics::from_reminders(Vec::new(), 0);
        assert_eq!(diagnostics.pending_count, 0);
        assert_eq!(diagnostics.next_scheduled_time, None);
    }

    #[test]
    fn active_list_is_sorted_by_schedule() {
        let diagnostics = ReminderDiagnostics::from_reminders(
            vec![reminder("b", 2_000, None), reminder("a", 1_000, None)],
            0,
        );
        let ids: Vec<_> =
            diagnostics.active_reminders.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
