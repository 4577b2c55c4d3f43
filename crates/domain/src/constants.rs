//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Milestone defaults
pub const DEFAULT_FIRST_MILESTONE_OFFSET_MS: i64 = 7 * 24 * 60 * 60 * 1000;
pub const DEFAULT_SECOND_MILESTONE_OFFSET_MS: i64 = 14 * 24 * 60 * 60 * 1000;

// Reminder timing
pub const FOLLOW_UP_DELAY_MS: i64 = 24 * 60 * 60 * 1000;
pub const SNOOZE_DURATION_MS: i64 = 60 * 60 * 1000;

// Entitlement slots
pub const BASE_ACTIVE_SLOTS: u32 = 3;
pub const SUBSCRIPTION_BONUS_SLOTS: u32 = 15;
pub const SLOTS_PER_PACK: u32 = 5;

// Notification channel
pub const NOTIFICATION_CHANNEL_ID: &str = "waypoint_reminders";
pub const NOTIFICATION_CHANNEL_NAME: &str = "Reminders";
pub const NOTIFICATION_CHANNEL_DESCRIPTION: &str =
    "Gentle reminders for your job applications";
pub const NOTIFICATION_ACTION_SNOOZE: &str = "Snooze 1h";
pub const NOTIFICATION_ACTION_DISMISS: &str = "Dismiss";

// Scheduler work naming
pub const REMINDER_WORK_PREFIX: &str = "reminder:";
