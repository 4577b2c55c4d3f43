//! Scheduling infrastructure for reminder delivery
//!
//! This module provides the two halves of reminder scheduling:
//! - Reminder queue (one timer task per queued reminder)
//! - Catch-up sweep (cron job that re-queues pending reminders)
//!
//! All schedulers follow the same runtime rules:
//! - Explicit lifecycle management (start/stop)
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Timeout wrapping on all async operations

pub mod error;
pub mod reminder_queue;
pub mod sweep;

pub use error::{SchedulerError, SchedulerResult};
pub use reminder_queue::{DueReminderHandler, ReminderQueue};
pub use sweep::{
    cron_for_interval, CatchUpSweepJob, ReminderSweepConfig, ReminderSweepScheduler, SweepJob,
};
