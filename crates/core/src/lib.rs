//! # Waypoint Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits)
//! - Use cases and services
//! - The reminder fire/action state machines
//!
//! ## Architecture Principles
//! - Only depends on `waypoint-domain`
//! - No database or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod entitlement;
pub mod export;
pub mod reminders;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export specific items to avoid ambiguity
pub use entitlement::{EntitlementProvider, EntitlementService, FakeEntitlementProvider};
pub use export::ExportService;
pub use reminders::actions::ReminderActionHandler;
pub use reminders::diagnostics::ReminderDiagnostics;
pub use reminders::fire::{FireOutcome, ReminderFireHandler};
pub use reminders::ports::{ReminderNotification, ReminderNotifier, ReminderScheduler};
pub use tracker::changes::{ChangeNotifier, Table};
pub use tracker::ports::{ApplicationRepository, MilestoneRepository, ReminderRepository};
pub use tracker::TrackerService;
