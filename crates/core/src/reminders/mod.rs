//! Reminder lifecycle: scheduling ports, fire-time state machine,
//! notification actions and queue diagnostics

pub mod actions;
pub mod diagnostics;
pub mod fire;
pub mod ports;

pub use actions::ReminderActionHandler;
pub use diagnostics::ReminderDiagnostics;
pub use fire::{FireOutcome, ReminderFireHandler};
