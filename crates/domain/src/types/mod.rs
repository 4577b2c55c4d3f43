//! Domain types and models

pub mod application;
pub mod milestone;
pub mod reminder;
pub mod settings;

// Re-export record types for convenience
pub use application::{Application, ApplicationStatus};
pub use milestone::Milestone;
pub use reminder::Reminder;
pub use settings::UserSettings;
