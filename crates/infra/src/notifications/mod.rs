//! Notification delivery
//!
//! The hub is the in-process notification surface: fire and action handlers
//! post and cancel through it, UI collaborators subscribe to its event
//! stream.

pub mod hub;

pub use hub::{NotificationChannel, NotificationEvent, NotificationHub, PostedNotification};
