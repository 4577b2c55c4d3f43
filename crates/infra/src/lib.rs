//! # Waypoint Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - Encrypted database implementations (SQLite/SQLCipher)
//! - Passphrase provisioning via the OS keychain
//! - Reminder timer queue and catch-up sweep
//! - In-process notification hub
//!
//! ## Architecture
//! - Implements traits defined in `waypoint-core`
//! - Depends on `waypoint-domain` and `waypoint-core`
//! - Contains all "impure" code (I/O, keychain, timers)

pub mod config;
pub mod database;
pub mod errors;
pub mod instance_lock;
pub mod key_manager;
pub mod notifications;
pub mod scheduling;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use instance_lock::*;
pub use key_manager::*;
pub use notifications::*;
