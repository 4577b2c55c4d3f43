//! Configuration structures
//!
//! Typed runtime configuration consumed by the infra loader and the
//! composition root. Defaults describe a standalone desktop deployment.

use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding the database file, passphrase blob and lock file
    pub data_dir: String,
    /// Database file name inside `data_dir`
    pub file_name: String,
    /// Connection pool size
    pub pool_size: u32,
}

/// Reminder scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Catch-up sweep interval in seconds
    pub sweep_interval_seconds: u64,
    /// Whether the catch-up sweep runs at all
    pub sweep_enabled: bool,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Global capability switch for posting notifications
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { data_dir: ".".to_string(), file_name: "waypoint.db".to_string(), pool_size: 5 }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { sweep_interval_seconds: 900, sweep_enabled: true }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
