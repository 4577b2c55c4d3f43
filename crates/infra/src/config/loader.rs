//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the environment is not configured, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Falls back to built-in defaults when neither source exists
//!
//! ## Environment Variables
//! - `WAYPOINT_DATA_DIR`: Directory for the database, passphrase blob and
//!   lock file (required for environment-based loading)
//! - `WAYPOINT_DB_FILE`: Database file name inside the data directory
//! - `WAYPOINT_DB_POOL_SIZE`: Connection pool size
//! - `WAYPOINT_SWEEP_INTERVAL`: Catch-up sweep interval in seconds
//! - `WAYPOINT_SWEEP_ENABLED`: Whether the catch-up sweep runs (true/false)
//! - `WAYPOINT_NOTIFICATIONS_ENABLED`: Global notification capability
//!   (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./waypoint.json` or `./waypoint.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};

use waypoint_domain::{
    Config, DatabaseConfig, NotificationConfig, Result, SchedulerConfig, WaypointError,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables, then from a config
/// file. When neither source is present the built-in defaults are used, so
/// loading never fails on a fresh machine.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            match load_from_file(None) {
                Ok(config) => Ok(config),
                Err(e) => {
                    tracing::info!(error = ?e, "No configuration found, using defaults");
                    Ok(Config::default())
                }
            }
        }
    }
}

/// Load configuration from environment variables
///
/// `WAYPOINT_DATA_DIR` must be present; every other variable falls back to
/// its default when unset.
///
/// # Errors
/// Returns `WaypointError::Config` if the data directory is missing or a
/// set variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let defaults = Config::default();

    let data_dir = env_var("WAYPOINT_DATA_DIR")?;
    let file_name =
        std::env::var("WAYPOINT_DB_FILE").unwrap_or(defaults.database.file_name);
    let pool_size = env_parse("WAYPOINT_DB_POOL_SIZE", defaults.database.pool_size)?;

    let sweep_interval =
        env_parse("WAYPOINT_SWEEP_INTERVAL", defaults.scheduler.sweep_interval_seconds)?;
    let sweep_enabled = env_bool("WAYPOINT_SWEEP_ENABLED", defaults.scheduler.sweep_enabled);

    let notifications_enabled =
        env_bool("WAYPOINT_NOTIFICATIONS_ENABLED", defaults.notifications.enabled);

    Ok(Config {
        database: DatabaseConfig { data_dir, file_name, pool_size },
        scheduler: SchedulerConfig {
            sweep_interval_seconds: sweep_interval,
            sweep_enabled,
        },
        notifications: NotificationConfig { enabled: notifications_enabled },
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Arguments
/// * `path` - Optional path to config file. If `None`, uses
///   [`probe_config_paths`].
///
/// # Errors
/// Returns `WaypointError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(WaypointError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            WaypointError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| WaypointError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| WaypointError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| WaypointError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(WaypointError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches for config files in the following locations (in order):
/// 1. Current working directory (`./config.{json,toml}`,
///    `./waypoint.{json,toml}`)
/// 2. Parent directories (up to 2 levels)
/// 3. Relative to executable location
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    // Try current working directory
    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("waypoint.json"),
            cwd.join("waypoint.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
            cwd.join("../../config.json"),
            cwd.join("../../config.toml"),
        ]);
    }

    // Try relative to executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("waypoint.json"),
                exe_dir.join("waypoint.toml"),
                exe_dir.join("../config.json"),
                exe_dir.join("../config.toml"),
                exe_dir.join("../../config.json"),
                exe_dir.join("../../config.toml"),
            ]);
        }
    }

    // Return first existing candidate
    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `WaypointError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        WaypointError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an environment variable, falling back to `default` when unset
///
/// # Errors
/// Returns `WaypointError::Config` when the variable is set but does not
/// parse.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|e| WaypointError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
///
/// # Arguments
/// * `key` - Environment variable name
/// * `default` - Default value if variable is not set
///
/// # Returns
/// The parsed boolean value, or `default` if not set.
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
