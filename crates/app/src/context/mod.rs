//! Application context - dependency injection container

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use waypoint_core::{
    ChangeNotifier, EntitlementService, ExportService, FakeEntitlementProvider,
    ReminderActionHandler, ReminderDiagnostics, ReminderFireHandler, ReminderRepository,
    ReminderScheduler, TrackerService,
};
use waypoint_domain::{Config, Result, WaypointError};
use waypoint_infra::scheduling::{
    cron_for_interval, CatchUpSweepJob, ReminderQueue, ReminderSweepConfig, ReminderSweepScheduler,
    SweepJob,
};
use waypoint_infra::{
    DbManager, InstanceLock, KeyManager, NotificationHub, SqlCipherApplicationRepository,
    SqlCipherMilestoneRepository, SqlCipherReminderRepository, StoreBootstrap,
};

use crate::utils::health::{ComponentHealth, HealthStatus};

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,

    // Use-case services
    pub tracker: Arc<TrackerService>,
    pub exporter: Arc<ExportService>,
    pub entitlements: Arc<EntitlementService>,

    // Reminder machinery
    pub fire_handler: Arc<ReminderFireHandler>,
    pub actions: Arc<ReminderActionHandler>,
    pub reminder_queue: Arc<ReminderQueue>,
    pub notification_hub: Arc<NotificationHub>,
    pub sweep: Option<Arc<ReminderSweepScheduler>>,

    // Store access shared with the services above
    pub reminders: Arc<dyn ReminderRepository>,
    pub changes: Arc<ChangeNotifier>,

    key_manager: KeyManager,

    // Keep instance lock alive for the lifetime of the app
    _instance_lock: InstanceLock,
}

impl AppContext {
    /// Create a new application context with default configuration
    pub async fn new() -> Result<Self> {
        Self::new_with_config(Config::default()).await
    }

    /// Create a new application context with custom configuration
    ///
    /// The instance lock lives in the configured data directory, guarding
    /// the single-writer assumption for the store.
    pub async fn new_with_config(config: Config) -> Result<Self> {
        let data_dir = PathBuf::from(&config.database.data_dir);
        Self::new_with_config_in_lock_dir(config, data_dir).await
    }

    /// Create a new application context with a custom lock directory
    ///
    /// Tests can use this to provide per-test directories and avoid PID file
    /// conflicts.
    pub async fn new_with_config_in_lock_dir<P>(config: Config, lock_dir: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let data_dir = PathBuf::from(&config.database.data_dir);
        fs::create_dir_all(&data_dir).map_err(|err| {
            WaypointError::Config(format!(
                "failed to create data directory {}: {}",
                data_dir.display(),
                err
            ))
        })?;

        let lock_dir_path = lock_dir.as_ref().to_path_buf();
        fs::create_dir_all(&lock_dir_path).map_err(|err| {
            WaypointError::Config(format!(
                "failed to create instance lock directory {}: {}",
                lock_dir_path.display(),
                err
            ))
        })?;

        // Acquire instance lock to prevent multiple instances
        let instance_lock = InstanceLock::acquire(&lock_dir_path)?;

        let key_manager = KeyManager::new(&data_dir);
        let passphrase = resolve_passphrase(&key_manager)?;

        // Open the encrypted store; a corrupt or unreadable file is
        // quarantined and recreated inside the bootstrap
        let db_path = data_dir.join(&config.database.file_name);
        let bootstrap = StoreBootstrap::new(db_path, config.database.pool_size);
        let db = bootstrap.open(&passphrase)?;

        // Repositories over the shared pool
        let applications = Arc::new(SqlCipherApplicationRepository::new(Arc::clone(&db)));
        let milestones = Arc::new(SqlCipherMilestoneRepository::new(Arc::clone(&db)));
        let reminders = Arc::new(SqlCipherReminderRepository::new(Arc::clone(&db)));

        let changes = Arc::new(ChangeNotifier::new());
        let notification_hub = Arc::new(NotificationHub::new(config.notifications.enabled));
        let reminder_queue = Arc::new(ReminderQueue::new());

        // Fire handler closes the loop: the queue dispatches due work back
        // through it
        let fire_handler = Arc::new(ReminderFireHandler::new(
            applications.clone(),
            milestones.clone(),
            reminders.clone(),
            reminder_queue.clone(),
            notification_hub.clone(),
            changes.clone(),
        ));
        reminder_queue.set_fire_handler(fire_handler.clone());

        let actions = Arc::new(ReminderActionHandler::new(
            reminders.clone(),
            reminder_queue.clone(),
            notification_hub.clone(),
            changes.clone(),
        ));

        let tracker = Arc::new(TrackerService::new(
            applications.clone(),
            milestones.clone(),
            reminders.clone(),
            reminder_queue.clone(),
            notification_hub.clone(),
            changes.clone(),
        ));
        let exporter = Arc::new(ExportService::new(applications.clone(), milestones.clone()));
        let entitlements = Arc::new(EntitlementService::new(
            Arc::new(FakeEntitlementProvider::new()),
            applications.clone(),
        ));

        let reminders: Arc<dyn ReminderRepository> = reminders;

        // Timers do not survive a restart; rebuild them from the store
        rehydrate_reminders(&reminders, reminder_queue.clone()).await?;

        let sweep = if config.scheduler.sweep_enabled {
            Some(start_sweep(&config, reminders.clone(), reminder_queue.clone()).await?)
        } else {
            info!("Catch-up sweep disabled by configuration");
            None
        };

        Ok(Self {
            config,
            db,
            tracker,
            exporter,
            entitlements,
            fire_handler,
            actions,
            reminder_queue,
            notification_hub,
            sweep,
            reminders,
            changes,
            key_manager,
            _instance_lock: instance_lock,
        })
    }

    /// Check health of all application components
    ///
    /// Returns a [`HealthStatus`] with individual component health checks and
    /// an overall health score. The score is (healthy_components /
    /// total_components); the application counts as healthy at 0.8 or above.
    pub async fn health_check(&self) -> HealthStatus {
        let mut status = HealthStatus::new();

        // Check store connectivity (async to avoid blocking)
        status = status.add_component(self.check_database_health().await);

        // Tracker, exporter and entitlement services are stateless wrappers
        status = status.add_component(ComponentHealth::healthy("tracker"));
        status = status.add_component(ComponentHealth::healthy("exporter"));
        status = status.add_component(ComponentHealth::healthy("entitlements"));

        // Notification hub and timer queue are in-memory registries
        status = status.add_component(ComponentHealth::healthy("notification_hub"));
        status = status.add_component(ComponentHealth::healthy("reminder_queue"));

        status = status.add_component(match &self.sweep {
            Some(sweep) if sweep.is_running() => ComponentHealth::healthy("catch_up_sweep"),
            Some(_) => ComponentHealth::unhealthy("catch_up_sweep", "scheduler is not running"),
            None => ComponentHealth::healthy("catch_up_sweep"),
        });

        status.calculate_score();
        status
    }

    /// Check store health by running a probe query off the async runtime
    async fn check_database_health(&self) -> ComponentHealth {
        let db = Arc::clone(&self.db);
        match tokio::task::spawn_blocking(move || db.health_check()).await {
            Ok(Ok(())) => ComponentHealth::healthy("database"),
            Ok(Err(e)) => {
                warn!(error = %e, "database health check failed");
                ComponentHealth::unhealthy("database", format!("query failed: {e}"))
            }
            Err(e) => {
                error!(error = %e, "database health check task panicked");
                ComponentHealth::unhealthy("database", format!("task panic: {e}"))
            }
        }
    }

    /// Snapshot the reminder queue state for the debug surface
    pub async fn reminder_diagnostics(&self) -> Result<ReminderDiagnostics> {
        let active = self.reminders.get_active_reminders().await?;
        Ok(ReminderDiagnostics::from_reminders(active, Utc::now().timestamp_millis()))
    }

    /// Wipe every trace of user data
    ///
    /// Cancels reminder work, clears posted notifications, deletes all store
    /// rows and removes the passphrase blob with its keychain entry. The
    /// store file itself stays; without the passphrase the next boot
    /// quarantines it and starts fresh.
    pub async fn full_reset(&self) -> Result<()> {
        self.tracker.wipe_all_data().await?;
        self.notification_hub.clear_all();
        self.key_manager.clear()?;
        warn!("Full reset complete; the passphrase regenerates on next start");
        Ok(())
    }

    /// Shutdown the application context gracefully
    ///
    /// Idempotent. The timer queue is drained explicitly; the sweep
    /// scheduler and the connection pool clean up via `Drop`.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down application context");

        self.reminder_queue.shutdown();
        debug!(component = "ReminderQueue", cleanup = "explicit cancel", "component_shutdown");
        debug!(
            component = "ReminderSweepScheduler",
            cleanup = "Drop (CancellationToken)",
            "component_shutdown"
        );
        debug!(component = "DbManager", cleanup = "pool auto-closes", "component_shutdown");

        Ok(())
    }
}

/// Resolve the store passphrase with a test-friendly fallback chain:
/// 1. `TEST_DATABASE_ENCRYPTION_KEY` (tests, does not touch the keychain)
/// 2. `WAYPOINT_DB_PASSPHRASE` (explicit override)
/// 3. [`KeyManager`] (default, keychain-wrapped blob in the data directory)
fn resolve_passphrase(key_manager: &KeyManager) -> Result<String> {
    match std::env::var("TEST_DATABASE_ENCRYPTION_KEY") {
        Ok(value) => {
            debug!("using TEST_DATABASE_ENCRYPTION_KEY for store encryption");
            Ok(value)
        }
        Err(_) => match std::env::var("WAYPOINT_DB_PASSPHRASE") {
            Ok(value) => {
                info!("using WAYPOINT_DB_PASSPHRASE for store encryption");
                Ok(value)
            }
            Err(_) => {
                info!("resolving store passphrase from the data directory blob");
                key_manager.get_or_create_passphrase().map_err(|e| {
                    error!(error = %e, "failed to resolve the store passphrase");
                    e
                })
            }
        },
    }
}

/// Re-schedule every active reminder from the store at its effective time.
/// Times already in the past fire immediately, covering work that came due
/// while the process was down.
async fn rehydrate_reminders(
    reminders: &Arc<dyn ReminderRepository>,
    queue: Arc<ReminderQueue>,
) -> Result<()> {
    let active = reminders.get_active_reminders().await?;
    if active.is_empty() {
        debug!("No active reminders to re-hydrate");
        return Ok(());
    }

    let count = active.len();
    for reminder in &active {
        queue.schedule_reminder(&reminder.id, reminder.effective_time()).await?;
    }
    info!(count, "Re-hydrated reminder timers from the store");
    Ok(())
}

/// Construct and start the catch-up sweep (fail-fast initialization)
async fn start_sweep(
    config: &Config,
    reminders: Arc<dyn ReminderRepository>,
    scheduler: Arc<dyn ReminderScheduler>,
) -> Result<Arc<ReminderSweepScheduler>> {
    let job: Arc<dyn SweepJob> = Arc::new(CatchUpSweepJob::new(reminders, scheduler));
    let sweep_config = ReminderSweepConfig {
        cron_expression: cron_for_interval(Duration::from_secs(
            config.scheduler.sweep_interval_seconds.max(1),
        )),
        ..ReminderSweepConfig::default()
    };

    let mut sweep =
        ReminderSweepScheduler::with_config(sweep_config, job).await.map_err(|err| {
            error!(error = %err, "failed to construct the catch-up sweep");
            WaypointError::Scheduler(format!("failed to construct the catch-up sweep: {err}"))
        })?;

    let start_timeout = Duration::from_secs(10);
    tokio::time::timeout(start_timeout, sweep.start())
        .await
        .map_err(|_| {
            error!(timeout_secs = 10, "catch-up sweep start timed out");
            WaypointError::Scheduler("catch-up sweep start timed out after 10s".into())
        })?
        .map_err(|err| {
            error!(error = %err, "failed to start the catch-up sweep");
            WaypointError::Scheduler(format!("failed to start the catch-up sweep: {err}"))
        })?;

    Ok(Arc::new(sweep))
}
