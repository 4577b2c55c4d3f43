//! Catch-up sweep for reminders that lost their in-memory timer.
//!
//! Provides a cron-based scheduler that periodically re-queues every pending
//! reminder. Join handles are tracked, cancellation is explicit, and every
//! asynchronous operation is wrapped in a timeout.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use waypoint_infra::scheduling::{
//!     ReminderSweepConfig, ReminderSweepScheduler, SchedulerResult, SweepJob,
//! };
//!
//! struct NoopSweepJob;
//!
//! #[async_trait]
//! impl SweepJob for NoopSweepJob {
//!     async fn run(&self) -> Result<(), waypoint_infra::errors::InfraError> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> SchedulerResult<()> {
//! let job = Arc::new(NoopSweepJob);
//! let mut scheduler = ReminderSweepScheduler::with_config(
//!     ReminderSweepConfig {
//!         cron_expression: "0 */15 * * * *".into(), // every 15 minutes
//!         ..Default::default()
//!     },
//!     job,
//! )
//! .await?;
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use waypoint_core::reminders::ports::ReminderScheduler;
use waypoint_core::tracker::ports::ReminderRepository;

use crate::errors::InfraError;
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Trait representing a sweep job.
#[async_trait]
pub trait SweepJob: Send + Sync {
    /// Execute the sweep.
    async fn run(&self) -> Result<(), InfraError>;
}

/// Configuration for the sweep scheduler.
#[derive(Debug, Clone)]
pub struct ReminderSweepConfig {
    /// Cron expression describing the execution schedule.
    pub cron_expression: String,
    /// Timeout applied to a single sweep execution.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for ReminderSweepConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 */15 * * * *".into(), // every 15 minutes
            job_timeout: Duration::from_secs(60),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Build a six-field cron expression that fires every `interval`.
///
/// Sub-minute intervals become a seconds step; longer intervals are rounded
/// down to whole minutes and clamped to the 1..=59 step range cron can
/// express.
pub fn cron_for_interval(interval: Duration) -> String {
    let secs = interval.as_secs().max(1);
    if secs < 60 {
        format!("*/{secs} * * * * *")
    } else {
        let minutes = (secs / 60).clamp(1, 59);
        format!("0 */{minutes} * * * *")
    }
}

/// Sweep job that re-queues every pending reminder.
///
/// Process restarts and failed fires both leave reminders due in the store
/// with no timer in memory. The sweep re-schedules each at its effective
/// time; an already-elapsed time fires immediately.
pub struct CatchUpSweepJob {
    reminders: Arc<dyn ReminderRepository>,
    scheduler: Arc<dyn ReminderScheduler>,
}

impl CatchUpSweepJob {
    pub fn new(
        reminders: Arc<dyn ReminderRepository>,
        scheduler: Arc<dyn ReminderScheduler>,
    ) -> Self {
        Self { reminders, scheduler }
    }
}

#[async_trait]
impl SweepJob for CatchUpSweepJob {
    async fn run(&self) -> Result<(), InfraError> {
        let now = Utc::now().timestamp_millis();
        let pending = self.reminders.get_pending_reminders(now).await?;
        if pending.is_empty() {
            debug!("Catch-up sweep found no pending reminders");
            return Ok(());
        }

        let count = pending.len();
        for reminder in pending {
            self.scheduler.schedule_reminder(&reminder.id, reminder.effective_time()).await?;
        }
        info!(count, "Catch-up sweep re-queued pending reminders");
        Ok(())
    }
}

/// Sweep scheduler with explicit lifecycle management.
pub struct ReminderSweepScheduler {
    scheduler: Arc<RwLock<Option<JobScheduler>>>,
    config: ReminderSweepConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    job: Arc<dyn SweepJob>,
}

impl ReminderSweepScheduler {
    /// Create a scheduler with the default configuration.
    pub async fn new(cron_expression: String, job: Arc<dyn SweepJob>) -> SchedulerResult<Self> {
        let config = ReminderSweepConfig { cron_expression, ..Default::default() };
        Self::with_config(config, job).await
    }

    /// Create a scheduler with a custom configuration.
    pub async fn with_config(
        config: ReminderSweepConfig,
        job: Arc<dyn SweepJob>,
    ) -> SchedulerResult<Self> {
        let scheduler = Self {
            scheduler: Arc::new(RwLock::new(None)),
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            job,
        };
        Ok(scheduler)
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        let start_result = tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?;

        start_result.map_err(|source| SchedulerError::StartFailed { source })?;

        {
            let mut guard = self.scheduler.write().await;
            *guard = Some(scheduler_instance);
        }

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            Self::monitor_task(cancel).await;
        });

        self.monitor_handle = Some(handle);
        info!("Reminder sweep scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let scheduler = {
            let mut guard = self.scheduler.write().await;
            guard.take()
        };

        let mut scheduler = match scheduler {
            Some(scheduler) => scheduler,
            None => return Err(SchedulerError::NotRunning),
        };

        let stop_timeout = self.config.stop_timeout;
        let stop_result =
            tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
                .await
                .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?;

        stop_result.map_err(|source| SchedulerError::StopFailed { source })?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        info!("Reminder sweep scheduler stopped");
        Ok(())
    }

    /// Returns true when the monitor task is active.
    pub fn is_running(&self) -> bool {
        self.monitor_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed { source })?;
        let cron_expr = self.config.cron_expression.clone();
        let job = self.job.clone();
        let job_timeout = self.config.job_timeout;

        let job_definition = Job::new_async(cron_expr.as_str(), move |_id, _lock| {
            let job = job.clone();

            Box::pin(async move {
                match tokio::time::timeout(job_timeout, job.run()).await {
                    Ok(Ok(())) => {
                        debug!("Reminder sweep finished successfully");
                    }
                    Ok(Err(err)) => {
                        error!(error = ?err, "Reminder sweep failed");
                    }
                    Err(elapsed) => {
                        warn!(timeout_secs = job_timeout.as_secs(), "Reminder sweep timed out");
                        debug!(elapsed = ?elapsed, "Timeout details");
                    }
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let job_id = job_definition.guid();
        scheduler
            .add(job_definition)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        debug!(cron = %self.config.cron_expression, job_id = %job_id, "Registered sweep job");
        Ok(scheduler)
    }

    async fn monitor_task(cancel: CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Reminder sweep monitor cancelled");
            }
        }
    }
}

impl Drop for ReminderSweepScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("ReminderSweepScheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
