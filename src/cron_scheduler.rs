//! Cron-driven auto-triggering of scraping operations
//!
//! Each enabled schedule runs its own timer loop: compute the next fire
//! time from the cron expression and "now", sleep until then (racing
//! shutdown/disable), and ask the registry to start an operation. Admission
//! control stays with the registry: when another operation is already
//! active the fire is **skipped, never queued**; the scheduler records the
//! skip and simply waits for the next tick. Disabling a schedule stops its
//! timer; re-enabling computes the next fire time from "now", so missed
//! ticks are never caught up.

use crate::config::{CronConfig, RunConfig};
use crate::error::{Error, Result};
use crate::registry::OperationRegistry;
use crate::types::{CronStatusView, NextRun, SourceId};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runtime state of one configured schedule
struct ScheduleRuntime {
    id: String,
    sources: Vec<SourceId>,
    schedule: cron::Schedule,
    enabled: AtomicBool,
    /// Fires that were skipped because an operation was already running
    skipped_runs: AtomicU64,
    /// Cancellation token of the live timer loop, if one is running
    timer: Mutex<Option<CancellationToken>>,
}

/// Fires scraping operations on configured cron schedules
pub struct CronScheduler {
    registry: Arc<OperationRegistry>,
    /// Run settings applied to cron-fired operations
    run_config: RunConfig,
    /// Global switch; individual schedules keep their own enabled flag
    enabled: AtomicBool,
    schedules: Vec<Arc<ScheduleRuntime>>,
    shutdown: CancellationToken,
}

impl CronScheduler {
    /// Build a scheduler from configuration
    ///
    /// Parses every cron expression up front so a bad expression fails at
    /// construction, not at fire time.
    pub fn new(
        config: &CronConfig,
        run_config: RunConfig,
        registry: Arc<OperationRegistry>,
    ) -> Result<Self> {
        let mut schedules = Vec::with_capacity(config.schedules.len());
        for schedule_config in &config.schedules {
            let schedule = schedule_config.parse_expression()?;
            schedules.push(Arc::new(ScheduleRuntime {
                id: schedule_config.id.clone(),
                sources: schedule_config.sources.clone(),
                schedule,
                enabled: AtomicBool::new(schedule_config.enabled),
                skipped_runs: AtomicU64::new(0),
                timer: Mutex::new(None),
            }));
        }

        Ok(Self {
            registry,
            run_config,
            enabled: AtomicBool::new(config.enabled),
            schedules,
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawn a timer loop for every enabled schedule
    pub fn start(self: &Arc<Self>) {
        for runtime in &self.schedules {
            if runtime.enabled.load(Ordering::SeqCst) {
                self.spawn_timer(runtime);
            }
        }
        info!(
            schedules = self.schedules.len(),
            enabled = self.enabled.load(Ordering::SeqCst),
            "cron scheduler started"
        );
    }

    fn spawn_timer(self: &Arc<Self>, runtime: &Arc<ScheduleRuntime>) {
        let mut timer = lock_ignore_poison(&runtime.timer);
        if timer.is_some() {
            return;
        }
        let token = self.shutdown.child_token();
        *timer = Some(token.clone());
        drop(timer);

        let scheduler = Arc::clone(self);
        let runtime = Arc::clone(runtime);
        tokio::spawn(async move {
            scheduler.run_timer(runtime, token).await;
        });
    }

    /// One schedule's timer loop
    async fn run_timer(self: Arc<Self>, runtime: Arc<ScheduleRuntime>, token: CancellationToken) {
        debug!(schedule = %runtime.id, "schedule timer started");

        loop {
            let now = Utc::now();
            let Some(next) = runtime.schedule.after(&now).next() else {
                info!(schedule = %runtime.id, "schedule has no future fire times, stopping timer");
                break;
            };
            let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            if !self.enabled.load(Ordering::SeqCst) {
                debug!(schedule = %runtime.id, "scheduler globally disabled, ignoring fire");
                continue;
            }

            match self
                .registry
                .start(runtime.sources.clone(), self.run_config.clone())
            {
                Ok(operation_id) => {
                    info!(
                        schedule = %runtime.id,
                        operation_id = %operation_id,
                        sources = ?runtime.sources,
                        "scheduled operation started"
                    );
                }
                Err(Error::AlreadyRunning { operation_id }) => {
                    // Skip, never queue: the next attempt is the next tick
                    runtime.skipped_runs.fetch_add(1, Ordering::SeqCst);
                    warn!(
                        schedule = %runtime.id,
                        active_operation = %operation_id,
                        skipped_total = runtime.skipped_runs.load(Ordering::SeqCst),
                        "skipping scheduled run: an operation is already active"
                    );
                }
                Err(Error::ShuttingDown) => {
                    info!(schedule = %runtime.id, "registry is shutting down, stopping timer");
                    break;
                }
                Err(e) => {
                    error!(schedule = %runtime.id, error = %e, "scheduled start failed");
                }
            }
        }

        debug!(schedule = %runtime.id, "schedule timer stopped");
        // Leave a replacement timer alone if re-enable raced this loop's exit
        let mut timer = lock_ignore_poison(&runtime.timer);
        let replaced = token.is_cancelled() && timer.as_ref().is_some_and(|t| !t.is_cancelled());
        if !replaced {
            *timer = None;
        }
    }

    /// Enable or disable one schedule
    ///
    /// Disabling stops the schedule's timer. Enabling spawns a fresh timer
    /// whose first fire is computed from "now"; a tick missed while
    /// disabled is not caught up.
    pub fn set_schedule_enabled(self: &Arc<Self>, schedule_id: &str, enabled: bool) -> Result<()> {
        let runtime = self
            .schedules
            .iter()
            .find(|r| r.id == schedule_id)
            .ok_or_else(|| Error::NotFound(format!("schedule {schedule_id}")))?;

        runtime.enabled.store(enabled, Ordering::SeqCst);
        if enabled {
            self.spawn_timer(runtime);
            info!(schedule = %schedule_id, "schedule enabled");
        } else {
            if let Some(token) = lock_ignore_poison(&runtime.timer).take() {
                token.cancel();
            }
            info!(schedule = %schedule_id, "schedule disabled");
        }
        Ok(())
    }

    /// Globally pause or resume firing without touching per-schedule state
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "cron scheduler global switch changed");
    }

    /// Total fires skipped because an operation was already active
    pub fn skipped_runs(&self) -> u64 {
        self.schedules
            .iter()
            .map(|r| r.skipped_runs.load(Ordering::SeqCst))
            .sum()
    }

    /// Snapshot of scheduler state with freshly computed next fire times
    ///
    /// Next runs are recomputed from each expression and the current time on
    /// every call; nothing is cached or persisted, so the answer can never
    /// drift from the timers.
    pub fn status(&self) -> CronStatusView {
        let next_runs = self
            .schedules
            .iter()
            .filter(|r| r.enabled.load(Ordering::SeqCst))
            .map(|r| NextRun {
                schedule_id: r.id.clone(),
                sources: r.sources.clone(),
                next_run_at: r.schedule.after(&Utc::now()).next(),
            })
            .collect();

        CronStatusView {
            enabled: self.enabled.load(Ordering::SeqCst),
            active_tasks: self
                .schedules
                .iter()
                .filter(|r| lock_ignore_poison(&r.timer).is_some())
                .count(),
            total_tasks: self.schedules.len(),
            next_runs,
        }
    }

    /// Stop every timer loop
    pub fn stop(&self) {
        self.shutdown.cancel();
        info!("cron scheduler stopped");
    }
}
