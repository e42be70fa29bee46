//! Operation registry — admission control, lifecycle supervision, history
//!
//! The registry is the single place where mutable orchestration state lives:
//! - the **active slot**, holding at most one operation (admission control);
//! - the **history ring**, a bounded buffer of terminal operation summaries.
//!
//! Both are guarded by their own locks with short critical sections that are
//! never held across an await point. Everything a reader gets back is a
//! copy; no caller ever holds a reference into live task state.

mod operation;
mod task;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::config::{Config, HistoryConfig, RunConfig};
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::scraper::SourceScraper;
use crate::types::{OperationId, OperationSummary, RunningView, SourceId};
use chrono::Utc;
use operation::ActiveOperation;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-wide registry of scraping operations
///
/// Enforces the one-active-operation rule, spawns and supervises per-source
/// tasks, and retains a bounded history of terminal operations for
/// statistics.
pub struct OperationRegistry {
    /// Scraper implementations, one per known source
    scrapers: HashMap<SourceId, Arc<dyn SourceScraper>>,
    /// Default run settings (per-start overrides are allowed)
    run_defaults: RunConfig,
    retry: RetryPolicy,
    history_config: HistoryConfig,
    /// The sole admission-control serialization point
    active: Mutex<Option<Arc<ActiveOperation>>>,
    /// Terminal operations, oldest first; bounded by `history_config.retention`
    history: RwLock<VecDeque<OperationSummary>>,
    /// Cleared during shutdown so no new operation is admitted
    accepting_new: AtomicBool,
}

impl OperationRegistry {
    /// Create a registry from configuration and per-source scrapers
    pub fn new(config: &Config, scrapers: HashMap<SourceId, Arc<dyn SourceScraper>>) -> Self {
        if scrapers.is_empty() {
            warn!("no scrapers registered; every start request will be rejected");
        }

        Self {
            scrapers,
            run_defaults: config.run.clone(),
            retry: RetryPolicy::new(config.retry.clone()),
            history_config: config.history.clone(),
            active: Mutex::new(None),
            history: RwLock::new(VecDeque::new()),
            accepting_new: AtomicBool::new(true),
        }
    }

    /// The sources this registry can scrape
    pub fn known_sources(&self) -> Vec<SourceId> {
        let mut sources: Vec<SourceId> = self.scrapers.keys().cloned().collect();
        sources.sort();
        sources
    }

    /// Default run settings, the base for per-start overrides
    pub fn run_defaults(&self) -> &RunConfig {
        &self.run_defaults
    }

    /// Start a new operation over `sources`
    ///
    /// Validates the request, admits it against the single active slot, and
    /// spawns one task per source plus a supervisor. Returns as soon as the
    /// operation is admitted; progress is observable via [`Self::get_running`].
    ///
    /// Fails with [`Error::AlreadyRunning`] while another operation is
    /// active, and with [`Error::EmptySources`] / [`Error::UnknownSource`] /
    /// [`Error::Config`] on invalid input. A rejected start leaves no trace.
    pub fn start(self: &Arc<Self>, sources: Vec<SourceId>, config: RunConfig) -> Result<OperationId> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        // Validate before touching any shared state
        let sources = dedupe_preserving_order(sources);
        if sources.is_empty() {
            return Err(Error::EmptySources);
        }
        for source in &sources {
            if !self.scrapers.contains_key(source) {
                return Err(Error::UnknownSource {
                    source: source.to_string(),
                });
            }
        }
        config.validate()?;

        let operation = {
            let mut active = lock_ignore_poison(&self.active);
            if let Some(current) = active.as_ref() {
                return Err(Error::AlreadyRunning {
                    operation_id: current.id,
                });
            }

            let operation = Arc::new(ActiveOperation::new(
                OperationId::generate(),
                sources,
                config,
            ));
            *active = Some(Arc::clone(&operation));
            operation
        };

        info!(
            operation_id = %operation.id,
            sources = ?operation.sources,
            max_attempts = operation.config.max_attempts(),
            "operation started"
        );

        self.spawn_tasks(&operation);
        Ok(operation.id)
    }

    /// Spawn one task per source (bounded by the parallel-task cap) plus the
    /// supervisor that finalizes the operation
    fn spawn_tasks(self: &Arc<Self>, operation: &Arc<ActiveOperation>) {
        let parallel = operation
            .config
            .max_parallel_tasks
            .unwrap_or(operation.tasks.len())
            .max(1);
        let slots = Arc::new(Semaphore::new(parallel));

        let mut handles = Vec::with_capacity(operation.tasks.len());
        for task in &operation.tasks {
            // Sources were validated at admission, so the lookup cannot miss
            let scraper = match self.scrapers.get(task.source()) {
                Some(scraper) => Arc::clone(scraper),
                None => continue,
            };

            let task = Arc::clone(task);
            let slots = Arc::clone(&slots);
            let cancel = operation.cancel.clone();
            let retry = self.retry.clone();
            let timeout_per_task = operation.config.timeout_per_task;
            let operation_id = operation.id;

            handles.push(tokio::spawn(async move {
                // Permit acquisition is itself a cancellation point: a task
                // that never got a slot still terminates promptly
                let _permit = tokio::select! {
                    _ = cancel.cancelled() => {
                        task.mark_cancelled();
                        return;
                    }
                    permit = slots.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_closed) => {
                            task.mark_cancelled();
                            return;
                        }
                    },
                };

                task::run_task(scraper, task, operation_id, cancel, timeout_per_task, retry).await;
            }));
        }

        let registry = Arc::clone(self);
        let operation = Arc::clone(operation);
        tokio::spawn(async move {
            registry.supervise(operation, handles).await;
        });
    }

    /// Wait for every task to finish, roll up the terminal status, append
    /// the summary to history, and free the active slot
    async fn supervise(
        self: Arc<Self>,
        operation: Arc<ActiveOperation>,
        handles: Vec<tokio::task::JoinHandle<()>>,
    ) {
        for handle in handles {
            if let Err(join_error) = handle.await {
                warn!(
                    operation_id = %operation.id,
                    error = %join_error,
                    "task worker terminated abnormally"
                );
            }
        }

        // A panicked worker leaves its task non-terminal; settle it so the
        // rollup invariant (terminal operation iff all tasks terminal) holds
        for task in &operation.tasks {
            if !task.status().is_terminal() {
                task.mark_failed_message("task worker terminated abnormally".to_string());
            }
        }

        let ended_at = Utc::now();
        let summary = operation.summarize(ended_at);
        info!(
            operation_id = %operation.id,
            status = ?summary.status,
            packages_processed = summary.packages_processed,
            tasks_succeeded = summary.tasks_succeeded,
            tasks_failed = summary.tasks_failed,
            tasks_cancelled = summary.tasks_cancelled,
            "operation finished"
        );

        self.push_history(summary);

        let mut active = lock_ignore_poison(&self.active);
        if active.as_ref().is_some_and(|op| op.id == operation.id) {
            *active = None;
        }
    }

    /// Append a terminal summary, evicting the oldest entry beyond the cap
    pub(crate) fn push_history(&self, summary: OperationSummary) {
        let mut history = self
            .history
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        history.push_back(summary);
        while history.len() > self.history_config.retention {
            history.pop_front();
        }
    }

    /// Non-blocking snapshot of the currently active operation
    pub fn get_running(&self) -> RunningView {
        let active = lock_ignore_poison(&self.active);
        match active.as_ref() {
            Some(operation) => RunningView {
                in_progress: true,
                operations: vec![operation.snapshot()],
            },
            None => RunningView {
                in_progress: false,
                operations: Vec::new(),
            },
        }
    }

    /// Request cancellation of the active operation
    ///
    /// Broadcasts the cancel signal to every task at once and returns
    /// immediately; tasks stop cooperatively at their next cancellation
    /// check. Fails with [`Error::NotFound`] if `id` is not the active
    /// operation (including operations that already reached a terminal
    /// state).
    pub fn cancel(&self, id: OperationId) -> Result<()> {
        let active = lock_ignore_poison(&self.active);
        match active.as_ref() {
            Some(operation) if operation.id == id => {
                operation.cancel.cancel();
                info!(operation_id = %id, "cancellation requested");
                Ok(())
            }
            _ => Err(Error::NotFound(format!("operation {id} is not active"))),
        }
    }

    /// Terminal operations started within `window`, newest first
    ///
    /// The result is additionally bounded by the retention cap: entries
    /// evicted from the ring are gone regardless of the window.
    pub fn history(&self, window: Duration) -> Vec<OperationSummary> {
        let cutoff =
            Utc::now() - chrono::TimeDelta::from_std(window).unwrap_or(chrono::TimeDelta::MAX);
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        history
            .iter()
            .rev()
            .filter(|summary| summary.started_at >= cutoff)
            .cloned()
            .collect()
    }

    /// Whether the registry still admits new operations
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    /// Stop admitting new operations and cancel the active one, then wait
    /// (bounded) for it to wind down
    pub async fn shutdown(&self) {
        self.accepting_new.store(false, Ordering::SeqCst);

        let active_id = {
            let active = lock_ignore_poison(&self.active);
            active.as_ref().map(|operation| {
                operation.cancel.cancel();
                operation.id
            })
        };

        let Some(id) = active_id else {
            info!("registry shut down with no active operation");
            return;
        };

        info!(operation_id = %id, "waiting for active operation to stop");

        // Cooperative cancellation means the wait is bounded by the slowest
        // task's next cancellation check; cap it rather than waiting forever
        let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
        loop {
            if lock_ignore_poison(&self.active).is_none() {
                info!(operation_id = %id, "active operation stopped");
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(operation_id = %id, "operation did not stop within the shutdown grace period");
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// Requested sources form an ordered set: keep first occurrences, in order
fn dedupe_preserving_order(sources: Vec<SourceId>) -> Vec<SourceId> {
    let mut seen = std::collections::HashSet::new();
    sources
        .into_iter()
        .filter(|source| seen.insert(source.clone()))
        .collect()
}
