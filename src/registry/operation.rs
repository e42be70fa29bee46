//! Live operation and per-task state
//!
//! `TaskState` is written only by the task that owns it; readers get copies
//! via `snapshot()`. Critical sections are short and never held across an
//! await point.

use crate::config::RunConfig;
use crate::error::ScrapeError;
use crate::scraper::ProgressState;
use crate::types::{
    OperationId, OperationSnapshot, OperationStatus, OperationSummary, SourceId, TaskSnapshot,
    TaskStatus,
};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Mutable state of one per-source task
pub(crate) struct TaskState {
    source: SourceId,
    max_attempts: u32,
    status: Mutex<TaskStatus>,
    /// 0 until the first attempt starts, then the 1-based attempt number
    attempt: AtomicU32,
    packages_processed: AtomicU64,
    last_error: Mutex<Option<String>>,
    progress: Arc<ProgressState>,
}

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TaskState {
    pub(crate) fn new(source: SourceId, max_attempts: u32) -> Self {
        Self {
            source,
            max_attempts,
            status: Mutex::new(TaskStatus::Pending),
            attempt: AtomicU32::new(0),
            packages_processed: AtomicU64::new(0),
            last_error: Mutex::new(None),
            progress: Arc::new(ProgressState::default()),
        }
    }

    pub(crate) fn source(&self) -> &SourceId {
        &self.source
    }

    pub(crate) fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub(crate) fn progress_state(&self) -> Arc<ProgressState> {
        Arc::clone(&self.progress)
    }

    pub(crate) fn status(&self) -> TaskStatus {
        *lock_ignore_poison(&self.status)
    }

    /// Move to Running and bump the attempt counter; returns the 1-based
    /// attempt number
    pub(crate) fn begin_attempt(&self) -> u32 {
        *lock_ignore_poison(&self.status) = TaskStatus::Running;
        self.attempt.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record the error of an attempt that failed but may still be retried
    pub(crate) fn record_attempt_error(&self, error: &ScrapeError) {
        *lock_ignore_poison(&self.last_error) = Some(error.to_string());
    }

    pub(crate) fn mark_succeeded(&self, packages: u64) {
        self.packages_processed.store(packages, Ordering::SeqCst);
        // Success clears the trace of earlier failed attempts
        *lock_ignore_poison(&self.last_error) = None;
        self.progress.complete();
        *lock_ignore_poison(&self.status) = TaskStatus::Succeeded;
    }

    pub(crate) fn mark_failed(&self, error: &ScrapeError) {
        *lock_ignore_poison(&self.last_error) = Some(error.to_string());
        *lock_ignore_poison(&self.status) = TaskStatus::Failed;
    }

    /// Mark failed with a preformatted message (join errors, panics)
    pub(crate) fn mark_failed_message(&self, message: String) {
        *lock_ignore_poison(&self.last_error) = Some(message);
        *lock_ignore_poison(&self.status) = TaskStatus::Failed;
    }

    pub(crate) fn mark_cancelled(&self) {
        *lock_ignore_poison(&self.status) = TaskStatus::Cancelled;
    }

    pub(crate) fn packages_processed(&self) -> u64 {
        self.packages_processed.load(Ordering::SeqCst)
    }

    /// Copy-on-read snapshot for `GetRunning` and history summaries
    pub(crate) fn snapshot(&self) -> TaskSnapshot {
        let status = self.status();
        let packages = match status {
            TaskStatus::Succeeded => Some(self.packages_processed()),
            _ => None,
        };

        TaskSnapshot {
            source: self.source.clone(),
            status,
            attempt: self.attempt.load(Ordering::SeqCst).max(1),
            max_attempts: self.max_attempts,
            progress: self.progress.percent(),
            current_step: self.progress.step(),
            packages_processed: packages,
            last_error: lock_ignore_poison(&self.last_error).clone(),
        }
    }
}

/// The single admitted operation
///
/// Owned by the registry's active slot while any task is in flight; the
/// supervisor summarizes it into history once every task is terminal.
pub(crate) struct ActiveOperation {
    pub(crate) id: OperationId,
    pub(crate) sources: Vec<SourceId>,
    pub(crate) config: RunConfig,
    pub(crate) started_at: DateTime<Utc>,
    /// One entry per requested source, in request order
    pub(crate) tasks: Vec<Arc<TaskState>>,
    /// Broadcast to every task at once on cancellation
    pub(crate) cancel: CancellationToken,
}

impl ActiveOperation {
    pub(crate) fn new(id: OperationId, sources: Vec<SourceId>, config: RunConfig) -> Self {
        let max_attempts = config.max_attempts();
        let tasks = sources
            .iter()
            .map(|source| Arc::new(TaskState::new(source.clone(), max_attempts)))
            .collect();

        Self {
            id,
            sources,
            config,
            started_at: Utc::now(),
            tasks,
            cancel: CancellationToken::new(),
        }
    }

    /// Mean task progress, 0-100
    pub(crate) fn progress(&self) -> u8 {
        if self.tasks.is_empty() {
            return 0;
        }
        let sum: u32 = self
            .tasks
            .iter()
            .map(|t| t.progress_state().percent() as u32)
            .sum();
        (sum / self.tasks.len() as u32) as u8
    }

    /// Current aggregate status: terminal rollup once every task is
    /// terminal, Running otherwise
    pub(crate) fn status(&self) -> OperationStatus {
        let statuses: Vec<TaskStatus> = self.tasks.iter().map(|t| t.status()).collect();
        if statuses.iter().all(|s| s.is_terminal()) {
            aggregate_status(&statuses)
        } else if statuses.iter().all(|s| *s == TaskStatus::Pending) {
            OperationStatus::Queued
        } else {
            OperationStatus::Running
        }
    }

    /// Human-readable description of what the operation is doing right now
    pub(crate) fn current_step(&self) -> String {
        if self.cancel.is_cancelled() {
            return "cancelling".to_string();
        }

        for task in &self.tasks {
            if task.status() == TaskStatus::Running {
                return match task.progress_state().step() {
                    Some(step) => format!("{}: {}", task.source(), step),
                    None => format!("scraping {}", task.source()),
                };
            }
        }

        let done = self
            .tasks
            .iter()
            .filter(|t| t.status().is_terminal())
            .count();
        format!("{done} of {} sources finished", self.tasks.len())
    }

    /// Copy-on-read snapshot for `GetRunning`
    pub(crate) fn snapshot(&self) -> OperationSnapshot {
        OperationSnapshot {
            id: self.id,
            status: self.status(),
            progress: self.progress(),
            current_step: self.current_step(),
            started_at: self.started_at,
            sources: self.sources.clone(),
            tasks: self.tasks.iter().map(|t| t.snapshot()).collect(),
        }
    }

    /// Terminal summary for the history ring; call only once every task is
    /// terminal
    pub(crate) fn summarize(&self, ended_at: DateTime<Utc>) -> OperationSummary {
        let statuses: Vec<TaskStatus> = self.tasks.iter().map(|t| t.status()).collect();
        let packages: u64 = self.tasks.iter().map(|t| t.packages_processed()).sum();

        OperationSummary {
            id: self.id,
            status: aggregate_status(&statuses),
            sources: self.sources.clone(),
            started_at: self.started_at,
            ended_at,
            packages_processed: packages,
            tasks_succeeded: statuses
                .iter()
                .filter(|s| **s == TaskStatus::Succeeded)
                .count(),
            tasks_failed: statuses
                .iter()
                .filter(|s| **s == TaskStatus::Failed)
                .count(),
            tasks_cancelled: statuses
                .iter()
                .filter(|s| **s == TaskStatus::Cancelled)
                .count(),
        }
    }
}

/// Roll terminal task statuses up into the operation's terminal status
///
/// - any task cancelled → `Cancelled` (cancellation arrived before every
///   task finished on its own)
/// - all succeeded → `Completed`
/// - all failed → `Failed`
/// - otherwise → `PartiallyFailed`
pub(crate) fn aggregate_status(statuses: &[TaskStatus]) -> OperationStatus {
    let cancelled = statuses.iter().any(|s| *s == TaskStatus::Cancelled);
    if cancelled {
        return OperationStatus::Cancelled;
    }

    let succeeded = statuses.iter().filter(|s| **s == TaskStatus::Succeeded).count();
    let failed = statuses.iter().filter(|s| **s == TaskStatus::Failed).count();

    if failed == 0 {
        OperationStatus::Completed
    } else if succeeded == 0 {
        OperationStatus::Failed
    } else {
        OperationStatus::PartiallyFailed
    }
}
