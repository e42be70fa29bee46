//! Core types for scrape-orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Identifier of a scraping source (an external provider site)
///
/// Sources are opaque to the orchestrator; the identifier only has to match
/// the key under which a [`crate::scraper::SourceScraper`] was registered.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SourceId(pub String);

impl SourceId {
    /// Create a new SourceId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a scraping operation, generated at start time
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
#[schema(value_type = String)]
pub struct OperationId(pub Uuid);

impl OperationId {
    /// Generate a fresh random operation identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Aggregate status of a scraping operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Admitted but no task has started yet
    Queued,
    /// At least one task is still in flight
    Running,
    /// Every task succeeded
    Completed,
    /// Every task failed
    Failed,
    /// At least one task failed and at least one succeeded
    PartiallyFailed,
    /// Cancellation was requested before all tasks finished on their own
    Cancelled,
}

impl OperationStatus {
    /// Whether this status is terminal (the operation will never change again)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Completed
                | OperationStatus::Failed
                | OperationStatus::PartiallyFailed
                | OperationStatus::Cancelled
        )
    }
}

/// Status of a single per-source task within an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, first attempt not started yet
    Pending,
    /// An attempt is in flight (or a retry backoff is in progress)
    Running,
    /// The scrape succeeded
    Succeeded,
    /// All attempts exhausted or a permanent error occurred
    Failed,
    /// Cancellation was observed before the task could succeed or fail
    Cancelled,
}

impl TaskStatus {
    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Point-in-time snapshot of one per-source task
///
/// Snapshots are copies; holding one never blocks or observes the live task.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    /// Source this task scrapes
    pub source: SourceId,

    /// Current status
    pub status: TaskStatus,

    /// Attempt counter, 1-based (1 while the first attempt runs)
    pub attempt: u32,

    /// Upper bound on attempts (`max_retries + 1`)
    pub max_attempts: u32,

    /// Progress percentage, 0-100
    pub progress: u8,

    /// Coarse description of what the scraper is doing right now
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,

    /// Number of packages processed, set on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages_processed: Option<u64>,

    /// Error message of the most recent failed attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Point-in-time snapshot of a whole operation
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationSnapshot {
    /// Operation identifier
    pub id: OperationId,

    /// Aggregate status
    pub status: OperationStatus,

    /// Mean progress across all tasks, 0-100
    pub progress: u8,

    /// Human-readable description of the current phase
    pub current_step: String,

    /// When the operation was admitted
    pub started_at: DateTime<Utc>,

    /// Requested sources, in request order
    pub sources: Vec<SourceId>,

    /// Per-task snapshots, in request order
    pub tasks: Vec<TaskSnapshot>,
}

/// Snapshot answer to "is anything running right now?"
///
/// At most one operation is active at a time, so `operations` holds zero or
/// one element; it is a list only to match the shape consumers poll for.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunningView {
    /// Whether an operation is currently active
    pub in_progress: bool,

    /// Snapshot of the active operation, if any
    pub operations: Vec<OperationSnapshot>,
}

/// Historical record of a terminal operation
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    /// Operation identifier
    pub id: OperationId,

    /// Terminal status
    pub status: OperationStatus,

    /// Sources the operation scraped
    pub sources: Vec<SourceId>,

    /// When the operation was admitted
    pub started_at: DateTime<Utc>,

    /// When the last task reached a terminal state
    pub ended_at: DateTime<Utc>,

    /// Total packages processed across all tasks
    pub packages_processed: u64,

    /// Number of tasks that succeeded
    pub tasks_succeeded: usize,

    /// Number of tasks that failed
    pub tasks_failed: usize,

    /// Number of tasks that were cancelled
    pub tasks_cancelled: usize,
}

/// Rolling-window statistics over completed operations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    /// Operations that reached any terminal state within the window
    pub total_operations: u64,

    /// Operations that completed with every task succeeding
    pub successful_operations: u64,

    /// Operations that failed, partially failed, or were cancelled
    pub failed_operations: u64,

    /// Packages processed across all tasks of all operations in the window
    pub total_packages_processed: u64,
}

/// Next computed fire time for one cron schedule
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NextRun {
    /// Schedule identifier
    pub schedule_id: String,

    /// Sources the schedule triggers
    pub sources: Vec<SourceId>,

    /// Next fire time, None if the expression has no future fire times
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Snapshot of the cron scheduler state
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CronStatusView {
    /// Whether the scheduler is globally enabled
    pub enabled: bool,

    /// Number of schedules with a live timer
    pub active_tasks: usize,

    /// Total number of configured schedules
    pub total_tasks: usize,

    /// Upcoming fire times for enabled schedules, recomputed on each call
    pub next_runs: Vec<NextRun>,
}
