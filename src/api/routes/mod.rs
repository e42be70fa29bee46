//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`scraping`] — Operation start/running/cancel/statistics
//! - [`cron`] — Cron scheduler status and toggles
//! - [`system`] — Health and OpenAPI

use crate::types::{CronStatusView, OperationId, OperationSnapshot, SourceId, StatisticsSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod cron;
mod scraping;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use cron::*;
pub use scraping::*;
pub use system::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Request body for POST /scraping/start
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartScrapingRequest {
    /// Sources to scrape, in the order their tasks should start
    pub sources: Vec<String>,

    /// Optional overrides for the default run settings
    #[serde(default)]
    pub config: Option<StartScrapingConfig>,
}

/// Per-request run setting overrides
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartScrapingConfig {
    /// Deadline for a single scrape attempt, in milliseconds
    pub timeout: Option<u64>,

    /// Number of retries after a failed attempt
    pub retry_attempts: Option<u32>,
}

/// Response for POST /scraping/start
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartScrapingResponse {
    /// Always true on success
    pub success: bool,

    /// Identifier of the admitted operation
    pub operation_id: OperationId,
}

/// Response for POST /scraping/cancel/:operationId
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CancelScrapingResponse {
    /// Always true on success
    pub success: bool,
}

/// One active operation as shown to the dashboard
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunningOperation {
    /// Operation identifier
    pub operation_id: OperationId,

    /// Aggregate status
    pub status: crate::types::OperationStatus,

    /// Human-readable description of the current phase
    pub current_step: String,

    /// Mean progress across all tasks, 0-100
    pub progress: u8,

    /// When the operation was admitted
    pub start_time: DateTime<Utc>,

    /// Requested sources
    pub sources: Vec<SourceId>,

    /// Per-task detail
    pub tasks: Vec<crate::types::TaskSnapshot>,
}

impl From<OperationSnapshot> for RunningOperation {
    fn from(snapshot: OperationSnapshot) -> Self {
        Self {
            operation_id: snapshot.id,
            status: snapshot.status,
            current_step: snapshot.current_step,
            progress: snapshot.progress,
            start_time: snapshot.started_at,
            sources: snapshot.sources,
            tasks: snapshot.tasks,
        }
    }
}

/// Payload of GET /scraping/running
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunningData {
    /// Whether an operation is currently active
    pub is_scraping_in_progress: bool,

    /// Zero or one active operations
    pub operations: Vec<RunningOperation>,
}

/// Response for GET /scraping/running
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct RunningResponse {
    /// Response payload
    pub data: RunningData,
}

/// Query parameters for GET /scraping/statistics
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsQuery {
    /// Window in days (default: 30)
    pub window_days: Option<u32>,
}

/// Payload of GET /scraping/statistics
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct StatisticsData {
    /// Aggregated counters
    pub statistics: StatisticsSnapshot,
}

/// Response for GET /scraping/statistics
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct StatisticsResponse {
    /// Response payload
    pub data: StatisticsData,
}

/// Response for GET /scraping/cron/status
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CronStatusResponse {
    /// Response payload
    pub data: CronStatusView,
}

/// Response for the cron toggle endpoints
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CronToggleResponse {
    /// Always true on success
    pub success: bool,
}

/// Response for GET /health
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the server answers
    pub status: String,

    /// Crate version
    pub version: String,
}
