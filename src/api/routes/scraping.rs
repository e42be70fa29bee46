//! Scraping operation handlers — start, running snapshot, cancel, statistics.

use super::{
    CancelScrapingResponse, RunningData, RunningResponse, StartScrapingRequest,
    StartScrapingResponse, StatisticsData, StatisticsQuery, StatisticsResponse,
};
use crate::api::AppState;
use crate::error::{Error, Result};
use crate::types::{OperationId, SourceId};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::time::Duration;

/// POST /scraping/start - Start a scraping operation
#[utoipa::path(
    post,
    path = "/scraping/start",
    tag = "scraping",
    request_body = StartScrapingRequest,
    responses(
        (status = 200, description = "Operation admitted", body = StartScrapingResponse),
        (status = 400, description = "Unknown source, empty source list, or invalid config"),
        (status = 409, description = "Another operation is already running"),
        (status = 503, description = "Shutdown in progress")
    )
)]
pub async fn start_scraping(
    State(state): State<AppState>,
    Json(request): Json<StartScrapingRequest>,
) -> Result<Json<StartScrapingResponse>> {
    let sources: Vec<SourceId> = request.sources.into_iter().map(SourceId::from).collect();

    // Per-request overrides on top of the configured defaults
    let mut run_config = state.orchestrator.run_defaults();
    if let Some(overrides) = request.config {
        if let Some(timeout_ms) = overrides.timeout {
            run_config.timeout_per_task = Duration::from_millis(timeout_ms);
        }
        if let Some(retry_attempts) = overrides.retry_attempts {
            run_config.max_retries = retry_attempts;
        }
    }

    let operation_id = state.orchestrator.start_operation(sources, run_config)?;

    Ok(Json(StartScrapingResponse {
        success: true,
        operation_id,
    }))
}

/// GET /scraping/running - Snapshot of the active operation
#[utoipa::path(
    get,
    path = "/scraping/running",
    tag = "scraping",
    responses(
        (status = 200, description = "Non-blocking snapshot", body = RunningResponse)
    )
)]
pub async fn running_operations(State(state): State<AppState>) -> Json<RunningResponse> {
    let view = state.orchestrator.running();

    Json(RunningResponse {
        data: RunningData {
            is_scraping_in_progress: view.in_progress,
            operations: view.operations.into_iter().map(Into::into).collect(),
        },
    })
}

/// POST /scraping/cancel/:operationId - Cancel the active operation
#[utoipa::path(
    post,
    path = "/scraping/cancel/{operationId}",
    tag = "scraping",
    params(("operationId" = String, Path, description = "Operation identifier")),
    responses(
        (status = 200, description = "Cancellation requested", body = CancelScrapingResponse),
        (status = 404, description = "Not the active operation (or already terminal)")
    )
)]
pub async fn cancel_scraping(
    State(state): State<AppState>,
    Path(operation_id): Path<String>,
) -> Result<Json<CancelScrapingResponse>> {
    let operation_id: OperationId = operation_id
        .parse()
        .map_err(|_| Error::NotFound(format!("operation {operation_id}")))?;

    state.orchestrator.cancel(operation_id)?;

    Ok(Json(CancelScrapingResponse { success: true }))
}

/// GET /scraping/statistics - Rolling-window statistics
#[utoipa::path(
    get,
    path = "/scraping/statistics",
    tag = "scraping",
    params(
        ("windowDays" = Option<u32>, Query, description = "Window in days (default: 30)")
    ),
    responses(
        (status = 200, description = "Aggregated statistics", body = StatisticsResponse)
    )
)]
pub async fn scraping_statistics(
    State(state): State<AppState>,
    Query(query): Query<StatisticsQuery>,
) -> Json<StatisticsResponse> {
    let window = query
        .window_days
        .map(|days| Duration::from_secs(u64::from(days) * 24 * 60 * 60));

    Json(StatisticsResponse {
        data: StatisticsData {
            statistics: state.orchestrator.statistics(window),
        },
    })
}
