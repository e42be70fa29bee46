//! Cron scheduler handlers — status and runtime toggles.

use super::{CronStatusResponse, CronToggleResponse};
use crate::api::AppState;
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
};

/// GET /scraping/cron/status - Scheduler snapshot with next fire times
#[utoipa::path(
    get,
    path = "/scraping/cron/status",
    tag = "cron",
    responses(
        (status = 200, description = "Scheduler state and upcoming runs", body = CronStatusResponse)
    )
)]
pub async fn cron_status(State(state): State<AppState>) -> Json<CronStatusResponse> {
    Json(CronStatusResponse {
        data: state.orchestrator.cron_status(),
    })
}

/// POST /scraping/cron/pause - Globally pause cron firing
#[utoipa::path(
    post,
    path = "/scraping/cron/pause",
    tag = "cron",
    responses(
        (status = 200, description = "Scheduler paused", body = CronToggleResponse)
    )
)]
pub async fn pause_cron(State(state): State<AppState>) -> Json<CronToggleResponse> {
    state.orchestrator.set_cron_enabled(false);
    Json(CronToggleResponse { success: true })
}

/// POST /scraping/cron/resume - Resume cron firing
#[utoipa::path(
    post,
    path = "/scraping/cron/resume",
    tag = "cron",
    responses(
        (status = 200, description = "Scheduler resumed", body = CronToggleResponse)
    )
)]
pub async fn resume_cron(State(state): State<AppState>) -> Json<CronToggleResponse> {
    state.orchestrator.set_cron_enabled(true);
    Json(CronToggleResponse { success: true })
}

/// POST /scraping/cron/schedules/:id/enable - Enable one schedule
#[utoipa::path(
    post,
    path = "/scraping/cron/schedules/{id}/enable",
    tag = "cron",
    params(("id" = String, Path, description = "Schedule identifier")),
    responses(
        (status = 200, description = "Schedule enabled", body = CronToggleResponse),
        (status = 404, description = "Schedule not found")
    )
)]
pub async fn enable_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CronToggleResponse>> {
    state.orchestrator.set_schedule_enabled(&id, true)?;
    Ok(Json(CronToggleResponse { success: true }))
}

/// POST /scraping/cron/schedules/:id/disable - Disable one schedule
#[utoipa::path(
    post,
    path = "/scraping/cron/schedules/{id}/disable",
    tag = "cron",
    params(("id" = String, Path, description = "Schedule identifier")),
    responses(
        (status = 200, description = "Schedule disabled", body = CronToggleResponse),
        (status = 404, description = "Schedule not found")
    )
)]
pub async fn disable_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CronToggleResponse>> {
    state.orchestrator.set_schedule_enabled(&id, false)?;
    Ok(Json(CronToggleResponse { success: true }))
}
