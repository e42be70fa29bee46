//! REST API server module
//!
//! JSON-over-HTTP surface consumed by the operations dashboard. Everything
//! is a thin layer over the orchestrator: handlers validate input, delegate,
//! and shape the response; no orchestration state lives here.

use crate::error::Result;
use crate::orchestrator::Orchestrator;
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Scraping Operations
/// - `POST /scraping/start` - Start an operation over the requested sources
/// - `GET /scraping/running` - Non-blocking snapshot of the active operation
/// - `POST /scraping/cancel/:operationId` - Cancel the active operation
/// - `GET /scraping/statistics` - Rolling-window statistics (default 30 days)
///
/// ## Cron Scheduler
/// - `GET /scraping/cron/status` - Scheduler state and next fire times
/// - `POST /scraping/cron/pause` - Globally pause firing
/// - `POST /scraping/cron/resume` - Resume firing
/// - `POST /scraping/cron/schedules/:id/enable` - Enable one schedule
/// - `POST /scraping/cron/schedules/:id/disable` - Disable one schedule
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive documentation (if enabled)
pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = AppState::new(orchestrator);
    let config = state.config.clone();

    let router = Router::new()
        // Scraping operations
        .route("/scraping/start", post(routes::start_scraping))
        .route("/scraping/running", get(routes::running_operations))
        .route(
            "/scraping/cancel/:operation_id",
            post(routes::cancel_scraping),
        )
        .route("/scraping/statistics", get(routes::scraping_statistics))
        // Cron scheduler
        .route("/scraping/cron/status", get(routes::cron_status))
        .route("/scraping/cron/pause", post(routes::pause_cron))
        .route("/scraping/cron/resume", post(routes::resume_cron))
        .route(
            "/scraping/cron/schedules/:id/enable",
            post(routes::enable_schedule),
        )
        .route(
            "/scraping/cron/schedules/:id/disable",
            post(routes::disable_schedule),
        )
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    // Merge Swagger UI routes if enabled in config (before applying state)
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state);

    // Apply CORS middleware if enabled in config
    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// Origins support "*" for any origin; unparseable entries are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Creates a TCP listener, binds it to the configured address, and serves
/// the API router until the server is shut down.
pub async fn start_api_server(orchestrator: Arc<Orchestrator>) -> Result<()> {
    let bind_address = orchestrator.config().server.api.bind_address;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let app = create_router(orchestrator);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "API server listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServer(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}
