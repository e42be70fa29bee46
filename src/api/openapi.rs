//! OpenAPI documentation and schema generation
//!
//! Compile-time OpenAPI specification for the orchestrator REST API,
//! generated with utoipa. The spec is served at `/openapi.json` and, when
//! enabled, browsable at `/swagger-ui`.

use utoipa::OpenApi;

/// OpenAPI documentation for the scrape-orchestrator REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "scrape-orchestrator REST API",
        version = "0.1.0",
        description = "REST API for starting, tracking, cancelling, and scheduling scraping operations",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    paths(
        // Scraping operations
        crate::api::routes::start_scraping,
        crate::api::routes::running_operations,
        crate::api::routes::cancel_scraping,
        crate::api::routes::scraping_statistics,

        // Cron scheduler
        crate::api::routes::cron_status,
        crate::api::routes::pause_cron,
        crate::api::routes::resume_cron,
        crate::api::routes::enable_schedule,
        crate::api::routes::disable_schedule,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::api::routes::StartScrapingRequest,
        crate::api::routes::StartScrapingConfig,
        crate::api::routes::StartScrapingResponse,
        crate::api::routes::CancelScrapingResponse,
        crate::api::routes::RunningOperation,
        crate::api::routes::RunningData,
        crate::api::routes::RunningResponse,
        crate::api::routes::StatisticsQuery,
        crate::api::routes::StatisticsData,
        crate::api::routes::StatisticsResponse,
        crate::api::routes::CronStatusResponse,
        crate::api::routes::CronToggleResponse,
        crate::api::routes::HealthResponse,
        crate::error::ApiError,
        crate::error::ErrorDetail,
        crate::types::SourceId,
        crate::types::OperationId,
        crate::types::OperationStatus,
        crate::types::TaskStatus,
        crate::types::TaskSnapshot,
        crate::types::StatisticsSnapshot,
        crate::types::CronStatusView,
        crate::types::NextRun,
    )),
    tags(
        (name = "scraping", description = "Operation lifecycle"),
        (name = "cron", description = "Cron scheduler"),
        (name = "system", description = "Health and documentation")
    )
)]
pub struct ApiDoc;
