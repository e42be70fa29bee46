use super::*;
use crate::config::{Config, CronConfig, CronScheduleConfig};
use crate::registry::test_helpers::{MockScraper, fast_config};
use crate::scraper::SourceScraper;
use crate::types::SourceId;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use tower::ServiceExt;

/// Helper to build an orchestrator over scripted scrapers, wrapped in Arc
fn test_orchestrator(scrapers: Vec<(&str, Arc<MockScraper>)>) -> Arc<Orchestrator> {
    test_orchestrator_with_config(fast_config(), scrapers)
}

fn test_orchestrator_with_config(
    config: Config,
    scrapers: Vec<(&str, Arc<MockScraper>)>,
) -> Arc<Orchestrator> {
    let scrapers: HashMap<SourceId, Arc<dyn SourceScraper>> = scrapers
        .into_iter()
        .map(|(id, scraper)| (SourceId::from(id), scraper as Arc<dyn SourceScraper>))
        .collect();
    Arc::new(Orchestrator::new(config, scrapers).unwrap())
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn wait_until_idle(orchestrator: &Orchestrator) {
    crate::registry::test_helpers::wait_until_idle(
        &orchestrator.registry(),
        Duration::from_secs(5),
    )
    .await;
}

#[tokio::test]
async fn health_check_returns_ok() {
    let orchestrator = test_orchestrator(vec![("a", Arc::new(MockScraper::succeeding(1)))]);
    let app = create_router(orchestrator);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn start_running_and_cancel_round_trip() {
    let orchestrator = test_orchestrator(vec![(
        "siteA",
        Arc::new(MockScraper::slow(Duration::from_secs(5), 1)),
    )]);
    let app = create_router(orchestrator.clone());

    // Start
    let response = app
        .clone()
        .oneshot(post_json(
            "/scraping/start",
            serde_json::json!({"sources": ["siteA"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    let operation_id = body["operationId"].as_str().unwrap().to_string();

    // Running snapshot shows the operation (camelCase wire format)
    let response = app.clone().oneshot(get("/scraping/running")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["isScrapingInProgress"], true);
    let operations = body["data"]["operations"].as_array().unwrap();
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0]["operationId"], operation_id.as_str());
    assert!(operations[0]["startTime"].is_string());
    assert!(operations[0]["currentStep"].is_string());
    assert!(operations[0]["progress"].is_u64());

    // Cancel
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/scraping/cancel/{operation_id}"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["success"], true);

    wait_until_idle(&orchestrator).await;

    // Snapshot is empty again
    let response = app.oneshot(get("/scraping/running")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["isScrapingInProgress"], false);
    assert!(body["data"]["operations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn start_accepts_config_overrides() {
    let scraper = Arc::new(MockScraper::always_transient());
    let orchestrator = test_orchestrator(vec![("siteA", scraper.clone())]);
    let app = create_router(orchestrator.clone());

    let response = app
        .oneshot(post_json(
            "/scraping/start",
            serde_json::json!({
                "sources": ["siteA"],
                "config": {"timeout": 5000, "retryAttempts": 1}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    wait_until_idle(&orchestrator).await;
    assert_eq!(
        scraper.calls.load(std::sync::atomic::Ordering::SeqCst),
        2,
        "retryAttempts=1 allows exactly two attempts"
    );
}

#[tokio::test]
async fn start_with_unknown_source_returns_400() {
    let orchestrator = test_orchestrator(vec![("a", Arc::new(MockScraper::succeeding(1)))]);
    let app = create_router(orchestrator);

    let response = app
        .oneshot(post_json(
            "/scraping/start",
            serde_json::json!({"sources": ["ghost"]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "unknown_source");
    assert_eq!(body["error"]["details"]["source"], "ghost");
}

#[tokio::test]
async fn start_with_empty_sources_returns_400() {
    let orchestrator = test_orchestrator(vec![("a", Arc::new(MockScraper::succeeding(1)))]);
    let app = create_router(orchestrator);

    let response = app
        .oneshot(post_json(
            "/scraping/start",
            serde_json::json!({"sources": []}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "empty_sources");
}

#[tokio::test]
async fn second_start_returns_409_with_active_operation_id() {
    let orchestrator = test_orchestrator(vec![(
        "siteA",
        Arc::new(MockScraper::slow(Duration::from_secs(5), 1)),
    )]);
    let app = create_router(orchestrator.clone());

    let response = app
        .clone()
        .oneshot(post_json(
            "/scraping/start",
            serde_json::json!({"sources": ["siteA"]}),
        ))
        .await
        .unwrap();
    let first_id = json_body(response).await["operationId"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            "/scraping/start",
            serde_json::json!({"sources": ["siteA"]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "already_running");
    assert_eq!(body["error"]["details"]["operationId"], first_id.as_str());

    let response = app
        .oneshot(post_json(
            &format!("/scraping/cancel/{first_id}"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    wait_until_idle(&orchestrator).await;
}

#[tokio::test]
async fn cancel_with_unknown_id_returns_404() {
    let orchestrator = test_orchestrator(vec![("a", Arc::new(MockScraper::succeeding(1)))]);
    let app = create_router(orchestrator);

    let id = crate::types::OperationId::generate();
    let response = app
        .oneshot(post_json(
            &format!("/scraping/cancel/{id}"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["code"], "not_found");
}

#[tokio::test]
async fn cancel_with_malformed_id_returns_404() {
    let orchestrator = test_orchestrator(vec![("a", Arc::new(MockScraper::succeeding(1)))]);
    let app = create_router(orchestrator);

    let response = app
        .oneshot(post_json(
            "/scraping/cancel/not-a-uuid",
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn statistics_reflect_completed_operations() {
    let orchestrator = test_orchestrator(vec![("siteA", Arc::new(MockScraper::succeeding(42)))]);
    let app = create_router(orchestrator.clone());

    // Empty to begin with
    let response = app
        .clone()
        .oneshot(get("/scraping/statistics"))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["statistics"]["totalOperations"], 0);

    // Run one operation to completion
    let response = app
        .clone()
        .oneshot(post_json(
            "/scraping/start",
            serde_json::json!({"sources": ["siteA"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    wait_until_idle(&orchestrator).await;

    let response = app
        .clone()
        .oneshot(get("/scraping/statistics"))
        .await
        .unwrap();
    let stats = &json_body(response).await["data"]["statistics"];
    assert_eq!(stats["totalOperations"], 1);
    assert_eq!(stats["successfulOperations"], 1);
    assert_eq!(stats["failedOperations"], 0);
    assert_eq!(stats["totalPackagesProcessed"], 42);

    // A zero-day window excludes everything
    let response = app
        .oneshot(get("/scraping/statistics?windowDays=0"))
        .await
        .unwrap();
    assert_eq!(
        json_body(response).await["data"]["statistics"]["totalOperations"],
        0
    );
}

#[tokio::test]
async fn cron_status_reports_schedules() {
    let mut config = fast_config();
    config.cron = CronConfig {
        enabled: true,
        schedules: vec![CronScheduleConfig {
            id: "nightly".to_string(),
            sources: vec![SourceId::from("siteA")],
            expression: "0 0 3 * * * *".to_string(),
            enabled: true,
        }],
    };
    let orchestrator = test_orchestrator_with_config(
        config,
        vec![("siteA", Arc::new(MockScraper::succeeding(1)))],
    );
    let app = create_router(orchestrator);

    let response = app.oneshot(get("/scraping/cron/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["data"]["enabled"], true);
    assert_eq!(body["data"]["totalTasks"], 1);
    let next_runs = body["data"]["nextRuns"].as_array().unwrap();
    assert_eq!(next_runs.len(), 1);
    assert_eq!(next_runs[0]["scheduleId"], "nightly");
    assert!(next_runs[0]["nextRunAt"].is_string());
}

#[tokio::test]
async fn cron_pause_and_resume_toggle_the_global_switch() {
    let orchestrator = test_orchestrator(vec![("a", Arc::new(MockScraper::succeeding(1)))]);
    let app = create_router(orchestrator.clone());

    let response = app
        .clone()
        .oneshot(post_json("/scraping/cron/pause", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!orchestrator.cron_status().enabled);

    let response = app
        .oneshot(post_json("/scraping/cron/resume", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(orchestrator.cron_status().enabled);
}

#[tokio::test]
async fn toggling_unknown_schedule_returns_404() {
    let orchestrator = test_orchestrator(vec![("a", Arc::new(MockScraper::succeeding(1)))]);
    let app = create_router(orchestrator);

    let response = app
        .oneshot(post_json(
            "/scraping/cron/schedules/ghost/enable",
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_headers_are_present_when_enabled() {
    let orchestrator = test_orchestrator(vec![("a", Arc::new(MockScraper::succeeding(1)))]);
    let app = create_router(orchestrator);

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn openapi_spec_is_served() {
    let orchestrator = test_orchestrator(vec![("a", Arc::new(MockScraper::succeeding(1)))]);
    let app = create_router(orchestrator);

    let response = app.oneshot(get("/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert!(body["paths"]["/scraping/start"].is_object());
}

#[tokio::test]
async fn api_server_binds_and_serves() {
    let mut config = fast_config();
    // Port 0 = OS assigns a free port
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let orchestrator = test_orchestrator_with_config(
        config,
        vec![("a", Arc::new(MockScraper::succeeding(1)))],
    );

    let api_handle = orchestrator.spawn_api_server();

    // Give it a moment to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    api_handle.abort();
}
