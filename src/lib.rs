//! # scrape-orchestrator
//!
//! Backend orchestration library for scraping travel-package listings from
//! several independent provider sites.
//!
//! ## Design Philosophy
//!
//! - **Orchestration only** - page parsing, package storage, and auth live
//!   behind injected collaborators; this crate decides *when* and *how many*
//!   scraping tasks run and reports their outcome
//! - **One operation at a time** - a single guarded slot admits operations;
//!   concurrent start requests lose cleanly with an "already running" error
//! - **Cooperative cancellation** - every await point races a shared
//!   cancellation token, so cancel requests land at the next check without
//!   killing tasks mid-write
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding,
//!   with an optional bundled REST API server
//!
//! ## Quick Start
//!
//! ```no_run
//! use scrape_orchestrator::{
//!     Config, Orchestrator, ScrapeContext, ScrapeError, SourceId, SourceScraper,
//! };
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! struct TravelorScraper;
//!
//! #[async_trait::async_trait]
//! impl SourceScraper for TravelorScraper {
//!     async fn scrape(&self, ctx: &ScrapeContext) -> Result<u64, ScrapeError> {
//!         // fetch listing pages, parse packages, store them...
//!         ctx.progress().report(100, "done");
//!         Ok(42)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scrapers: HashMap<SourceId, Arc<dyn SourceScraper>> = HashMap::new();
//!     scrapers.insert(SourceId::from("travelor"), Arc::new(TravelorScraper));
//!
//!     let orchestrator = Arc::new(Orchestrator::new(Config::default(), scrapers)?);
//!     orchestrator.start_cron();
//!     orchestrator.spawn_api_server();
//!
//!     // Run until SIGTERM/SIGINT, then shut down gracefully
//!     scrape_orchestrator::run_with_shutdown(orchestrator).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Cron-driven operation scheduling
pub mod cron_scheduler;
/// Error types
pub mod error;
/// Orchestrator facade
pub mod orchestrator;
/// Operation registry and task lifecycle
pub mod registry;
/// Retry logic with exponential backoff
pub mod retry;
/// Scraper capability boundary
pub mod scraper;
/// Rolling-window statistics
pub mod stats;
/// Core types and views
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, Config, CronConfig, CronScheduleConfig, HistoryConfig, RetryConfig, RunConfig};
pub use cron_scheduler::CronScheduler;
pub use error::{ApiError, Error, ErrorDetail, Result, ScrapeError, ToHttpStatus};
pub use orchestrator::Orchestrator;
pub use registry::OperationRegistry;
pub use retry::{IsRetryable, RetryPolicy};
pub use scraper::{ProgressHandle, ScrapeContext, SourceScraper};
pub use stats::StatisticsAggregator;
pub use types::{
    CronStatusView, NextRun, OperationId, OperationSnapshot, OperationStatus, OperationSummary,
    RunningView, SourceId, StatisticsSnapshot, TaskSnapshot, TaskStatus,
};

use std::sync::Arc;

/// Helper function to run the orchestrator with graceful signal handling.
///
/// Waits for a termination signal and then calls the orchestrator's
/// `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(orchestrator: Arc<Orchestrator>) -> Result<()> {
    wait_for_signal().await;
    orchestrator.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers,
    // tests); fall back to plain Ctrl+C handling in that case
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        _ => {
            tracing::warn!("Could not register unix signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
