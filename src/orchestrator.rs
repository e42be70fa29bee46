//! The orchestrator facade
//!
//! Ties the registry, the cron scheduler, and the statistics aggregator
//! together behind one handle that embedders construct once and share
//! (`Arc`-wrapped) with the API server and their own code. All methods
//! delegate; the components stay individually usable for consumers that
//! only need a subset.

use crate::api;
use crate::config::{Config, RunConfig};
use crate::cron_scheduler::CronScheduler;
use crate::error::Result;
use crate::registry::OperationRegistry;
use crate::scraper::SourceScraper;
use crate::stats::StatisticsAggregator;
use crate::types::{
    CronStatusView, OperationId, OperationSummary, RunningView, SourceId, StatisticsSnapshot,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Central orchestrator handle
///
/// # Example
///
/// ```no_run
/// use scrape_orchestrator::{Config, Orchestrator, SourceScraper};
/// use std::collections::HashMap;
/// use std::sync::Arc;
///
/// # fn scrapers() -> HashMap<scrape_orchestrator::SourceId, Arc<dyn SourceScraper>> {
/// #     HashMap::new()
/// # }
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = Arc::new(Orchestrator::new(Config::default(), scrapers())?);
///
///     orchestrator.start_cron();
///     orchestrator.spawn_api_server();
///
///     scrape_orchestrator::run_with_shutdown(orchestrator).await?;
///     Ok(())
/// }
/// ```
pub struct Orchestrator {
    config: Arc<Config>,
    registry: Arc<OperationRegistry>,
    cron: Arc<CronScheduler>,
    stats: StatisticsAggregator,
}

impl Orchestrator {
    /// Build an orchestrator from configuration and one scraper per source
    ///
    /// Validates the configuration (including every cron expression) before
    /// constructing anything.
    pub fn new(config: Config, scrapers: HashMap<SourceId, Arc<dyn SourceScraper>>) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(OperationRegistry::new(&config, scrapers));
        let cron = Arc::new(CronScheduler::new(
            &config.cron,
            config.run.clone(),
            Arc::clone(&registry),
        )?);
        let stats =
            StatisticsAggregator::new(Arc::clone(&registry), config.history.default_window);

        info!(
            sources = ?registry.known_sources(),
            schedules = config.cron.schedules.len(),
            "orchestrator initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            registry,
            cron,
            stats,
        })
    }

    /// The configuration this orchestrator was built with
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// The underlying operation registry
    pub fn registry(&self) -> Arc<OperationRegistry> {
        Arc::clone(&self.registry)
    }

    /// Sources with a registered scraper
    pub fn known_sources(&self) -> Vec<SourceId> {
        self.registry.known_sources()
    }

    /// Default run settings for new operations
    pub fn run_defaults(&self) -> RunConfig {
        self.registry.run_defaults().clone()
    }

    /// Start a scraping operation over `sources`
    pub fn start_operation(&self, sources: Vec<SourceId>, config: RunConfig) -> Result<OperationId> {
        self.registry.start(sources, config)
    }

    /// Snapshot of the currently active operation, if any
    pub fn running(&self) -> RunningView {
        self.registry.get_running()
    }

    /// Request cooperative cancellation of the active operation
    pub fn cancel(&self, id: OperationId) -> Result<()> {
        self.registry.cancel(id)
    }

    /// Terminal operations started within `window` (default statistics
    /// window when `None`), newest first
    pub fn history(&self, window: Option<Duration>) -> Vec<OperationSummary> {
        self.registry
            .history(window.unwrap_or(self.stats.default_window()))
    }

    /// Rolling-window statistics for the dashboard
    pub fn statistics(&self, window: Option<Duration>) -> StatisticsSnapshot {
        self.stats.compute(window)
    }

    /// Spawn the cron scheduler's timer loops
    pub fn start_cron(&self) {
        self.cron.start();
    }

    /// Snapshot of the cron scheduler state
    pub fn cron_status(&self) -> CronStatusView {
        self.cron.status()
    }

    /// Enable or disable one cron schedule
    pub fn set_schedule_enabled(&self, schedule_id: &str, enabled: bool) -> Result<()> {
        self.cron.set_schedule_enabled(schedule_id, enabled)
    }

    /// Globally pause or resume cron firing
    pub fn set_cron_enabled(&self, enabled: bool) {
        self.cron.set_enabled(enabled);
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server runs concurrently with scraping work and listens on the
    /// configured bind address.
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { api::start_api_server(orchestrator).await })
    }

    /// Graceful shutdown: stop cron timers, cancel the active operation,
    /// and wait (bounded) for it to wind down
    pub async fn shutdown(&self) {
        info!("orchestrator shutting down");
        self.cron.stop();
        self.registry.shutdown().await;
        info!("orchestrator shutdown complete");
    }
}
