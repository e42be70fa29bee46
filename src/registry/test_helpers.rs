//! Shared test fixtures: scripted scrapers and registry builders

use crate::config::{Config, HistoryConfig, RetryConfig, RunConfig};
use crate::error::ScrapeError;
use crate::registry::OperationRegistry;
use crate::scraper::{ScrapeContext, SourceScraper};
use crate::types::SourceId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Scripted scraper whose behavior is declared up front
pub(crate) struct MockScraper {
    /// How many leading attempts fail with a transient error
    fail_first: u32,
    /// Fail every attempt with a permanent error instead
    permanent: bool,
    /// How long each attempt takes
    delay: Duration,
    /// Packages reported on success
    packages: u64,
    /// Progress reports emitted at the start of each attempt
    report_progress: Option<(u8, &'static str)>,
    /// Total scrape() invocations across all attempts
    pub(crate) calls: AtomicU32,
}

impl MockScraper {
    pub(crate) fn succeeding(packages: u64) -> Self {
        Self::new(0, false, Duration::ZERO, packages)
    }

    /// Fails the first `n` attempts with a transient error, then succeeds
    pub(crate) fn succeed_after(n: u32, packages: u64) -> Self {
        Self::new(n, false, Duration::ZERO, packages)
    }

    /// Every attempt fails with a transient error
    pub(crate) fn always_transient() -> Self {
        Self::new(u32::MAX, false, Duration::ZERO, 0)
    }

    /// Every attempt fails with a permanent error
    pub(crate) fn permanent_failure() -> Self {
        Self::new(0, true, Duration::ZERO, 0)
    }

    /// Succeeds after sleeping (cancellation-aware) for `delay`
    pub(crate) fn slow(delay: Duration, packages: u64) -> Self {
        Self::new(0, false, delay, packages)
    }

    pub(crate) fn with_progress(mut self, percent: u8, step: &'static str) -> Self {
        self.report_progress = Some((percent, step));
        self
    }

    fn new(fail_first: u32, permanent: bool, delay: Duration, packages: u64) -> Self {
        Self {
            fail_first,
            permanent,
            delay,
            packages,
            report_progress: None,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl SourceScraper for MockScraper {
    async fn scrape(&self, ctx: &ScrapeContext) -> Result<u64, ScrapeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some((percent, step)) = self.report_progress {
            ctx.progress().report(percent, step);
        }

        if !self.delay.is_zero() {
            tokio::select! {
                _ = ctx.cancelled() => return Err(ScrapeError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        if self.permanent {
            return Err(ScrapeError::permanent("selector configuration rejected"));
        }
        if call < self.fail_first {
            return Err(ScrapeError::transient("provider returned 503"));
        }
        Ok(self.packages)
    }
}

/// Config with millisecond-scale timeouts and no jitter, so tests run fast
/// and deterministically
pub(crate) fn fast_config() -> Config {
    Config {
        run: RunConfig {
            timeout_per_task: Duration::from_secs(5),
            max_retries: 2,
            max_parallel_tasks: None,
        },
        retry: RetryConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        history: HistoryConfig {
            retention: 50,
            default_window: Duration::from_secs(30 * 24 * 60 * 60),
        },
        ..Config::default()
    }
}

/// Build a registry over the given (source, scraper) pairs
///
/// Takes `Arc<MockScraper>` so callers can keep a handle for call-count
/// assertions.
pub(crate) fn registry_with(
    config: Config,
    scrapers: Vec<(&str, Arc<MockScraper>)>,
) -> Arc<OperationRegistry> {
    let scrapers: HashMap<SourceId, Arc<dyn SourceScraper>> = scrapers
        .into_iter()
        .map(|(id, scraper)| (SourceId::from(id), scraper as Arc<dyn SourceScraper>))
        .collect();
    Arc::new(OperationRegistry::new(&config, scrapers))
}

/// Poll until no operation is active, panicking after `timeout`
pub(crate) async fn wait_until_idle(registry: &OperationRegistry, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if !registry.get_running().in_progress {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "operation still running after {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
