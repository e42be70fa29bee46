//! The scraper capability boundary
//!
//! The orchestrator never parses provider pages itself. Each provider is an
//! implementation of [`SourceScraper`], injected at construction and invoked
//! per task attempt with a [`ScrapeContext`]. Implementations must:
//!
//! - respect cancellation: check [`ScrapeContext::is_cancelled`] between
//!   pages (or race long awaits against [`ScrapeContext::cancelled`]) and
//!   return [`ScrapeError::Cancelled`] when observed;
//! - classify their failures as [`ScrapeError::Transient`] (worth retrying)
//!   or [`ScrapeError::Permanent`] (configuration or provider-redesign
//!   problems that retrying cannot fix);
//! - report coarse progress through [`ScrapeContext::progress`] so the
//!   dashboard has something meaningful to show.
//!
//! Storing the scraped packages is the scraper's (or its downstream
//! collaborator's) responsibility; the orchestrator only records the count.
//!
//! # Example
//!
//! ```no_run
//! use scrape_orchestrator::{ScrapeContext, ScrapeError, SourceScraper};
//!
//! struct TravelorScraper;
//!
//! #[async_trait::async_trait]
//! impl SourceScraper for TravelorScraper {
//!     async fn scrape(&self, ctx: &ScrapeContext) -> Result<u64, ScrapeError> {
//!         let mut processed = 0;
//!         for page in 1..=5u8 {
//!             if ctx.is_cancelled() {
//!                 return Err(ScrapeError::Cancelled);
//!             }
//!             ctx.progress().report(page * 20, format!("listing page {page} of 5"));
//!             // fetch and parse the page, store packages...
//!             processed += 40;
//!         }
//!         Ok(processed)
//!     }
//! }
//! ```

use crate::error::ScrapeError;
use crate::types::{OperationId, SourceId};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio_util::sync::CancellationToken;

/// Capability interface implemented once per provider site
#[async_trait]
pub trait SourceScraper: Send + Sync {
    /// Scrape all package listings for the context's source
    ///
    /// Returns the number of packages processed, or a classified error.
    /// One call corresponds to one attempt; the orchestrator handles
    /// retries and deadlines around it.
    async fn scrape(&self, ctx: &ScrapeContext) -> Result<u64, ScrapeError>;
}

/// Per-attempt context handed to a [`SourceScraper`]
#[derive(Clone)]
pub struct ScrapeContext {
    source: SourceId,
    operation_id: OperationId,
    cancel: CancellationToken,
    progress: ProgressHandle,
}

impl ScrapeContext {
    pub(crate) fn new(
        source: SourceId,
        operation_id: OperationId,
        cancel: CancellationToken,
        progress: ProgressHandle,
    ) -> Self {
        Self {
            source,
            operation_id,
            cancel,
            progress,
        }
    }

    /// The source being scraped
    pub fn source(&self) -> &SourceId {
        &self.source
    }

    /// The operation this attempt belongs to
    pub fn operation_id(&self) -> OperationId {
        self.operation_id
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Future that resolves once cancellation is requested
    ///
    /// Useful to race against long network awaits:
    /// `tokio::select! { _ = ctx.cancelled() => ..., page = fetch(...) => ... }`
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Progress reporting handle for this task
    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }
}

/// Shared progress state between a running task and snapshot readers
///
/// Progress is clamped to 0-100 and monotonically non-decreasing: a stale or
/// out-of-order report can never move the bar backwards.
#[derive(Debug, Default)]
pub(crate) struct ProgressState {
    percent: AtomicU8,
    step: Mutex<Option<String>>,
}

impl ProgressState {
    /// Record a progress report, keeping the percentage monotonic
    fn report(&self, percent: u8, step: Option<String>) {
        self.percent.fetch_max(percent.min(100), Ordering::Relaxed);
        if let Some(step) = step {
            *lock_ignore_poison(&self.step) = Some(step);
        }
    }

    /// Force the percentage to 100 (terminal success)
    pub(crate) fn complete(&self) {
        self.percent.store(100, Ordering::Relaxed);
    }

    pub(crate) fn percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }

    pub(crate) fn step(&self) -> Option<String> {
        lock_ignore_poison(&self.step).clone()
    }
}

/// Recover the guard from a poisoned lock; the protected state is plain data
fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Handle scrapers use to report coarse progress
#[derive(Clone)]
pub struct ProgressHandle {
    state: std::sync::Arc<ProgressState>,
}

impl ProgressHandle {
    pub(crate) fn new(state: std::sync::Arc<ProgressState>) -> Self {
        Self { state }
    }

    /// Report progress with a step description, e.g. `(40, "listing page 2 of 5")`
    pub fn report(&self, percent: u8, step: impl Into<String>) {
        self.state.report(percent, Some(step.into()));
    }

    /// Report progress without changing the step description
    pub fn report_percent(&self, percent: u8) {
        self.state.report(percent, None);
    }
}
