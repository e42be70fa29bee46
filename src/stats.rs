//! Rolling-window statistics over completed operations
//!
//! A pure fold over the registry's history: nothing is cached, recomputation
//! is O(history size), and history is bounded by the retention cap. The
//! dashboard treats `PartiallyFailed` as a success-with-warning, but for the
//! failure counter here it counts as failed, together with `Failed` and
//! `Cancelled`.

use crate::registry::OperationRegistry;
use crate::types::{OperationStatus, StatisticsSnapshot};
use std::sync::Arc;
use std::time::Duration;

/// Answers rolling-window statistics queries for the operations dashboard
pub struct StatisticsAggregator {
    registry: Arc<OperationRegistry>,
    default_window: Duration,
}

impl StatisticsAggregator {
    /// Create an aggregator reading from `registry`
    pub fn new(registry: Arc<OperationRegistry>, default_window: Duration) -> Self {
        Self {
            registry,
            default_window,
        }
    }

    /// The window used when a query does not specify one
    pub fn default_window(&self) -> Duration {
        self.default_window
    }

    /// Compute statistics over operations started within `window`
    /// (or the default window when `None`)
    pub fn compute(&self, window: Option<Duration>) -> StatisticsSnapshot {
        let window = window.unwrap_or(self.default_window);
        let history = self.registry.history(window);

        let mut stats = StatisticsSnapshot::default();
        for summary in &history {
            stats.total_operations += 1;
            match summary.status {
                OperationStatus::Completed => stats.successful_operations += 1,
                OperationStatus::Failed
                | OperationStatus::PartiallyFailed
                | OperationStatus::Cancelled => stats.failed_operations += 1,
                // History only holds terminal operations
                OperationStatus::Queued | OperationStatus::Running => {}
            }
            stats.total_packages_processed += summary.packages_processed;
        }
        stats
    }
}
