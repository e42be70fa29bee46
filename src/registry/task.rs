//! Per-source task execution loop
//!
//! One invocation of [`run_task`] drives one task from its first attempt to
//! a terminal state: scrape under a per-attempt deadline, consult the retry
//! policy on failure, sleep the backoff, re-run. Every await point races the
//! operation-wide cancellation token, so a cancel request lands at the next
//! suspension regardless of what the task is doing.

use crate::error::ScrapeError;
use crate::retry::RetryPolicy;
use crate::scraper::{ProgressHandle, ScrapeContext, SourceScraper};
use crate::types::OperationId;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::operation::TaskState;

/// Drive one per-source task to a terminal state
pub(super) async fn run_task(
    scraper: Arc<dyn SourceScraper>,
    task: Arc<TaskState>,
    operation_id: OperationId,
    cancel: CancellationToken,
    timeout_per_task: Duration,
    retry: RetryPolicy,
) {
    let source = task.source().clone();
    let ctx = ScrapeContext::new(
        source.clone(),
        operation_id,
        cancel.clone(),
        ProgressHandle::new(task.progress_state()),
    );

    // Cancellation may have arrived while this task waited for a
    // concurrency slot
    if cancel.is_cancelled() {
        task.mark_cancelled();
        info!(operation_id = %operation_id, source = %source, "task cancelled before first attempt");
        return;
    }

    loop {
        let attempt = task.begin_attempt();
        debug!(
            operation_id = %operation_id,
            source = %source,
            attempt,
            max_attempts = task.max_attempts(),
            "starting scrape attempt"
        );

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                task.mark_cancelled();
                info!(operation_id = %operation_id, source = %source, attempt, "task cancelled mid-attempt");
                return;
            }
            result = tokio::time::timeout(timeout_per_task, scraper.scrape(&ctx)) => match result {
                Ok(scrape_result) => scrape_result,
                Err(_elapsed) => Err(ScrapeError::Timeout(timeout_per_task)),
            },
        };

        match outcome {
            Ok(packages) => {
                task.mark_succeeded(packages);
                info!(
                    operation_id = %operation_id,
                    source = %source,
                    attempt,
                    packages_processed = packages,
                    "scrape succeeded"
                );
                return;
            }
            Err(ScrapeError::Cancelled) => {
                task.mark_cancelled();
                info!(operation_id = %operation_id, source = %source, attempt, "scraper observed cancellation");
                return;
            }
            Err(err) => {
                task.record_attempt_error(&err);

                let backoff = if cancel.is_cancelled() {
                    // A cancel that raced the attempt's completion still
                    // wins: no further retries once cancellation is observed
                    None
                } else {
                    retry.should_retry(attempt, task.max_attempts(), &err)
                };

                match backoff {
                    Some(delay) => {
                        warn!(
                            operation_id = %operation_id,
                            source = %source,
                            error = %err,
                            attempt,
                            max_attempts = task.max_attempts(),
                            backoff_ms = delay.as_millis(),
                            "scrape attempt failed, retrying"
                        );

                        tokio::select! {
                            _ = cancel.cancelled() => {
                                task.mark_cancelled();
                                info!(operation_id = %operation_id, source = %source, "task cancelled during backoff");
                                return;
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    None => {
                        if cancel.is_cancelled() {
                            task.mark_cancelled();
                            info!(operation_id = %operation_id, source = %source, attempt, "task cancelled after failed attempt");
                        } else {
                            task.mark_failed(&err);
                            error!(
                                operation_id = %operation_id,
                                source = %source,
                                error = %err,
                                attempts = attempt,
                                "task failed"
                            );
                        }
                        return;
                    }
                }
            }
        }
    }
}
