//! Dead-letter sweeps
//!
//! The retry sweep claims due entries, re-reads the raw document, classifies
//! and delivers it again, and either removes the entry, advances its backoff,
//! or freezes it once the retry budget is spent. The cleanup sweep deletes
//! frozen entries past the retention window.

use crate::config::DeadLetterConfig;
use crate::delivery::Deliverer;
use crate::metrics::ProcessorMetrics;
use crate::TaskHandle;
use chrono::{Duration, Utc};
use lodestone_classifiers::{ClassifierOrchestrator, ReputationUpdate};
use lodestone_core::{DeadLetterEntry, DeadLetterStore, DocumentStore, Error, Result};
use lodestone_storage::HistoryRecorder;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counts for one retry sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetryReport {
    pub claimed: usize,
    pub succeeded: usize,
    pub rescheduled: usize,
    pub exhausted: usize,
}

pub struct RetrySweeper {
    dead_letters: Arc<dyn DeadLetterStore>,
    documents: Arc<dyn DocumentStore>,
    orchestrator: Arc<ClassifierOrchestrator>,
    deliverer: Deliverer,
    history: HistoryRecorder,
    metrics: ProcessorMetrics,
    config: DeadLetterConfig,
}

impl RetrySweeper {
    pub fn new(
        dead_letters: Arc<dyn DeadLetterStore>,
        documents: Arc<dyn DocumentStore>,
        orchestrator: Arc<ClassifierOrchestrator>,
        deliverer: Deliverer,
        history: HistoryRecorder,
        metrics: ProcessorMetrics,
        config: DeadLetterConfig,
    ) -> Self {
        Self {
            dead_letters,
            documents,
            orchestrator,
            deliverer,
            history,
            metrics,
            config,
        }
    }

    /// Start the retry and cleanup loops
    pub fn spawn(self: Arc<Self>) -> TaskHandle {
        let token = CancellationToken::new();
        let retry = tokio::spawn(self.clone().run_retries(token.clone()));
        let cleanup = tokio::spawn(self.run_cleanup(token.clone()));
        TaskHandle::new(token, vec![retry, cleanup])
    }

    async fn run_retries(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.retry_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.retry_once().await {
                error!(error = %e, "Dead-letter retry sweep failed");
            }
        }
        debug!("Retry sweep stopped");
    }

    async fn run_cleanup(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.cleanup_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.cleanup_once().await {
                error!(error = %e, "Dead-letter cleanup failed");
            }
        }
        debug!("Cleanup sweep stopped");
    }

    /// Claim and retry one batch of due entries
    pub async fn retry_once(&self) -> Result<RetryReport> {
        let entries = self
            .dead_letters
            .fetch_retryable(self.config.retry_batch_size)
            .await?;
        let mut report = RetryReport {
            claimed: entries.len(),
            ..Default::default()
        };
        if entries.is_empty() {
            return Ok(report);
        }

        for mut entry in entries {
            match self.retry(&entry).await {
                Ok(()) => {
                    self.metrics.record_retry(true);
                    report.succeeded += 1;
                    if let Err(e) = self.dead_letters.remove(&entry.content_id).await {
                        warn!(content_id = %entry.content_id, error = %e, "Failed to remove dead letter");
                    }
                    info!(
                        content_id = %entry.content_id,
                        attempt = entry.retry_count + 1,
                        "Dead-letter retry succeeded"
                    );
                }
                Err(e) => {
                    self.metrics.record_retry(false);
                    match self.fail(&mut entry, &e).await {
                        Ok(true) => report.exhausted += 1,
                        Ok(false) => report.rescheduled += 1,
                        // The claim lease expires and the entry comes round again
                        Err(store_err) => error!(
                            content_id = %entry.content_id,
                            error = %store_err,
                            "Failed to record dead-letter retry outcome"
                        ),
                    }
                }
            }
        }

        info!(
            claimed = report.claimed,
            succeeded = report.succeeded,
            rescheduled = report.rescheduled,
            exhausted = report.exhausted,
            "Dead-letter retry sweep complete"
        );
        Ok(report)
    }

    async fn retry(&self, entry: &DeadLetterEntry) -> Result<()> {
        let raw = self
            .documents
            .get_raw(&entry.source_name, &entry.content_id)
            .await?
            .ok_or_else(|| {
                Error::document(format!(
                    "raw document {} no longer exists in {}",
                    entry.content_id, entry.source_name
                ))
            })?;

        // The poller already fed this document into its source reputation
        let classification = self
            .orchestrator
            .classify_with(&raw, ReputationUpdate::Skip)
            .await?;
        self.deliverer.deliver(&classification.content).await?;

        if let Err(e) = self.history.record(&classification.history).await {
            warn!(content_id = %entry.content_id, error = %e, "Failed to record classification history");
        }
        Ok(())
    }

    /// Advance backoff or freeze the entry. Returns whether it is now exhausted.
    async fn fail(&self, entry: &mut DeadLetterEntry, err: &Error) -> Result<bool> {
        // Invalid documents fail the same way on every attempt
        if entry.is_last_attempt() || matches!(err, Error::Validation(_)) {
            self.dead_letters.mark_exhausted(&entry.content_id).await?;
            error!(
                content_id = %entry.content_id,
                source_name = %entry.source_name,
                attempts = entry.retry_count + 1,
                error = %err,
                "Dead-letter retries exhausted"
            );
            return Ok(true);
        }

        entry.record_failure(err.to_string(), Utc::now());
        self.dead_letters
            .update_retry_count(&entry.content_id, entry.retry_count, entry.next_retry_at)
            .await?;
        warn!(
            content_id = %entry.content_id,
            retry_count = entry.retry_count,
            next_retry_at = %entry.next_retry_at,
            error = %err,
            "Dead-letter retry failed"
        );
        Ok(false)
    }

    /// Delete exhausted entries past the retention window
    pub async fn cleanup_once(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(self.config.retention_days);
        let removed = self.dead_letters.cleanup_exhausted(cutoff).await?;
        if removed > 0 {
            info!(removed, retention_days = self.config.retention_days, "Cleaned up exhausted dead letters");
        }
        Ok(removed)
    }
}
