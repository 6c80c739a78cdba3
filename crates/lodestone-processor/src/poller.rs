//! Polling loop
//!
//! Idle until the next tick, then draining one batch: fetch pending
//! documents oldest first, classify them, deliver the results, route failures
//! to the dead-letter queue, and record history. Batches never overlap.

use crate::batch::{BatchProcessor, DocumentOutcome};
use crate::config::{DeadLetterConfig, ProcessorConfig};
use crate::delivery::Deliverer;
use crate::metrics::ProcessorMetrics;
use crate::TaskHandle;
use lodestone_classifiers::Classification;
use lodestone_core::outbox::classified_index;
use lodestone_core::types::log_url;
use lodestone_core::{
    ClassificationStatus, DeadLetterEntry, DeadLetterStore, DocumentStore, Error, RawContent,
    Result,
};
use lodestone_storage::HistoryRecorder;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Where the poller is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollerState {
    Idle,
    Draining,
}

/// Counts for one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub fetched: usize,
    pub classified: usize,
    pub failed: usize,
    pub dead_lettered: usize,
    pub low_quality: usize,
}

/// Discovers pending documents and drives them through the pipeline
pub struct Poller {
    documents: Arc<dyn DocumentStore>,
    dead_letters: Arc<dyn DeadLetterStore>,
    batch: BatchProcessor,
    deliverer: Deliverer,
    history: HistoryRecorder,
    metrics: ProcessorMetrics,
    config: ProcessorConfig,
    max_retries: i32,
    draining: AtomicBool,
}

impl Poller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        dead_letters: Arc<dyn DeadLetterStore>,
        batch: BatchProcessor,
        deliverer: Deliverer,
        history: HistoryRecorder,
        metrics: ProcessorMetrics,
        config: ProcessorConfig,
        dead_letter_config: &DeadLetterConfig,
    ) -> Self {
        Self {
            documents,
            dead_letters,
            batch,
            deliverer,
            history,
            metrics,
            config,
            max_retries: dead_letter_config.max_retries,
            draining: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> PollerState {
        if self.draining.load(Ordering::SeqCst) {
            PollerState::Draining
        } else {
            PollerState::Idle
        }
    }

    /// Start the loop. Stopping the handle lets an in-flight batch finish.
    pub fn spawn(self: Arc<Self>) -> TaskHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(self.run(token.clone()));
        TaskHandle::new(token, vec![task])
    }

    /// Tick until `shutdown` fires; a batch in progress is always completed
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            batch_size = self.config.batch_size,
            concurrency = self.config.concurrency,
            poll_interval_secs = self.config.poll_interval_secs,
            "Poller started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.run_once().await {
                error!(error = %e, "Poll cycle failed");
            }
        }

        info!("Poller stopped");
    }

    /// Run a single cycle
    pub async fn run_once(&self) -> Result<CycleReport> {
        let documents = self
            .documents
            .query_pending(ClassificationStatus::Pending, self.config.batch_size)
            .await?;
        if documents.is_empty() {
            debug!("No pending documents");
            return Ok(CycleReport::default());
        }

        self.draining.store(true, Ordering::SeqCst);
        let started = Instant::now();
        let report = self.drain(documents).await;
        self.draining.store(false, Ordering::SeqCst);

        let elapsed = started.elapsed();
        self.metrics.record_batch(elapsed);
        info!(
            fetched = report.fetched,
            classified = report.classified,
            failed = report.failed,
            dead_lettered = report.dead_lettered,
            elapsed_ms = elapsed.as_millis() as u64,
            "Poll cycle complete"
        );
        Ok(report)
    }

    async fn drain(&self, documents: Vec<RawContent>) -> CycleReport {
        let mut report = CycleReport {
            fetched: documents.len(),
            ..Default::default()
        };

        // Batch-scoped token: a poller stop lets the whole batch finish
        let outcomes = self.batch.process(documents, &CancellationToken::new()).await;

        let mut classified: Vec<Classification> = Vec::with_capacity(outcomes.len());
        for DocumentOutcome { raw, result } in outcomes {
            match result {
                Ok(classification) => classified.push(classification),
                Err(e) => {
                    report.failed += 1;
                    if self.fail_document(&raw, &e).await {
                        report.dead_lettered += 1;
                    }
                }
            }
        }

        let contents: Vec<_> = classified.iter().map(|c| c.content.clone()).collect();
        let failures = self.deliverer.deliver_batch(&contents).await;
        for classification in &classified {
            let raw = &classification.content.raw;
            match failures.get(raw.id.as_str()) {
                Some(e) => {
                    report.failed += 1;
                    if self.fail_document(raw, e).await {
                        report.dead_lettered += 1;
                    }
                }
                None => {
                    report.classified += 1;
                    if classification.result.quality_score < self.config.min_quality_score {
                        report.low_quality += 1;
                    }
                }
            }
        }

        self.metrics.record_classified(report.classified as u64);
        self.metrics.record_failed(report.failed as u64);
        self.metrics.record_low_quality(report.low_quality as u64);

        let history: Vec<_> = classified.iter().map(|c| c.history.clone()).collect();
        if let Err(e) = self.history.record_batch(&history).await {
            warn!(count = history.len(), error = %e, "Failed to record classification history");
        }

        report
    }

    /// Route a failed document to the DLQ and mark it failed. Returns whether it was queued.
    async fn fail_document(&self, raw: &RawContent, err: &Error) -> bool {
        let queued = if matches!(err, Error::Validation(_)) {
            warn!(
                content_id = %raw.id,
                url = %log_url(&raw.url),
                error = %err,
                "Document rejected"
            );
            false
        } else {
            self.enqueue(raw, err).await
        };

        if !raw.id.is_empty() && !raw.source_name.is_empty() {
            self.deliverer
                .mark_raw(&raw.source_name, &raw.id, &raw.url, ClassificationStatus::Failed)
                .await;
        }
        queued
    }

    async fn enqueue(&self, raw: &RawContent, err: &Error) -> bool {
        let index = classified_index(&raw.source_name, self.deliverer.classified_suffix());
        let entry = match DeadLetterEntry::new(&raw.id, &raw.source_name, index, err.to_string()) {
            Ok(entry) => entry.with_max_retries(self.max_retries),
            Err(e) => {
                error!(content_id = %raw.id, error = %e, "Cannot dead-letter document");
                return false;
            }
        };

        match self.dead_letters.enqueue(&entry).await {
            Ok(()) => {
                self.metrics.record_dead_lettered();
                warn!(
                    content_id = %raw.id,
                    source_name = %raw.source_name,
                    url = %log_url(&raw.url),
                    error_code = %entry.error_code,
                    error = %err,
                    "Document sent to dead-letter queue"
                );
                true
            }
            Err(e) => {
                error!(
                    content_id = %raw.id,
                    error = %e,
                    original_error = %err,
                    "Failed to enqueue dead letter"
                );
                false
            }
        }
    }
}
