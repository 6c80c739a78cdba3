//! Processor metrics
//!
//! Counters are kept in-process for the stats endpoint and mirrored to the
//! `metrics` facade for the Prometheus exporter.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DOCUMENTS_CLASSIFIED: &str = "lodestone_documents_classified_total";
pub const DOCUMENTS_FAILED: &str = "lodestone_documents_failed_total";
pub const DOCUMENTS_LOW_QUALITY: &str = "lodestone_documents_low_quality_total";
pub const DEAD_LETTER_ENQUEUED: &str = "lodestone_dead_letter_enqueued_total";
pub const DEAD_LETTER_RETRIES: &str = "lodestone_dead_letter_retries_total";
pub const BATCH_LATENCY_MS: &str = "lodestone_batch_latency_ms";

/// Register descriptions with the installed recorder
pub fn describe() {
    metrics::describe_counter!(DOCUMENTS_CLASSIFIED, "Documents classified and delivered");
    metrics::describe_counter!(DOCUMENTS_FAILED, "Documents that failed classification or delivery");
    metrics::describe_counter!(
        DOCUMENTS_LOW_QUALITY,
        "Documents scored below the minimum quality score"
    );
    metrics::describe_counter!(DEAD_LETTER_ENQUEUED, "Documents sent to the dead-letter queue");
    metrics::describe_counter!(DEAD_LETTER_RETRIES, "Dead-letter retry attempts by outcome");
    metrics::describe_histogram!(BATCH_LATENCY_MS, "Wall time of one poll cycle");
}

/// Collector shared by the poller, retry sweep, and stats endpoint
#[derive(Clone, Default)]
pub struct ProcessorMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    batches: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    low_quality: AtomicU64,
    dead_lettered: AtomicU64,
    retries_succeeded: AtomicU64,
    retries_failed: AtomicU64,
    total_batch_latency_ms: AtomicU64,
}

impl ProcessorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed poll cycle
    pub fn record_batch(&self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        self.inner.batches.fetch_add(1, Ordering::Relaxed);
        self.inner.total_batch_latency_ms.fetch_add(ms, Ordering::Relaxed);
        metrics::histogram!(BATCH_LATENCY_MS).record(ms as f64);
    }

    pub fn record_classified(&self, count: u64) {
        self.inner.processed.fetch_add(count, Ordering::Relaxed);
        metrics::counter!(DOCUMENTS_CLASSIFIED).increment(count);
    }

    pub fn record_failed(&self, count: u64) {
        self.inner.failed.fetch_add(count, Ordering::Relaxed);
        metrics::counter!(DOCUMENTS_FAILED).increment(count);
    }

    pub fn record_low_quality(&self, count: u64) {
        self.inner.low_quality.fetch_add(count, Ordering::Relaxed);
        metrics::counter!(DOCUMENTS_LOW_QUALITY).increment(count);
    }

    pub fn record_dead_lettered(&self) {
        self.inner.dead_lettered.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(DEAD_LETTER_ENQUEUED).increment(1);
    }

    pub fn record_retry(&self, succeeded: bool) {
        let (counter, outcome) = if succeeded {
            (&self.inner.retries_succeeded, "success")
        } else {
            (&self.inner.retries_failed, "failure")
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(DEAD_LETTER_RETRIES, "outcome" => outcome).increment(1);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> ProcessorSnapshot {
        let batches = self.inner.batches.load(Ordering::Relaxed);
        let total_latency = self.inner.total_batch_latency_ms.load(Ordering::Relaxed);
        ProcessorSnapshot {
            batches,
            processed: self.inner.processed.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            low_quality: self.inner.low_quality.load(Ordering::Relaxed),
            dead_lettered: self.inner.dead_lettered.load(Ordering::Relaxed),
            retries_succeeded: self.inner.retries_succeeded.load(Ordering::Relaxed),
            retries_failed: self.inner.retries_failed.load(Ordering::Relaxed),
            average_batch_latency_ms: if batches > 0 {
                total_latency as f64 / batches as f64
            } else {
                0.0
            },
        }
    }
}

/// Point-in-time copy of the processor counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessorSnapshot {
    pub batches: u64,
    pub processed: u64,
    pub failed: u64,
    pub low_quality: u64,
    pub dead_lettered: u64,
    pub retries_succeeded: u64,
    pub retries_failed: u64,
    pub average_batch_latency_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_averages_batch_latency() {
        let metrics = ProcessorMetrics::new();
        assert_eq!(metrics.snapshot(), ProcessorSnapshot::default());

        metrics.record_batch(Duration::from_millis(100));
        metrics.record_batch(Duration::from_millis(300));
        metrics.record_classified(7);
        metrics.record_failed(2);
        metrics.record_retry(true);
        metrics.record_retry(false);
        metrics.record_retry(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.batches, 2);
        assert_eq!(snapshot.average_batch_latency_ms, 200.0);
        assert_eq!(snapshot.processed, 7);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.retries_succeeded, 1);
        assert_eq!(snapshot.retries_failed, 2);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = ProcessorMetrics::new();
        let clone = metrics.clone();
        clone.record_dead_lettered();
        assert_eq!(metrics.snapshot().dead_lettered, 1);
    }
}
