//! Store contracts consumed by the pipeline
//!
//! The relational store (rules, reputation, history, dead letters, outbox) and
//! the document store (raw and classified indexes) are external resources.
//! Implementations live in `lodestone-storage`.

use crate::dead_letter::{DeadLetterEntry, DeadLetterStats};
use crate::outbox::OutboxEntry;
use crate::types::{
    ClassificationHistory, ClassificationRule, ClassificationStatus, ClassifiedContent,
    RawContent, SourceReputation,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read access to topic rules
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Enabled rules, highest priority first, insertion order within a priority
    async fn list_enabled(&self) -> Result<Vec<ClassificationRule>>;
}

/// Per-source reputation rows
#[async_trait]
pub trait ReputationStore: Send + Sync {
    /// Fetch the row for `source_name`, creating it at `default_score` if absent
    async fn get_or_create(&self, source_name: &str, default_score: i32)
        -> Result<SourceReputation>;

    /// Persist an updated row (last writer wins)
    async fn save(&self, reputation: &SourceReputation) -> Result<()>;
}

/// Aggregate figures over the history table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total: i64,
    pub average_quality: f64,
    pub average_processing_ms: f64,
}

/// Write-once classification audit rows
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Insert a row, returning its id
    async fn create(&self, history: &ClassificationHistory) -> Result<i64>;

    /// Most recent row for a document
    async fn get_by_content_id(&self, content_id: &str) -> Result<Option<ClassificationHistory>>;

    async fn stats(&self) -> Result<HistoryStats>;
}

/// Raw and classified document indexes
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Up to `limit` documents with `status`, oldest crawl first
    async fn query_pending(
        &self,
        status: ClassificationStatus,
        limit: usize,
    ) -> Result<Vec<RawContent>>;

    /// Re-read a single raw document
    async fn get_raw(&self, source_name: &str, content_id: &str) -> Result<Option<RawContent>>;

    async fn write_classified(&self, content: &ClassifiedContent) -> Result<()>;

    /// Bulk write; an error means some or all documents may not have landed
    async fn write_classified_batch(&self, contents: &[ClassifiedContent]) -> Result<()>;

    async fn update_status(
        &self,
        source_name: &str,
        content_id: &str,
        status: ClassificationStatus,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Count of entries per grouping key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCount {
    pub key: String,
    pub count: i64,
}

/// Durable retry queue for failed deliveries
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Insert, or bump `retry_count` and re-derive backoff if the content id is already queued
    async fn enqueue(&self, entry: &DeadLetterEntry) -> Result<()>;

    /// Claim up to `limit` due entries; concurrent callers never receive the same entry
    async fn fetch_retryable(&self, limit: usize) -> Result<Vec<DeadLetterEntry>>;

    /// Delete after a successful retry. Errors if the entry does not exist.
    async fn remove(&self, content_id: &str) -> Result<()>;

    /// Freeze for inspection
    async fn mark_exhausted(&self, content_id: &str) -> Result<()>;

    async fn update_retry_count(
        &self,
        content_id: &str,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn get_by_content_id(&self, content_id: &str) -> Result<Option<DeadLetterEntry>>;

    async fn stats(&self) -> Result<DeadLetterStats>;

    /// Non-exhausted entries per source, largest first
    async fn count_by_source(&self) -> Result<Vec<GroupCount>>;

    /// Non-exhausted entries per error code, largest first
    async fn count_by_error_code(&self) -> Result<Vec<GroupCount>>;

    /// Delete exhausted entries last attempted before `older_than`, returning how many went
    async fn cleanup_exhausted(&self, older_than: DateTime<Utc>) -> Result<u64>;

    async fn count(&self) -> Result<i64>;
}

/// Idempotent staging table for downstream publishing
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Insert; a duplicate content id is a no-op
    async fn write(&self, entry: &OutboxEntry) -> Result<()>;

    /// Insert all rows in one transaction
    async fn write_batch(&self, entries: &[OutboxEntry]) -> Result<()>;
}
