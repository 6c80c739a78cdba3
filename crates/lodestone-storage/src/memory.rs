//! In-memory stores
//!
//! Used by tests across the workspace and by the service's wiring tests.
//! Each store can be told to fail so callers can exercise their error paths.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lodestone_core::dead_letter::next_retry_at;
use lodestone_core::{
    ClassificationHistory, ClassificationRule, ClassificationStatus, ClassifiedContent,
    DeadLetterEntry, DeadLetterStats, DeadLetterStore, DocumentStore, Error, GroupCount,
    HistoryStats, HistoryStore, OutboxEntry, OutboxStore, RawContent, ReputationStore, Result,
    RuleStore, SourceReputation,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// Matches the relational store's claim lease
const CLAIM_LEASE_SECS: i64 = 300;

/// Fixed rule set
#[derive(Default)]
pub struct MemoryRuleStore {
    rules: RwLock<Vec<ClassificationRule>>,
}

impl MemoryRuleStore {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    pub fn push(&self, rule: ClassificationRule) {
        self.rules.write().push(rule);
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn list_enabled(&self) -> Result<Vec<ClassificationRule>> {
        let mut rules: Vec<ClassificationRule> =
            self.rules.read().iter().filter(|r| r.enabled).cloned().collect();
        // Stable sort keeps insertion order within a priority
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(rules)
    }
}

#[derive(Default)]
pub struct MemoryReputationStore {
    rows: Mutex<HashMap<String, SourceReputation>>,
}

impl MemoryReputationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source_name: &str) -> Option<SourceReputation> {
        self.rows.lock().get(source_name).cloned()
    }
}

#[async_trait]
impl ReputationStore for MemoryReputationStore {
    async fn get_or_create(&self, source_name: &str, default_score: i32) -> Result<SourceReputation> {
        Ok(self
            .rows
            .lock()
            .entry(source_name.to_string())
            .or_insert_with(|| SourceReputation::new(source_name, default_score))
            .clone())
    }

    async fn save(&self, reputation: &SourceReputation) -> Result<()> {
        self.rows
            .lock()
            .insert(reputation.source_name.clone(), reputation.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    rows: Mutex<Vec<ClassificationHistory>>,
    failing_ids: Mutex<HashSet<String>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make inserts for `content_id` fail
    pub fn fail_for(&self, content_id: &str) {
        self.failing_ids.lock().insert(content_id.to_string());
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    pub fn rows(&self) -> Vec<ClassificationHistory> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn create(&self, history: &ClassificationHistory) -> Result<i64> {
        if self.failing_ids.lock().contains(&history.content_id) {
            return Err(Error::storage(format!(
                "insert rejected for {}",
                history.content_id
            )));
        }
        let mut rows = self.rows.lock();
        rows.push(history.clone());
        Ok(rows.len() as i64)
    }

    async fn get_by_content_id(&self, content_id: &str) -> Result<Option<ClassificationHistory>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|h| h.content_id == content_id)
            .max_by_key(|h| h.classified_at)
            .cloned())
    }

    async fn stats(&self) -> Result<HistoryStats> {
        let rows = self.rows.lock();
        if rows.is_empty() {
            return Ok(HistoryStats::default());
        }
        let n = rows.len() as f64;
        Ok(HistoryStats {
            total: rows.len() as i64,
            average_quality: rows.iter().map(|h| h.quality_score as f64).sum::<f64>() / n,
            average_processing_ms: rows.iter().map(|h| h.processing_time_ms as f64).sum::<f64>()
                / n,
        })
    }
}

/// Raw and classified documents keyed by content id
#[derive(Default)]
pub struct MemoryDocumentStore {
    raw: RwLock<Vec<RawContent>>,
    classified: RwLock<HashMap<String, ClassifiedContent>>,
    failing_writes: Mutex<HashSet<String>>,
    fail_bulk: AtomicBool,
    fail_queries: AtomicBool,
    fail_status_updates: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_raw(&self, doc: RawContent) {
        let mut raw = self.raw.write();
        raw.retain(|d| !(d.id == doc.id && d.source_name == doc.source_name));
        raw.push(doc);
    }

    /// Make single and bulk writes of `content_id` fail
    pub fn fail_writes_for(&self, content_id: &str) {
        self.failing_writes.lock().insert(content_id.to_string());
    }

    /// Make every bulk write fail outright
    pub fn set_fail_bulk(&self, fail: bool) {
        self.fail_bulk.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_status_updates(&self, fail: bool) {
        self.fail_status_updates.store(fail, Ordering::SeqCst);
    }

    pub fn status_of(&self, source_name: &str, content_id: &str) -> Option<ClassificationStatus> {
        self.raw
            .read()
            .iter()
            .find(|d| d.id == content_id && d.source_name == source_name)
            .map(|d| d.classification_status)
    }

    pub fn classified(&self, content_id: &str) -> Option<ClassifiedContent> {
        self.classified.read().get(content_id).cloned()
    }

    pub fn classified_count(&self) -> usize {
        self.classified.read().len()
    }

    fn check_write(&self, content_id: &str) -> Result<()> {
        if self.failing_writes.lock().contains(content_id) {
            return Err(Error::document(format!(
                "failed to index document {content_id}: index rejected"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn query_pending(
        &self,
        status: ClassificationStatus,
        limit: usize,
    ) -> Result<Vec<RawContent>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(Error::document("search failed: connection refused"));
        }
        let mut docs: Vec<RawContent> = self
            .raw
            .read()
            .iter()
            .filter(|d| d.classification_status == status)
            .cloned()
            .collect();
        docs.sort_by_key(|d| d.crawled_at);
        docs.truncate(limit);
        Ok(docs)
    }

    async fn get_raw(&self, source_name: &str, content_id: &str) -> Result<Option<RawContent>> {
        Ok(self
            .raw
            .read()
            .iter()
            .find(|d| d.id == content_id && d.source_name == source_name)
            .cloned())
    }

    async fn write_classified(&self, content: &ClassifiedContent) -> Result<()> {
        self.check_write(content.id())?;
        self.classified
            .write()
            .insert(content.id().to_string(), content.clone());
        Ok(())
    }

    async fn write_classified_batch(&self, contents: &[ClassifiedContent]) -> Result<()> {
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(Error::document("bulk request failed: unavailable"));
        }
        let mut failed = 0;
        for content in contents {
            if self.check_write(content.id()).is_err() {
                failed += 1;
                continue;
            }
            self.classified
                .write()
                .insert(content.id().to_string(), content.clone());
        }
        if failed > 0 {
            return Err(Error::document(format!(
                "bulk index failed for {failed} of {} documents",
                contents.len()
            )));
        }
        Ok(())
    }

    async fn update_status(
        &self,
        source_name: &str,
        content_id: &str,
        status: ClassificationStatus,
        _at: DateTime<Utc>,
    ) -> Result<()> {
        if self.fail_status_updates.load(Ordering::SeqCst) {
            return Err(Error::document("status update timed out"));
        }
        let mut raw = self.raw.write();
        let doc = raw
            .iter_mut()
            .find(|d| d.id == content_id && d.source_name == source_name)
            .ok_or_else(|| Error::document(format!("document {content_id} not found")))?;
        doc.classification_status = status;
        Ok(())
    }
}

/// Dead-letter queue with the same claim and upsert semantics as Postgres
#[derive(Default)]
pub struct MemoryDeadLetterStore {
    entries: Mutex<HashMap<String, DeadLetterEntry>>,
    next_id: AtomicI64,
    fail_enqueue: AtomicBool,
}

impl MemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    /// Place an entry as-is, bypassing upsert rules
    pub fn insert(&self, mut entry: DeadLetterEntry) {
        entry.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.entries.lock().insert(entry.content_id.clone(), entry);
    }

    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        let mut entries: Vec<DeadLetterEntry> = self.entries.lock().values().cloned().collect();
        entries.sort_by_key(|e| e.id);
        entries
    }

    fn group_by(&self, key: impl Fn(&DeadLetterEntry) -> String) -> Vec<GroupCount> {
        let mut counts: HashMap<String, i64> = HashMap::new();
        for entry in self.entries.lock().values().filter(|e| !e.is_exhausted()) {
            *counts.entry(key(entry)).or_default() += 1;
        }
        let mut groups: Vec<GroupCount> = counts
            .into_iter()
            .map(|(key, count)| GroupCount { key, count })
            .collect();
        groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        groups
    }
}

#[async_trait]
impl DeadLetterStore for MemoryDeadLetterStore {
    async fn enqueue(&self, entry: &DeadLetterEntry) -> Result<()> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(Error::storage("dead letter insert failed"));
        }
        let now = Utc::now();
        let mut entries = self.entries.lock();
        match entries.get_mut(&entry.content_id) {
            Some(existing) if existing.is_exhausted() => {}
            Some(existing) => {
                existing.next_retry_at = next_retry_at(now, existing.retry_count);
                existing.retry_count += 1;
                existing.error_message = entry.error_message.clone();
                existing.error_code = entry.error_code;
                existing.last_attempt_at = Some(now);
            }
            None => {
                let mut entry = entry.clone();
                entry.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                entries.insert(entry.content_id.clone(), entry);
            }
        }
        Ok(())
    }

    async fn fetch_retryable(&self, limit: usize) -> Result<Vec<DeadLetterEntry>> {
        let now = Utc::now();
        let mut entries = self.entries.lock();

        let mut due: Vec<&mut DeadLetterEntry> = entries
            .values_mut()
            .filter(|e| !e.is_exhausted() && e.next_retry_at <= now)
            .collect();
        due.sort_by_key(|e| e.next_retry_at);
        due.truncate(limit);

        let mut claimed: Vec<DeadLetterEntry> = due
            .into_iter()
            .map(|e| {
                e.next_retry_at = now + Duration::seconds(CLAIM_LEASE_SECS);
                e.clone()
            })
            .collect();
        claimed.sort_by_key(|e| e.created_at);
        Ok(claimed)
    }

    async fn remove(&self, content_id: &str) -> Result<()> {
        self.entries
            .lock()
            .remove(content_id)
            .map(|_| ())
            .ok_or_else(|| Error::storage(format!("dead letter entry not found: {content_id}")))
    }

    async fn mark_exhausted(&self, content_id: &str) -> Result<()> {
        if let Some(entry) = self.entries.lock().get_mut(content_id) {
            entry.mark_exhausted(Utc::now());
        }
        Ok(())
    }

    async fn update_retry_count(
        &self,
        content_id: &str,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(entry) = self.entries.lock().get_mut(content_id) {
            entry.retry_count = retry_count;
            entry.next_retry_at = next_retry_at;
            entry.last_attempt_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn get_by_content_id(&self, content_id: &str) -> Result<Option<DeadLetterEntry>> {
        Ok(self.entries.lock().get(content_id).cloned())
    }

    async fn stats(&self) -> Result<DeadLetterStats> {
        let now = Utc::now();
        let entries = self.entries.lock();
        let mut stats = DeadLetterStats::default();
        for entry in entries.values() {
            if entry.is_exhausted() {
                stats.exhausted += 1;
            } else {
                stats.pending += 1;
                if entry.next_retry_at <= now {
                    stats.ready += 1;
                }
            }
        }
        if !entries.is_empty() {
            stats.avg_retries = entries.values().map(|e| e.retry_count as f64).sum::<f64>()
                / entries.len() as f64;
        }
        stats.oldest_entry = entries.values().map(|e| e.created_at).min();
        Ok(stats)
    }

    async fn count_by_source(&self) -> Result<Vec<GroupCount>> {
        Ok(self.group_by(|e| e.source_name.clone()))
    }

    async fn count_by_error_code(&self) -> Result<Vec<GroupCount>> {
        Ok(self.group_by(|e| e.error_code.as_str().to_string()))
    }

    async fn cleanup_exhausted(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| {
            !(e.is_exhausted() && e.last_attempt_at.is_some_and(|at| at < older_than))
        });
        Ok((before - entries.len()) as u64)
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.entries.lock().len() as i64)
    }
}

#[derive(Default)]
pub struct MemoryOutboxStore {
    rows: Mutex<Vec<OutboxEntry>>,
    failing: AtomicBool,
}

impl MemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    pub fn rows(&self) -> Vec<OutboxEntry> {
        self.rows.lock().clone()
    }

    fn insert(rows: &mut Vec<OutboxEntry>, entry: &OutboxEntry) {
        if !rows.iter().any(|r| r.content_id == entry.content_id) {
            rows.push(entry.clone());
        }
    }
}

#[async_trait]
impl OutboxStore for MemoryOutboxStore {
    async fn write(&self, entry: &OutboxEntry) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::storage("outbox insert failed"));
        }
        Self::insert(&mut self.rows.lock(), entry);
        Ok(())
    }

    async fn write_batch(&self, entries: &[OutboxEntry]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::storage("outbox transaction failed"));
        }
        let mut rows = self.rows.lock();
        for entry in entries {
            Self::insert(&mut rows, entry);
        }
        Ok(())
    }
}
