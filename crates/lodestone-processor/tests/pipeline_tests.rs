//! End-to-end cycles over the in-memory stores

use chrono::{Duration, Utc};
use lodestone_classifiers::{ClassifierConfig, ClassifierOrchestrator};
use lodestone_core::{
    ClassificationRule, ClassificationStatus, DeadLetterEntry, DeadLetterStore, DlqState,
    ErrorCode, HistoryStore, RawContent,
};
use lodestone_processor::{
    BatchProcessor, CycleReport, DeadLetterConfig, Deliverer, Poller, PollerState,
    ProcessorConfig, ProcessorMetrics, RetrySweeper,
};
use lodestone_storage::memory::{
    MemoryDeadLetterStore, MemoryDocumentStore, MemoryHistoryStore, MemoryOutboxStore,
    MemoryReputationStore,
};
use lodestone_storage::HistoryRecorder;
use std::sync::Arc;

const SOURCE: &str = "example_com";

struct Harness {
    documents: Arc<MemoryDocumentStore>,
    outbox: Arc<MemoryOutboxStore>,
    dead_letters: Arc<MemoryDeadLetterStore>,
    history: Arc<MemoryHistoryStore>,
    reputation: Arc<MemoryReputationStore>,
    metrics: ProcessorMetrics,
    poller: Arc<Poller>,
    sweeper: RetrySweeper,
}

fn harness() -> Harness {
    let documents = Arc::new(MemoryDocumentStore::new());
    let outbox = Arc::new(MemoryOutboxStore::new());
    let dead_letters = Arc::new(MemoryDeadLetterStore::new());
    let history = Arc::new(MemoryHistoryStore::new());
    let reputation = Arc::new(MemoryReputationStore::new());
    let metrics = ProcessorMetrics::new();

    let orchestrator = Arc::new(
        ClassifierOrchestrator::builder(ClassifierConfig::default())
            .rules(vec![
                ClassificationRule::new("crime", vec!["police".into(), "arrested".into()], 100),
                ClassificationRule::new("local_news", vec!["council".into()], 90),
            ])
            .reputation_store(reputation.clone())
            .build()
            .unwrap(),
    );

    let config = ProcessorConfig {
        concurrency: 4,
        batch_size: 10,
        poll_interval_secs: 1,
        ..Default::default()
    };
    let dead_letter_config = DeadLetterConfig::default();
    let deliverer = Deliverer::new(documents.clone(), outbox.clone(), config.classified_suffix.clone());
    let recorder = HistoryRecorder::new(history.clone());

    let poller = Arc::new(Poller::new(
        documents.clone(),
        dead_letters.clone(),
        BatchProcessor::new(orchestrator.clone(), config.concurrency),
        deliverer.clone(),
        recorder.clone(),
        metrics.clone(),
        config,
        &dead_letter_config,
    ));
    let sweeper = RetrySweeper::new(
        dead_letters.clone(),
        documents.clone(),
        orchestrator,
        deliverer,
        recorder,
        metrics.clone(),
        dead_letter_config,
    );

    Harness {
        documents,
        outbox,
        dead_letters,
        history,
        reputation,
        metrics,
        poller,
        sweeper,
    }
}

fn article(id: &str) -> RawContent {
    let mut raw = RawContent::new(id, format!("https://example.com/news/{id}"), SOURCE);
    raw.title = format!("Police arrest suspect after council meeting {id}");
    raw.raw_text = "Police arrested a man downtown on Tuesday. The council later discussed policing. "
        .repeat(20);
    raw.meta_description = Some("Arrest downtown".to_string());
    raw.author = Some("Staff".to_string());
    raw.published_date = Some(Utc::now());
    raw.og_type = Some("article".to_string());
    raw
}

impl Harness {
    fn seed(&self, ids: &[&str]) {
        for id in ids {
            self.documents.insert_raw(article(id));
        }
    }

    fn status(&self, id: &str) -> Option<ClassificationStatus> {
        self.documents.status_of(SOURCE, id)
    }
}

#[tokio::test]
async fn test_cycle_delivers_every_document() {
    let h = harness();
    h.seed(&["a", "b", "c"]);

    let report = h.poller.run_once().await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.classified, 3);
    assert_eq!(report.failed, 0);

    for id in ["a", "b", "c"] {
        assert_eq!(h.status(id), Some(ClassificationStatus::Classified));
        let content = h.documents.classified(id).unwrap();
        assert_eq!(content.topics, vec!["crime", "local_news"]);
        assert_eq!(content.body, content.raw.raw_text);
    }

    let rows = h.outbox.rows();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.index_name == "example_com_classified_content"));
    assert_eq!(h.history.len(), 3);
    assert_eq!(h.dead_letters.count().await.unwrap(), 0);

    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.batches, 1);
    assert_eq!(snapshot.processed, 3);
    assert_eq!(h.poller.state(), PollerState::Idle);
}

#[tokio::test]
async fn test_empty_cycle_does_nothing() {
    let h = harness();
    let report = h.poller.run_once().await.unwrap();
    assert_eq!(report, CycleReport::default());
    assert_eq!(h.metrics.snapshot().batches, 0);
}

#[tokio::test]
async fn test_second_cycle_skips_classified_documents() {
    let h = harness();
    h.seed(&["a"]);

    h.poller.run_once().await.unwrap();
    let report = h.poller.run_once().await.unwrap();
    assert_eq!(report.fetched, 0);
    assert_eq!(h.outbox.rows().len(), 1);
}

#[tokio::test]
async fn test_sink_failure_goes_to_dead_letter_queue() {
    let h = harness();
    h.seed(&["good", "bad"]);
    h.documents.fail_writes_for("bad");

    let report = h.poller.run_once().await.unwrap();
    assert_eq!(report.classified, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.dead_lettered, 1);

    assert_eq!(h.status("good"), Some(ClassificationStatus::Classified));
    assert_eq!(h.status("bad"), Some(ClassificationStatus::Failed));
    assert!(h.documents.classified("bad").is_none());

    let entry = h.dead_letters.get_by_content_id("bad").await.unwrap().unwrap();
    assert_eq!(entry.error_code, ErrorCode::IndexingFailed);
    assert_eq!(entry.index_name, "example_com_classified_content");
    assert_eq!(entry.retry_count, 0);

    // Outbox only holds the delivered document
    let rows = h.outbox.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].content_id, "good");
}

#[tokio::test]
async fn test_outbox_outage_dead_letters_the_batch() {
    let h = harness();
    h.seed(&["a", "b"]);
    h.outbox.set_failing(true);

    let report = h.poller.run_once().await.unwrap();
    assert_eq!(report.classified, 0);
    assert_eq!(report.dead_lettered, 2);
    assert_eq!(h.status("a"), Some(ClassificationStatus::Failed));
    assert_eq!(h.dead_letters.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_invalid_document_is_failed_without_retry() {
    let h = harness();
    let mut raw = article("orphan");
    raw.source_name = String::new();
    h.documents.insert_raw(raw);

    let report = h.poller.run_once().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.dead_lettered, 0);
    assert_eq!(h.dead_letters.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_history_failure_never_fails_the_cycle() {
    let h = harness();
    h.seed(&["a", "b"]);
    h.history.fail_for("a");
    h.history.fail_for("b");

    let report = h.poller.run_once().await.unwrap();
    assert_eq!(report.classified, 2);
    assert!(h.history.is_empty());
}

#[tokio::test]
async fn test_query_failure_surfaces_as_cycle_error() {
    let h = harness();
    h.documents.set_fail_queries(true);
    assert!(h.poller.run_once().await.is_err());
}

fn due_entry(id: &str) -> DeadLetterEntry {
    let mut entry =
        DeadLetterEntry::new(id, SOURCE, "example_com_classified_content", "bulk index failed")
            .unwrap();
    entry.next_retry_at = Utc::now() - Duration::seconds(1);
    entry
}

#[tokio::test]
async fn test_retry_sweep_delivers_and_removes() {
    let h = harness();
    h.seed(&["a"]);
    h.dead_letters.insert(due_entry("a"));

    let report = h.sweeper.retry_once().await.unwrap();
    assert_eq!(report.claimed, 1);
    assert_eq!(report.succeeded, 1);

    assert_eq!(h.dead_letters.count().await.unwrap(), 0);
    assert_eq!(h.status("a"), Some(ClassificationStatus::Classified));
    assert_eq!(h.outbox.rows().len(), 1);
    assert!(h.history.get_by_content_id("a").await.unwrap().is_some());
    assert_eq!(h.metrics.snapshot().retries_succeeded, 1);
}

#[tokio::test]
async fn test_retry_failure_advances_backoff() {
    let h = harness();
    h.seed(&["a"]);
    h.outbox.set_failing(true);
    h.dead_letters.insert(due_entry("a"));

    let before = Utc::now();
    let report = h.sweeper.retry_once().await.unwrap();
    assert_eq!(report.rescheduled, 1);

    let entry = h.dead_letters.get_by_content_id("a").await.unwrap().unwrap();
    assert_eq!(entry.retry_count, 1);
    assert!(entry.next_retry_at >= before + Duration::seconds(120));
    assert_eq!(entry.state(Utc::now()), DlqState::Waiting);
}

#[tokio::test]
async fn test_last_failed_retry_exhausts_entry() {
    let h = harness();
    let mut entry = due_entry("missing");
    entry.retry_count = entry.max_retries - 1;
    h.dead_letters.insert(entry);

    // The raw document is gone, so the retry fails
    let report = h.sweeper.retry_once().await.unwrap();
    assert_eq!(report.exhausted, 1);

    let entry = h.dead_letters.get_by_content_id("missing").await.unwrap().unwrap();
    assert!(entry.is_exhausted());
    assert_eq!(h.dead_letters.stats().await.unwrap().exhausted, 1);

    // Nothing left to claim
    assert_eq!(h.sweeper.retry_once().await.unwrap().claimed, 0);
}

#[tokio::test]
async fn test_retry_does_not_count_reputation_twice() {
    let h = harness();
    h.seed(&["a"]);
    h.outbox.set_failing(true);

    let report = h.poller.run_once().await.unwrap();
    assert_eq!(report.dead_lettered, 1);
    assert_eq!(h.reputation.get(SOURCE).unwrap().total_articles, 1);

    h.outbox.set_failing(false);
    let mut entry = h.dead_letters.get_by_content_id("a").await.unwrap().unwrap();
    entry.next_retry_at = Utc::now() - Duration::seconds(1);
    h.dead_letters.insert(entry);

    let report = h.sweeper.retry_once().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(h.status("a"), Some(ClassificationStatus::Classified));
    assert_eq!(h.reputation.get(SOURCE).unwrap().total_articles, 1);
}

#[tokio::test]
async fn test_invalid_document_on_retry_is_exhausted_immediately() {
    let h = harness();
    let mut raw = article("   ");
    raw.id = "   ".to_string();
    h.documents.insert_raw(raw);
    h.dead_letters.insert(due_entry("   "));

    let report = h.sweeper.retry_once().await.unwrap();
    assert_eq!(report.exhausted, 1);
    assert_eq!(report.rescheduled, 0);

    let entry = h.dead_letters.get_by_content_id("   ").await.unwrap().unwrap();
    assert!(entry.is_exhausted());
}

#[tokio::test]
async fn test_cleanup_keeps_recent_exhausted_entries() {
    let h = harness();
    let mut entry = due_entry("a");
    entry.mark_exhausted(Utc::now());
    h.dead_letters.insert(entry);

    let mut old = due_entry("b");
    old.mark_exhausted(Utc::now() - Duration::days(30));
    h.dead_letters.insert(old);

    assert_eq!(h.sweeper.cleanup_once().await.unwrap(), 1);
    assert!(h.dead_letters.get_by_content_id("a").await.unwrap().is_some());
    assert!(h.dead_letters.get_by_content_id("b").await.unwrap().is_none());
}

#[tokio::test]
async fn test_spawned_poller_stops_gracefully() {
    let h = harness();
    h.seed(&["a", "b"]);

    let handle = h.poller.clone().spawn();
    for _ in 0..50 {
        if h.status("b") == Some(ClassificationStatus::Classified) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    handle.stop().await;

    assert_eq!(h.status("a"), Some(ClassificationStatus::Classified));
    assert_eq!(h.status("b"), Some(ClassificationStatus::Classified));
    assert_eq!(h.poller.state(), PollerState::Idle);
}
