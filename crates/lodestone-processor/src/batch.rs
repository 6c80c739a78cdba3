//! Bounded-concurrency batch processor
//!
//! Fans a batch out to the orchestrator with at most `concurrency` documents
//! in flight and collects one [`DocumentOutcome`] per dispatched document.
//! A failing or panicking document never affects its siblings.

use futures::FutureExt;
use lodestone_classifiers::{Classification, ClassifierOrchestrator};
use lodestone_core::{Error, RawContent, Result};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Result of classifying one document
#[derive(Debug)]
pub struct DocumentOutcome {
    pub raw: RawContent,
    pub result: Result<Classification>,
}

impl DocumentOutcome {
    pub fn content_id(&self) -> &str {
        &self.raw.id
    }
}

/// Runs the orchestrator over a batch with a fixed worker budget
#[derive(Clone)]
pub struct BatchProcessor {
    orchestrator: Arc<ClassifierOrchestrator>,
    concurrency: usize,
}

impl BatchProcessor {
    pub fn new(orchestrator: Arc<ClassifierOrchestrator>, concurrency: usize) -> Self {
        Self {
            orchestrator,
            concurrency: concurrency.max(1),
        }
    }

    pub fn orchestrator(&self) -> &Arc<ClassifierOrchestrator> {
        &self.orchestrator
    }

    /// Classify every document, waiting for all dispatched work to finish.
    ///
    /// Once `cancel` fires no further documents are dispatched; those already
    /// running complete normally. Undispatched documents are left out of the
    /// returned outcomes and keep their current status in the store.
    pub async fn process(
        &self,
        documents: Vec<RawContent>,
        cancel: &CancellationToken,
    ) -> Vec<DocumentOutcome> {
        let total = documents.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();

        for raw in documents {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                break;
            };

            let orchestrator = self.orchestrator.clone();
            workers.spawn(async move {
                let _permit = permit;
                let result = AssertUnwindSafe(orchestrator.classify(&raw))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(panic_error(&raw.id, panic)));
                DocumentOutcome { raw, result }
            });
        }

        let dispatched = workers.len();
        if dispatched < total {
            warn!(total, dispatched, "Batch cancelled before all documents were dispatched");
        }

        let mut outcomes = Vec::with_capacity(dispatched);
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                // Panics are caught inside the task; only an aborted runtime lands here
                Err(e) => warn!(error = %e, "Classification worker did not complete"),
            }
        }

        debug!(
            dispatched,
            failed = outcomes.iter().filter(|o| o.result.is_err()).count(),
            "Batch processed"
        );
        outcomes
    }
}

fn panic_error(content_id: &str, panic: Box<dyn std::any::Any + Send>) -> Error {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    Error::classifier(format!("classification of {content_id} panicked: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestone_classifiers::ClassifierConfig;
    use lodestone_core::{ClassificationRule, ErrorCode};
    use lodestone_storage::memory::MemoryReputationStore;

    fn processor(concurrency: usize) -> BatchProcessor {
        let orchestrator = ClassifierOrchestrator::builder(ClassifierConfig::default())
            .rules(vec![ClassificationRule::new(
                "local_news",
                vec!["council".to_string()],
                50,
            )])
            .reputation_store(Arc::new(MemoryReputationStore::new()))
            .build()
            .unwrap();
        BatchProcessor::new(Arc::new(orchestrator), concurrency)
    }

    fn doc(id: &str) -> RawContent {
        let mut raw = RawContent::new(id, format!("https://example.com/news/{id}"), "example");
        raw.title = "Council meeting".to_string();
        raw.raw_text = "The council met on Tuesday to discuss the budget.".to_string();
        raw
    }

    #[tokio::test]
    async fn test_one_failure_does_not_halt_siblings() {
        let docs = vec![doc("a"), doc(""), doc("c"), doc("d")];
        let outcomes = processor(2).process(docs, &CancellationToken::new()).await;

        assert_eq!(outcomes.len(), 4);
        let failed: Vec<_> = outcomes.iter().filter(|o| o.result.is_err()).collect();
        assert_eq!(failed.len(), 1);
        assert!(matches!(failed[0].result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_cancelled_batch_dispatches_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcomes = processor(4).process(vec![doc("a"), doc("b")], &cancel).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let outcomes = processor(4).process(Vec::new(), &CancellationToken::new()).await;
        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_panic_maps_to_rule_panic_code() {
        let err = panic_error("a", Box::new("index out of bounds"));
        assert!(err.to_string().contains("index out of bounds"));
        assert_eq!(ErrorCode::classify(&err.to_string()), ErrorCode::RulePanic);
    }
}
