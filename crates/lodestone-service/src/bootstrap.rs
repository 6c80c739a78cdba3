//! Wiring of stores, orchestrator, and background loops

use crate::config::ServiceConfig;
use crate::routes::AppState;
use lodestone_classifiers::ClassifierOrchestrator;
use lodestone_core::{
    DeadLetterStore, DocumentStore, HistoryStore, OutboxStore, ReputationStore, Result, RuleStore,
};
use lodestone_processor::{BatchProcessor, Deliverer, Poller, ProcessorMetrics, RetrySweeper};
use lodestone_storage::memory::{
    MemoryDeadLetterStore, MemoryDocumentStore, MemoryHistoryStore, MemoryOutboxStore,
    MemoryReputationStore, MemoryRuleStore,
};
use lodestone_storage::{ElasticsearchStore, HistoryRecorder, PgStores};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::{info, warn};

/// Every store the pipeline talks to
#[derive(Clone)]
pub struct Stores {
    pub rules: Arc<dyn RuleStore>,
    pub reputation: Arc<dyn ReputationStore>,
    pub history: Arc<dyn HistoryStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub dead_letters: Arc<dyn DeadLetterStore>,
    pub outbox: Arc<dyn OutboxStore>,
}

impl Stores {
    /// Connect to Postgres and Elasticsearch
    pub async fn connect(config: &ServiceConfig) -> Result<Self> {
        let pg = PgStores::connect(&config.database).await?;
        pg.ping().await?;

        let documents = ElasticsearchStore::new(&config.elasticsearch)?;
        if let Err(e) = documents.ping().await {
            // Polling surfaces the error every cycle until the cluster is back
            warn!(url = %config.elasticsearch.url, error = %e, "Elasticsearch not reachable at startup");
        }

        Ok(Self {
            rules: Arc::new(pg.rules()),
            reputation: Arc::new(pg.reputation()),
            history: Arc::new(pg.history()),
            documents: Arc::new(documents),
            dead_letters: Arc::new(pg.dead_letters()),
            outbox: Arc::new(pg.outbox()),
        })
    }

    /// In-memory stores with no rules
    pub fn in_memory() -> Self {
        Self {
            rules: Arc::new(MemoryRuleStore::default()),
            reputation: Arc::new(MemoryReputationStore::new()),
            history: Arc::new(MemoryHistoryStore::new()),
            documents: Arc::new(MemoryDocumentStore::new()),
            dead_letters: Arc::new(MemoryDeadLetterStore::new()),
            outbox: Arc::new(MemoryOutboxStore::new()),
        }
    }
}

/// The assembled service
pub struct Components {
    pub poller: Arc<Poller>,
    /// Absent when the dead-letter queue is disabled
    pub sweeper: Option<Arc<RetrySweeper>>,
    pub state: AppState,
}

/// Build the pipeline over `stores`. Rules are read once here.
pub async fn build(
    config: &ServiceConfig,
    stores: Stores,
    prometheus: PrometheusHandle,
) -> Result<Components> {
    let rules = stores.rules.list_enabled().await?;
    let orchestrator = Arc::new(
        ClassifierOrchestrator::builder(config.classifier_config())
            .rules(rules)
            .reputation_store(stores.reputation.clone())
            .build()?,
    );
    info!(
        rules = orchestrator.rule_count(),
        domains = ?orchestrator.enabled_domains(),
        version = %config.service.version,
        "Classifier orchestrator ready"
    );

    let processor_config = config.processor_config();
    let metrics = ProcessorMetrics::new();
    let deliverer = Deliverer::new(
        stores.documents.clone(),
        stores.outbox.clone(),
        processor_config.classified_suffix.clone(),
    );
    let history = HistoryRecorder::new(stores.history.clone());

    let poller = Arc::new(Poller::new(
        stores.documents.clone(),
        stores.dead_letters.clone(),
        BatchProcessor::new(orchestrator.clone(), processor_config.concurrency),
        deliverer.clone(),
        history.clone(),
        metrics.clone(),
        processor_config,
        &config.dead_letter,
    ));

    let sweeper = config.dead_letter.enabled.then(|| {
        Arc::new(RetrySweeper::new(
            stores.dead_letters.clone(),
            stores.documents.clone(),
            orchestrator.clone(),
            deliverer,
            history,
            metrics.clone(),
            config.dead_letter.clone(),
        ))
    });
    if sweeper.is_none() {
        warn!("Dead-letter retries disabled");
    }

    let state = AppState {
        version: config.service.version.clone(),
        metrics,
        poller: poller.clone(),
        dead_letters: stores.dead_letters,
        history: stores.history,
        prometheus,
    };

    Ok(Components {
        poller,
        sweeper,
        state,
    })
}
