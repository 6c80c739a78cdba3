//! Classifier orchestrator
//!
//! Sequences the stages for one document:
//!
//! 1. content type and subtype
//! 2. quality score (spam is flagged, never dropped)
//! 3. topics from the rule cache
//! 4. source reputation read
//! 5. routed sidecars (hybrid domains run concurrently, location is local)
//! 6. source reputation update
//!
//! Stages 1-4 failing aborts the document; sidecar model failures and the
//! reputation update are absorbed and logged.

use crate::classifier::ModelClient;
use crate::config::ClassifierConfig;
use crate::content_type::ContentTypeClassifier;
use crate::domains::rules_for;
use crate::hybrid::{used_model, HybridClassifier};
use crate::location::LocationClassifier;
use crate::model_client::HttpModelClient;
use crate::quality::QualityScorer;
use crate::reputation::ReputationScorer;
use crate::routing::{Router, Sidecar};
use crate::topic::{RuleCache, TopicMatcher};
use chrono::Utc;
use futures::future::join_all;
use lodestone_core::{
    ClassificationHistory, ClassificationResult, ClassificationRule, ClassifiedContent, Domain,
    Error, HybridResults, RawContent, ReputationStore, Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Topic confidence used when no topic matched
const NO_TOPIC_CONFIDENCE: f64 = 0.3;

/// Everything produced for one classified document
#[derive(Debug, Clone)]
pub struct Classification {
    pub result: ClassificationResult,
    pub content: ClassifiedContent,
    pub history: ClassificationHistory,
}

/// Whether classifying a document feeds its quality sample into the source reputation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReputationUpdate {
    Apply,
    /// The document was already counted, e.g. a dead-letter retry
    Skip,
}

/// `(type_confidence + quality/100 + topic_confidence) / 3`
pub fn overall_confidence(type_confidence: f64, quality_score: u32, top_topic_score: Option<f64>) -> f64 {
    let topic = top_topic_score.unwrap_or(NO_TOPIC_CONFIDENCE);
    ((type_confidence + f64::from(quality_score) / 100.0 + topic) / 3.0).clamp(0.0, 1.0)
}

/// Builder for [`ClassifierOrchestrator`]
pub struct OrchestratorBuilder {
    config: ClassifierConfig,
    rules: Vec<ClassificationRule>,
    reputation_store: Option<Arc<dyn ReputationStore>>,
    models: HashMap<Domain, Arc<dyn ModelClient>>,
}

impl OrchestratorBuilder {
    /// Topic rules, loaded once; a rule change needs a new orchestrator
    pub fn rules(mut self, rules: Vec<ClassificationRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn reputation_store(mut self, store: Arc<dyn ReputationStore>) -> Self {
        self.reputation_store = Some(store);
        self
    }

    /// Use this client for a domain instead of the configured HTTP service
    pub fn model(mut self, domain: Domain, client: Arc<dyn ModelClient>) -> Self {
        self.models.insert(domain, client);
        self
    }

    pub fn build(mut self) -> Result<ClassifierOrchestrator> {
        let reputation_store = self
            .reputation_store
            .take()
            .ok_or_else(|| Error::config("orchestrator requires a reputation store"))?;

        let timeout = Duration::from_secs(self.config.model_timeout_secs);
        let mut hybrids = Vec::new();
        for domain in Domain::ALL {
            let domain_config = self.config.domains.get(domain);
            if !domain_config.enabled {
                continue;
            }

            let model: Option<Arc<dyn ModelClient>> = match self.models.remove(&domain) {
                Some(client) => Some(client),
                None if !domain_config.url.trim().is_empty() => {
                    Some(Arc::new(HttpModelClient::new(domain, &domain_config.url, timeout)?))
                }
                None => None,
            };

            info!(
                domain = %domain,
                model = model.as_ref().map(|m| m.name()).unwrap_or("none"),
                "Hybrid classifier enabled"
            );
            hybrids.push(Arc::new(HybridClassifier::new(rules_for(domain)?, model)));
        }

        let enabled: Vec<Domain> = hybrids.iter().map(|h| h.domain()).collect();
        let router = Router::new(&self.config.domains.routing, &enabled);
        let cache = Arc::new(RuleCache::new(self.rules)?);

        Ok(ClassifierOrchestrator {
            content_type: ContentTypeClassifier::new(),
            quality: QualityScorer::new(self.config.spam_threshold),
            topics: TopicMatcher::new(cache, self.config.max_topics),
            reputation: ReputationScorer::new(reputation_store, self.config.reputation.clone()),
            hybrids,
            location: LocationClassifier::new()?,
            router,
            config: self.config,
        })
    }
}

/// Runs every classification stage for a document
pub struct ClassifierOrchestrator {
    config: ClassifierConfig,
    content_type: ContentTypeClassifier,
    quality: QualityScorer,
    topics: TopicMatcher,
    reputation: ReputationScorer,
    hybrids: Vec<Arc<HybridClassifier>>,
    location: LocationClassifier,
    router: Router,
}

impl ClassifierOrchestrator {
    pub fn builder(config: ClassifierConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            rules: Vec::new(),
            reputation_store: None,
            models: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn rule_count(&self) -> usize {
        self.topics.cache().len()
    }

    /// Domains with an enabled hybrid classifier
    pub fn enabled_domains(&self) -> Vec<Domain> {
        self.hybrids.iter().map(|h| h.domain()).collect()
    }

    fn hybrid(&self, domain: Domain) -> Option<&Arc<HybridClassifier>> {
        self.hybrids.iter().find(|h| h.domain() == domain)
    }

    /// Classify one document and record it against its source reputation
    pub async fn classify(&self, raw: &RawContent) -> Result<Classification> {
        self.classify_with(raw, ReputationUpdate::Apply).await
    }

    pub async fn classify_with(
        &self,
        raw: &RawContent,
        reputation_update: ReputationUpdate,
    ) -> Result<Classification> {
        let start = Instant::now();
        raw.validate()?;

        let content_type = self.content_type.classify(raw);
        let quality = self.quality.score(raw);
        let topics = self.topics.classify(raw);
        let reputation = self.reputation.score(&raw.source_name).await?;

        let sidecars = self.router.sidecars(content_type.content_type, content_type.subtype);
        let hybrid_runs = sidecars.iter().filter_map(|sidecar| match sidecar {
            Sidecar::Hybrid(domain) => self.hybrid(*domain),
            Sidecar::Location => None,
        });
        let outcomes = join_all(hybrid_runs.map(|h| async move { (h.domain(), h.classify(raw).await) })).await;

        let mut hybrid = HybridResults::default();
        for (domain, outcome) in outcomes {
            hybrid.set(domain, outcome);
        }
        let location = sidecars
            .contains(&Sidecar::Location)
            .then(|| self.location.classify(raw));

        if reputation_update == ReputationUpdate::Skip {
            debug!(content_id = %raw.id, "Reputation already counted for document");
        } else if let Err(e) = self
            .reputation
            .update(&raw.source_name, quality.score, quality.is_spam)
            .await
        {
            warn!(
                content_id = %raw.id,
                source_name = %raw.source_name,
                error = %e,
                "Failed to update source reputation"
            );
        }

        let blocks: Vec<_> = hybrid.present().into_iter().filter_map(|d| hybrid.get(d)).collect();
        let classification_method = if used_model(&blocks) { "hybrid" } else { "rule_based" };
        let model_version = hybrid.model_version().map(str::to_string);

        let result = ClassificationResult {
            content_id: raw.id.clone(),
            content_type: content_type.content_type,
            content_subtype: content_type.subtype,
            type_confidence: content_type.confidence,
            type_method: content_type.method.to_string(),
            quality_score: quality.score,
            quality_factors: quality.factors,
            is_spam: quality.is_spam,
            confidence: overall_confidence(content_type.confidence, quality.score, topics.highest_score()),
            topics: topics.topics,
            topic_scores: topics.topic_scores,
            source_reputation: reputation,
            hybrid,
            location,
            classifier_version: self.config.version.clone(),
            classification_method: classification_method.to_string(),
            model_version,
            processing_time_ms: start.elapsed().as_millis() as u64,
            classified_at: Utc::now(),
        };

        debug!(
            content_id = %raw.id,
            content_type = result.content_type.as_str(),
            quality_score = result.quality_score,
            topics = ?result.topics,
            sidecars = sidecars.len(),
            processing_time_ms = result.processing_time_ms,
            "Document classified"
        );

        let history = ClassificationHistory::from_result(raw, &result);
        let content = ClassifiedContent::new(raw.clone(), &result);
        Ok(Classification {
            result,
            content,
            history,
        })
    }
}
