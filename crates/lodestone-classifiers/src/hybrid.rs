//! Hybrid domain classifier: local rules, optional model call, decision matrix

use crate::classifier::{DomainRules, ModelClient, ModelVerdict};
use crate::decision::decide;
use crate::domains::{allows_ml_upgrade, RULE_BODY_CHARS};
use lodestone_core::types::truncate_chars;
use lodestone_core::{Domain, HybridResult, RawContent};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// One domain's rule set plus its (optional) model service
pub struct HybridClassifier {
    rules: Arc<dyn DomainRules>,
    model: Option<Arc<dyn ModelClient>>,
    allow_upgrade: bool,
}

impl HybridClassifier {
    pub fn new(rules: Arc<dyn DomainRules>, model: Option<Arc<dyn ModelClient>>) -> Self {
        let allow_upgrade = allows_ml_upgrade(rules.domain());
        Self {
            rules,
            model,
            allow_upgrade,
        }
    }

    /// Override whether a peripheral rule verdict may be upgraded by the model
    pub fn with_ml_upgrade(mut self, allow: bool) -> Self {
        self.allow_upgrade = allow;
        self
    }

    pub fn domain(&self) -> Domain {
        self.rules.domain()
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Classify one document. Model failures fall back to the rule verdict.
    pub async fn classify(&self, raw: &RawContent) -> HybridResult {
        let domain = self.domain();
        let rule = self.rules.evaluate(&raw.title, &raw.raw_text);

        let body = truncate_chars(&raw.raw_text, RULE_BODY_CHARS);
        let verdict = match &self.model {
            Some(model) => self.call_model(model.as_ref(), raw, body).await,
            None => None,
        };
        let model = verdict
            .as_ref()
            .and_then(|v| v.relevance().map(|r| (r, v.confidence.clamp(0.0, 1.0))));

        let decision = decide((rule.relevance, rule.confidence), model, self.allow_upgrade);

        let mut labels = rule.labels.clone();
        let mut attributes = BTreeMap::new();
        let mut model_version = None;
        if let Some(verdict) = verdict {
            for label in verdict.labels_for(self.rules.label_field()) {
                if !labels.contains(&label) {
                    labels.push(label);
                }
            }
            model_version = verdict.model_version;
            attributes = verdict.extra;
            attributes.remove(self.rules.label_field());
        }
        attributes.insert(
            "source_text_used".to_string(),
            if body.is_empty() { "title" } else { "title+body_500" }.into(),
        );

        let mut result = HybridResult {
            relevance: decision.relevance,
            labels,
            final_confidence: decision.confidence,
            review_required: decision.review_required,
            decision_path: decision.path,
            rule_relevance: rule.relevance,
            rule_confidence: rule.confidence,
            ml_relevance: model.map(|(r, _)| r),
            ml_confidence: model.map(|(_, c)| c),
            model_version,
            sub_label: None,
            attributes,
        };
        self.rules.finalize(&mut result, &raw.title, &raw.raw_text);

        debug!(
            content_id = %raw.id,
            domain = %domain,
            relevance = ?result.relevance,
            confidence = result.final_confidence,
            decision_path = ?result.decision_path,
            review_required = result.review_required,
            "Hybrid classification complete"
        );
        result
    }

    async fn call_model(&self, model: &dyn ModelClient, raw: &RawContent, body: &str) -> Option<ModelVerdict> {
        let start = Instant::now();
        match model.classify(&raw.title, body).await {
            Ok(verdict) if verdict.relevance().is_some() => Some(verdict),
            Ok(verdict) => {
                warn!(
                    content_id = %raw.id,
                    model = model.name(),
                    relevance = %verdict.relevance,
                    "Model returned an unknown relevance label, using rules only"
                );
                None
            }
            Err(e) => {
                warn!(
                    content_id = %raw.id,
                    model = model.name(),
                    error = %e,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Model classification failed, using rules only"
                );
                None
            }
        }
    }
}

/// Whether any block in a set of results came from a model
pub fn used_model(results: &[&HybridResult]) -> bool {
    results.iter().any(|r| r.ml_relevance.is_some())
}
