//! Rule and model traits shared by the hybrid domain classifiers

use async_trait::async_trait;
use lodestone_core::{Domain, HybridResult, Relevance, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Verdict of a local rule set
#[derive(Debug, Clone, PartialEq)]
pub struct RuleVerdict {
    pub relevance: Relevance,

    /// Confidence score (0.0-1.0)
    pub confidence: f64,

    /// Domain tags detected by the rules
    pub labels: Vec<String>,
}

impl RuleVerdict {
    pub fn new(relevance: Relevance, confidence: f64) -> Self {
        Self {
            relevance,
            confidence,
            labels: Vec::new(),
        }
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }
}

/// Cheap, local half of a hybrid classifier
pub trait DomainRules: Send + Sync {
    fn domain(&self) -> Domain;

    /// Evaluate the rule set against a title and body
    fn evaluate(&self, title: &str, body: &str) -> RuleVerdict;

    /// Key the model service uses for domain tags (e.g. `crime_types`)
    fn label_field(&self) -> &'static str {
        "labels"
    }

    /// Domain-specific post-processing after the decision matrix ran
    fn finalize(&self, _result: &mut HybridResult, _title: &str, _body: &str) {}
}

/// Response of a remote model service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVerdict {
    /// Domain label such as `core_mining`
    pub relevance: String,

    #[serde(alias = "relevance_confidence")]
    pub confidence: f64,

    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,

    /// Any further domain fields (stage, commodities, location, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ModelVerdict {
    pub fn new(relevance: impl Into<String>, confidence: f64) -> Self {
        Self {
            relevance: relevance.into(),
            confidence,
            labels: Vec::new(),
            model_version: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    /// Parsed relevance; unknown labels yield `None`
    pub fn relevance(&self) -> Option<Relevance> {
        Relevance::from_label(&self.relevance)
    }

    /// Tags from `labels`, or from the domain-specific field when `labels` is empty
    pub fn labels_for(&self, field: &str) -> Vec<String> {
        if !self.labels.is_empty() {
            return self.labels.clone();
        }
        match self.extra.get(field) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Remote model service for one domain
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Classify a title and (already truncated) body
    async fn classify(&self, title: &str, body: &str) -> Result<ModelVerdict>;

    /// Get the client name
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_verdict_accepts_relevance_confidence_alias() {
        let json = r#"{
            "relevance": "core_mining",
            "relevance_confidence": 0.93,
            "mining_stage": "exploration",
            "commodities": ["gold", "copper"],
            "model_version": "2025-02-01-mining-v1"
        }"#;

        let verdict: ModelVerdict = serde_json::from_str(json).unwrap();
        assert_eq!(verdict.relevance(), Some(Relevance::Core));
        assert_eq!(verdict.confidence, 0.93);
        assert_eq!(verdict.labels_for("commodities"), vec!["gold", "copper"]);
        assert_eq!(verdict.extra["mining_stage"], "exploration");
    }

    #[test]
    fn test_labels_take_precedence_over_domain_field() {
        let mut verdict = ModelVerdict::new("core_street_crime", 0.9)
            .with_labels(vec!["violent_crime".to_string()]);
        verdict
            .extra
            .insert("crime_types".to_string(), serde_json::json!(["drug_crime"]));

        assert_eq!(verdict.labels_for("crime_types"), vec!["violent_crime"]);
    }
}
