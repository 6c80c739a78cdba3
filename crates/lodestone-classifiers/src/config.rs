//! Configuration for the classification pipeline

use lodestone_core::Domain;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for all classification stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Version string stamped on every result
    #[serde(default = "default_version")]
    pub version: String,

    /// Quality score below which a document is flagged spam
    #[serde(default = "default_spam_threshold")]
    pub spam_threshold: u32,

    /// Maximum number of topics per document
    #[serde(default = "default_max_topics")]
    pub max_topics: usize,

    /// Request timeout for model services
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    #[serde(default)]
    pub reputation: ReputationConfig,

    #[serde(default)]
    pub domains: DomainsConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            spam_threshold: default_spam_threshold(),
            max_topics: default_max_topics(),
            model_timeout_secs: default_model_timeout_secs(),
            reputation: ReputationConfig::default(),
            domains: DomainsConfig::default(),
        }
    }
}

/// Source reputation tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    /// Score for a source seen for the first time (0-100)
    #[serde(default = "default_reputation_score")]
    pub default_score: i32,

    /// Quality below which an article counts as spam for the source
    #[serde(default = "default_spam_threshold")]
    pub spam_threshold: u32,

    /// Articles before a source is considered established
    #[serde(default = "default_min_articles_for_trust")]
    pub min_articles_for_trust: i64,

    /// Weight kept by the previous score on each update (0.0-1.0)
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            default_score: default_reputation_score(),
            spam_threshold: default_spam_threshold(),
            min_articles_for_trust: default_min_articles_for_trust(),
            decay_rate: default_decay_rate(),
        }
    }
}

/// Enable flag and service URL of one hybrid classifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainClassifierConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the model service; empty runs the domain rules only
    #[serde(default)]
    pub url: String,
}

impl DomainClassifierConfig {
    pub fn enabled(url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            url: url.into(),
        }
    }
}

/// Hybrid classifiers and the content-type routing table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainsConfig {
    #[serde(default)]
    pub crime: DomainClassifierConfig,

    #[serde(default)]
    pub mining: DomainClassifierConfig,

    #[serde(default)]
    pub entertainment: DomainClassifierConfig,

    #[serde(default)]
    pub industry: DomainClassifierConfig,

    #[serde(default)]
    pub indigenous: DomainClassifierConfig,

    /// Route key (`type` or `type:subtype`) to sidecar names
    #[serde(default = "default_routing")]
    pub routing: BTreeMap<String, Vec<String>>,
}

impl Default for DomainsConfig {
    fn default() -> Self {
        Self {
            crime: DomainClassifierConfig::default(),
            mining: DomainClassifierConfig::default(),
            entertainment: DomainClassifierConfig::default(),
            industry: DomainClassifierConfig::default(),
            indigenous: DomainClassifierConfig::default(),
            routing: default_routing(),
        }
    }
}

impl DomainsConfig {
    pub fn get(&self, domain: Domain) -> &DomainClassifierConfig {
        match domain {
            Domain::Crime => &self.crime,
            Domain::Mining => &self.mining,
            Domain::Entertainment => &self.entertainment,
            Domain::Industry => &self.industry,
            Domain::Indigenous => &self.indigenous,
        }
    }

    pub fn get_mut(&mut self, domain: Domain) -> &mut DomainClassifierConfig {
        match domain {
            Domain::Crime => &mut self.crime,
            Domain::Mining => &mut self.mining,
            Domain::Entertainment => &mut self.entertainment,
            Domain::Industry => &mut self.industry,
            Domain::Indigenous => &mut self.indigenous,
        }
    }
}

/// Gating table: articles get every hybrid classifier plus location, events
/// only location, blotters only crime, reports nothing. Non-articles have no entry.
pub fn default_routing() -> BTreeMap<String, Vec<String>> {
    let mut all: Vec<String> = Domain::ALL.iter().map(|d| d.name().to_string()).collect();
    all.push("location".to_string());

    let mut routing = BTreeMap::new();
    routing.insert("article".to_string(), all.clone());
    routing.insert("article:press_release".to_string(), all);
    routing.insert("article:event".to_string(), vec!["location".to_string()]);
    routing.insert("article:blotter".to_string(), vec!["crime".to_string()]);
    routing.insert("article:report".to_string(), Vec::new());
    routing
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_spam_threshold() -> u32 {
    30
}

fn default_max_topics() -> usize {
    5
}

fn default_model_timeout_secs() -> u64 {
    5
}

fn default_reputation_score() -> i32 {
    50
}

fn default_min_articles_for_trust() -> i64 {
    10
}

fn default_decay_rate() -> f64 {
    0.1
}
