//! Lodestone Classifiers
//!
//! The classification stages applied to every crawled document.
//!
//! Stages run in order, each with a small budget:
//! - Content type and subtype from URL, Open Graph and structural signals
//! - Quality score from four 25-point factors
//! - Topics from an immutable keyword rule cache
//! - Source reputation with decayed updates
//! - Routed sidecars: five hybrid (rule + model service) domain classifiers
//!   and a rule-only location detector
//!
//! The [`ClassifierOrchestrator`] sequences the stages for one document.

pub mod classifier;
pub mod config;
pub mod content_type;
pub mod decision;
pub mod domains;
pub mod hybrid;
pub mod location;
pub mod model_client;
pub mod orchestrator;
pub mod quality;
pub mod reputation;
pub mod routing;
pub mod topic;

pub use classifier::{DomainRules, ModelClient, ModelVerdict, RuleVerdict};
pub use config::{ClassifierConfig, DomainClassifierConfig, DomainsConfig, ReputationConfig};
pub use content_type::{ContentTypeClassifier, ContentTypeResult};
pub use decision::{decide, Decision};
pub use hybrid::HybridClassifier;
pub use location::LocationClassifier;
pub use model_client::HttpModelClient;
pub use orchestrator::{Classification, ClassifierOrchestrator, OrchestratorBuilder, ReputationUpdate};
pub use quality::{QualityResult, QualityScorer};
pub use reputation::ReputationScorer;
pub use routing::{Router, Sidecar};
pub use topic::{RuleCache, TopicMatcher, TopicResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{ModelClient, ModelVerdict};
    pub use crate::config::ClassifierConfig;
    pub use crate::orchestrator::{Classification, ClassifierOrchestrator};
    pub use crate::topic::RuleCache;
}
