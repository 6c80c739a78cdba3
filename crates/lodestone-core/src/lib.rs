//! Lodestone Core
//!
//! Core types, traits, and utilities shared across Lodestone components.
//!
//! This crate provides:
//! - Raw and classified document types, history rows, and reputation records
//! - Hybrid domain verdicts (relevance, decision path, per-domain blocks)
//! - Error types and result handling
//! - The dead-letter retry state machine and backoff schedule
//! - Store contracts for the relational and document stores

pub mod dead_letter;
pub mod error;
pub mod hybrid;
pub mod outbox;
pub mod store;
pub mod types;

pub use dead_letter::{DeadLetterEntry, DeadLetterStats, DlqState, ErrorCode};
pub use error::{Error, Result};
pub use hybrid::{
    DecisionPath, Domain, HybridResult, HybridResults, LocationResult, Relevance, Specificity,
};
pub use outbox::OutboxEntry;
pub use store::{
    DeadLetterStore, DocumentStore, GroupCount, HistoryStats, HistoryStore, OutboxStore,
    ReputationStore, RuleStore,
};
pub use types::{
    ClassificationHistory, ClassificationResult, ClassificationRule, ClassificationStatus,
    ClassifiedContent, ContentSubtype, ContentType, FactorScore, QualityFactors, RawContent,
    ReputationRank, ReputationSnapshot, SourceReputation,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::hybrid::{Domain, HybridResult, HybridResults, Relevance};
    pub use crate::store::{
        DeadLetterStore, DocumentStore, HistoryStore, OutboxStore, ReputationStore, RuleStore,
    };
    pub use crate::types::{
        ClassificationHistory, ClassificationResult, ClassificationStatus, ClassifiedContent,
        RawContent,
    };
}
