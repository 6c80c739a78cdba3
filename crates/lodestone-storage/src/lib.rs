//! Lodestone Storage
//!
//! Store implementations for the classification pipeline.
//!
//! Provides:
//! - Postgres repositories for rules, reputation, history, dead letters, and the outbox
//! - An Elasticsearch document store for raw and classified indexes
//! - Batch history recording with partial-failure tolerance
//! - In-memory stores for tests and database-free runs

pub mod elasticsearch;
pub mod history;
pub mod memory;
pub mod postgres;

pub use elasticsearch::{ElasticsearchConfig, ElasticsearchStore};
pub use history::{BatchOutcome, HistoryRecorder};
pub use postgres::{DatabaseConfig, PgStores};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::elasticsearch::{ElasticsearchConfig, ElasticsearchStore};
    pub use crate::history::HistoryRecorder;
    pub use crate::memory::{
        MemoryDeadLetterStore, MemoryDocumentStore, MemoryHistoryStore, MemoryOutboxStore,
        MemoryReputationStore, MemoryRuleStore,
    };
    pub use crate::postgres::{DatabaseConfig, PgStores};
}
