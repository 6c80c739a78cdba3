//! Classification history recording
//!
//! History rows are an audit trail. A batch where only some inserts fail is
//! still a success for the caller; only a batch where every insert fails is
//! reported as an error.

use lodestone_core::types::log_url;
use lodestone_core::{ClassificationHistory, Error, HistoryStore, Result};
use std::sync::Arc;
use tracing::{error, warn};

/// Writes history rows through a [`HistoryStore`]
#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
}

/// Outcome of a batch insert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed_ids: Vec<String>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Insert a single row
    pub async fn record(&self, history: &ClassificationHistory) -> Result<i64> {
        self.store.create(history).await
    }

    /// Insert every row, tolerating partial failure
    pub async fn record_batch(&self, rows: &[ClassificationHistory]) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        if rows.is_empty() {
            return Ok(outcome);
        }

        for row in rows {
            match self.store.create(row).await {
                Ok(_) => outcome.succeeded += 1,
                Err(e) => {
                    error!(
                        content_id = %row.content_id,
                        url = %log_url(&row.content_url),
                        error = %e,
                        "Failed to record classification history"
                    );
                    outcome.failed_ids.push(row.content_id.clone());
                }
            }
        }

        if outcome.succeeded == 0 {
            error!(count = rows.len(), "All classification history inserts failed");
            return Err(Error::storage(format!(
                "all {} classification history inserts failed",
                rows.len()
            )));
        }

        if !outcome.failed_ids.is_empty() {
            warn!(
                total = rows.len(),
                success = outcome.succeeded,
                failed = outcome.failed_ids.len(),
                failed_ids = ?outcome.failed_ids,
                "Partial failure recording classification history"
            );
        }

        Ok(outcome)
    }
}
