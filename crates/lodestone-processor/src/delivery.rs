//! Delivery of classified documents
//!
//! Order per document: classified index, then outbox, then the raw
//! document's status. A document counts as delivered once the first two
//! succeed; a failed status update only means it will be picked up again.

use chrono::Utc;
use lodestone_core::types::log_url;
use lodestone_core::{
    ClassificationStatus, ClassifiedContent, DocumentStore, Error, OutboxEntry, OutboxStore,
    Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Writes classified documents to the sink and the outbox
#[derive(Clone)]
pub struct Deliverer {
    documents: Arc<dyn DocumentStore>,
    outbox: Arc<dyn OutboxStore>,
    classified_suffix: String,
}

impl Deliverer {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        outbox: Arc<dyn OutboxStore>,
        classified_suffix: impl Into<String>,
    ) -> Self {
        Self {
            documents,
            outbox,
            classified_suffix: classified_suffix.into(),
        }
    }

    pub fn classified_suffix(&self) -> &str {
        &self.classified_suffix
    }

    /// Deliver a single document
    pub async fn deliver(&self, content: &ClassifiedContent) -> Result<()> {
        self.documents.write_classified(content).await?;
        self.outbox
            .write(&OutboxEntry::from_classified(content, &self.classified_suffix))
            .await?;
        self.mark(content, ClassificationStatus::Classified).await;
        Ok(())
    }

    /// Deliver a batch, returning the error for each document that did not land.
    ///
    /// The sink is written in one bulk call, falling back to per-document
    /// writes when the bulk call fails. Outbox rows for the written documents
    /// go in one transaction, falling back to per-row inserts.
    pub async fn deliver_batch(&self, contents: &[ClassifiedContent]) -> HashMap<String, Error> {
        let mut failures = HashMap::new();
        if contents.is_empty() {
            return failures;
        }

        let written: Vec<&ClassifiedContent> =
            match self.documents.write_classified_batch(contents).await {
                Ok(()) => contents.iter().collect(),
                Err(e) => {
                    warn!(
                        count = contents.len(),
                        error = %e,
                        "Bulk write failed, falling back to individual writes"
                    );
                    let mut written = Vec::with_capacity(contents.len());
                    for content in contents {
                        match self.documents.write_classified(content).await {
                            Ok(()) => written.push(content),
                            Err(e) => {
                                failures.insert(content.id().to_string(), e);
                            }
                        }
                    }
                    written
                }
            };

        let entries: Vec<OutboxEntry> = written
            .iter()
            .map(|c| OutboxEntry::from_classified(c, &self.classified_suffix))
            .collect();
        if let Err(e) = self.outbox.write_batch(&entries).await {
            warn!(
                count = entries.len(),
                error = %e,
                "Outbox batch failed, falling back to individual inserts"
            );
            for entry in &entries {
                if let Err(e) = self.outbox.write(entry).await {
                    failures.insert(entry.content_id.clone(), e);
                }
            }
        }

        for content in written {
            if !failures.contains_key(content.id()) {
                self.mark(content, ClassificationStatus::Classified).await;
            }
        }

        debug!(
            total = contents.len(),
            failed = failures.len(),
            "Delivered classified batch"
        );
        failures
    }

    /// Best-effort status transition on the raw document
    pub async fn mark(&self, content: &ClassifiedContent, status: ClassificationStatus) {
        self.mark_raw(&content.raw.source_name, content.id(), &content.raw.url, status)
            .await;
    }

    pub async fn mark_raw(
        &self,
        source_name: &str,
        content_id: &str,
        url: &str,
        status: ClassificationStatus,
    ) {
        if let Err(e) = self
            .documents
            .update_status(source_name, content_id, status, Utc::now())
            .await
        {
            warn!(
                content_id,
                source_name,
                url = %log_url(url),
                status = %status,
                error = %e,
                "Failed to update document status"
            );
        }
    }
}
