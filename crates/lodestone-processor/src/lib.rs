//! Lodestone Processor
//!
//! The long-running side of the pipeline.
//!
//! Provides:
//! - [`BatchProcessor`]: bounded-concurrency classification of one batch
//! - [`Poller`]: the periodic fetch, classify, deliver loop
//! - [`RetrySweeper`]: dead-letter retries and exhausted-entry cleanup
//! - [`ProcessorMetrics`]: counters for the stats endpoint and Prometheus

pub mod batch;
pub mod config;
pub mod delivery;
pub mod metrics;
pub mod poller;
pub mod retry;

pub use batch::{BatchProcessor, DocumentOutcome};
pub use config::{DeadLetterConfig, ProcessorConfig};
pub use delivery::Deliverer;
pub use metrics::{ProcessorMetrics, ProcessorSnapshot};
pub use poller::{CycleReport, Poller, PollerState};
pub use retry::{RetryReport, RetrySweeper};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Running background loops sharing one shutdown signal
pub struct TaskHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn new(token: CancellationToken, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { token, tasks }
    }

    /// Signal shutdown and wait for in-flight work to finish
    pub async fn stop(self) {
        self.token.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|t| t.is_finished())
    }
}
