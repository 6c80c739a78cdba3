//! Processor and dead-letter settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Polling loop and worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Documents classified concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pending documents fetched per cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Quality score below which a document is counted as low quality
    #[serde(default = "default_min_quality_score")]
    pub min_quality_score: u32,

    /// Suffix of the classified index, used for outbox rows and DLQ targets
    #[serde(default = "default_classified_suffix")]
    pub classified_suffix: String,
}

impl ProcessorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval_secs(),
            min_quality_score: default_min_quality_score(),
            classified_suffix: default_classified_suffix(),
        }
    }
}

/// Retry and cleanup sweep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_retries")]
    pub max_retries: i32,

    /// Period of the retry sweep
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,

    /// Entries claimed per retry sweep
    #[serde(default = "default_retry_batch_size")]
    pub retry_batch_size: usize,

    /// Exhausted entries older than this are deleted
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl DeadLetterConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs.max(1))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

impl Default for DeadLetterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: default_max_retries(),
            retry_interval_secs: default_retry_interval_secs(),
            retry_batch_size: default_retry_batch_size(),
            retention_days: default_retention_days(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

fn default_concurrency() -> usize {
    10
}

fn default_batch_size() -> usize {
    100
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_min_quality_score() -> u32 {
    50
}

fn default_classified_suffix() -> String {
    "_classified_content".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> i32 {
    lodestone_core::dead_letter::DEFAULT_MAX_RETRIES
}

fn default_retry_interval_secs() -> u64 {
    60
}

fn default_retry_batch_size() -> usize {
    50
}

fn default_retention_days() -> i64 {
    7
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config: DeadLetterConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.enabled);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retention_days, 7);

        let config: ProcessorConfig = serde_yaml::from_str("batch_size: 25").unwrap();
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.classified_suffix, "_classified_content");
    }
}
