//! Service configuration
//!
//! Loaded from a YAML file (missing file means defaults) layered with
//! `LODESTONE__SECTION__KEY` environment overrides.

use lodestone_classifiers::{ClassifierConfig, DomainsConfig, ReputationConfig};
use lodestone_core::dead_letter::MAX_RETRIES_LIMIT;
use lodestone_core::{Error, Result};
use lodestone_processor::{DeadLetterConfig, ProcessorConfig};
use lodestone_storage::{DatabaseConfig, ElasticsearchConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment prefix for overrides
pub const ENV_PREFIX: &str = "LODESTONE";

/// Full service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub reputation: ReputationConfig,

    #[serde(default)]
    pub dead_letter: DeadLetterConfig,

    #[serde(default)]
    pub classifiers: DomainsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_min_quality_score")]
    pub min_quality_score: u32,

    #[serde(default = "default_spam_threshold")]
    pub spam_threshold: u32,

    #[serde(default = "default_max_topics")]
    pub max_topics: usize,

    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval_secs(),
            min_quality_score: default_min_quality_score(),
            spam_threshold: default_spam_threshold(),
            max_topics: default_max_topics(),
            model_timeout_secs: default_model_timeout_secs(),
            version: default_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Admin HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
        }
    }
}

impl ServiceConfig {
    /// Load from `path` and the environment
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| Error::config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.service.batch_size == 0 {
            return Err(Error::config("service.batch_size must be greater than 0"));
        }
        if self.service.concurrency == 0 {
            return Err(Error::config("service.concurrency must be greater than 0"));
        }
        if self.service.max_topics == 0 {
            return Err(Error::config("service.max_topics must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.reputation.decay_rate) {
            return Err(Error::config("reputation.decay_rate must be between 0.0 and 1.0"));
        }
        if !(0..=100).contains(&self.reputation.default_score) {
            return Err(Error::config("reputation.default_score must be between 0 and 100"));
        }
        if !(1..=MAX_RETRIES_LIMIT).contains(&self.dead_letter.max_retries) {
            return Err(Error::config(format!(
                "dead_letter.max_retries must be between 1 and {MAX_RETRIES_LIMIT}"
            )));
        }
        Ok(())
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            concurrency: self.service.concurrency,
            batch_size: self.service.batch_size,
            poll_interval_secs: self.service.poll_interval_secs,
            min_quality_score: self.service.min_quality_score,
            classified_suffix: self.elasticsearch.classified_suffix.clone(),
        }
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            version: self.service.version.clone(),
            spam_threshold: self.service.spam_threshold,
            max_topics: self.service.max_topics,
            model_timeout_secs: self.service.model_timeout_secs,
            reputation: self.reputation.clone(),
            domains: self.classifiers.clone(),
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

fn default_spam_threshold() -> u32 {
    30
}

fn default_max_topics() -> usize {
    5
}

fn default_model_timeout_secs() -> u64 {
    5
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8071
}
