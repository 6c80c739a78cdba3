//! Tracing and metrics initialization

use crate::config::{LogFormat, LoggingConfig};
use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for the workspace crates at `level`
fn directive(level: &str) -> String {
    format!("lodestone={level}")
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(verbose: bool, logging: &LoggingConfig) {
    let filter = if verbose {
        EnvFilter::new(directive("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(&logging.level)))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Install the Prometheus recorder and return handle for rendering
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    lodestone_processor::metrics::describe();

    info!("Metrics exporter initialized");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_targets_workspace_crates() {
        assert_eq!(directive("debug"), "lodestone=debug");
        assert!(EnvFilter::try_new(directive("warn")).is_ok());
    }
}
