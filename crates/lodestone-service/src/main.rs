//! Lodestone
//!
//! Background service that classifies crawled documents and delivers the
//! enriched results with dead-letter retries and an outbox.

use anyhow::Result;
use clap::Parser;
use lodestone_service::{bootstrap, create_router, telemetry, ServiceConfig, Stores};
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "lodestone")]
#[command(about = "Lodestone content classification service", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "LODESTONE_CONFIG", default_value = "config.yaml")]
    config: String,

    /// Admin listen port (overrides server.port)
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    telemetry::init_tracing(cli.verbose, &config.logging);
    info!(config = %cli.config, "Starting Lodestone");

    let prometheus = telemetry::init_metrics()?;
    let stores = Stores::connect(&config).await?;
    let components = bootstrap::build(&config, stores, prometheus).await?;

    if cli.once {
        let report = components.poller.run_once().await?;
        info!(
            fetched = report.fetched,
            classified = report.classified,
            failed = report.failed,
            dead_lettered = report.dead_lettered,
            "Single poll cycle complete"
        );
        return Ok(());
    }

    let poller = components.poller.clone().spawn();
    let sweeper = components.sweeper.clone().map(|s| s.spawn());

    let addr: SocketAddr = format!("{}:{}", config.server.listen, config.server.port).parse()?;
    let app = create_router(components.state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Admin endpoints listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            warn!("Shutdown signal received, draining in-flight work...");
        })
        .await?;

    poller.stop().await;
    if let Some(sweeper) = sweeper {
        sweeper.stop().await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
