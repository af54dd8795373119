//! # Weather Station Aggregator
//!
//! Polls the fog vision worker and the sensor bridge on a fixed cadence and serves
//! one coherent view of them:
//! - `GET /api/status`: the latest snapshot of every source.
//! - `GET /api/history`: the rolling window of past snapshots, oldest first.
//! - `GET /health`: liveness.
//!
//! Readers never wait on the upstreams; a dead or slow source only shows up as an
//! `error` entry for that source in the next snapshot.

use anyhow::{Context, Result};
use lib_common::retrieve::HttpSourceClient;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

mod aggregator_logic;
use aggregator_logic::{config, downstream, logger, state};

#[tokio::main]
async fn main() -> Result<()> {
    // Variables from a local .env file feed the clap `env` fallbacks.
    dotenvy::dotenv().ok();

    let settings = config::load_config().context("invalid configuration")?;
    let _log_guard = logger::setup_logging(&settings.log_dir, &settings.log_level)?;

    match &settings.config_file {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No config file found. Using defaults and environment/CLI variables."),
    }
    for source in &settings.sources {
        info!(source = source.name(), url = %source.endpoint(), timeout_ms = source.timeout().as_millis() as u64, "Source configured");
    }

    let (shutdown_tx, _) = broadcast::channel(1);
    let app_state = state::AppState::new(settings.history_capacity);

    let client = HttpSourceClient::new().context("failed to build HTTP client")?;
    let poller = app_state.poller(client, settings.sources.clone(), settings.poll_interval);
    let poller_handle = tokio::spawn(poller.run(shutdown_tx.subscribe()));

    let mut downstream_handle = tokio::spawn(downstream::run(
        settings.listen_addr,
        app_state.clone(),
        shutdown_tx.subscribe(),
    ));

    let downstream_result = tokio::select! {
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            downstream_handle.await
        }
        result = &mut downstream_handle => {
            error!("Downstream server stopped unexpectedly.");
            let _ = shutdown_tx.send(());
            result
        }
    };

    poller_handle.await.context("poller task failed")?;
    downstream_result.context("downstream task failed")??;

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, initiating shutdown."),
        _ = terminate => info!("SIGTERM received, initiating shutdown."),
    }
}
