//! txcourier - reliable EVM transaction submission and receipt tracking
//!
//! Submits signed transactions to a remote node over JSON-RPC, retries
//! nonce races, polls for receipts with a bounded escalation policy, and
//! classifies terminal outcomes for callers of the HTTP API.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod api;
mod config;
mod error;
mod metrics;
mod rpc;
mod tx;

use config::Settings;
use metrics::MetricsServer;
use rpc::NodeClient;
use tx::Courier;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting txcourier v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for chain {} ({} RPC endpoints)",
        settings.node.chain_id,
        settings.node.rpc_urls.len()
    );

    // Connect to the node
    let node = Arc::new(NodeClient::new(&settings.node.rpc_urls)?);
    info!("Node client initialized");

    // Build the courier (loads the signing key)
    let courier = Arc::new(Courier::new(node.clone(), &settings)?);

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Start API server
    let api_handle = tokio::spawn({
        let api_config = settings.api.clone();
        let courier = courier.clone();
        let node = node.clone();
        async move {
            if let Err(e) = api::run_server(api_config, courier, node).await {
                error!("API server error: {}", e);
            }
        }
    });

    info!("txcourier is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    api_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("txcourier stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,txcourier=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
