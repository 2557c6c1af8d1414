//! Beacon Proof Service
//!
//! REST API serving generalized-index Merkle proofs over beacon blocks.

mod abi;
mod api;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use gindex_proofs::{BeaconClient, Prover};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "proof-service")]
#[command(about = "REST API serving Merkle proofs of beacon block and state values")]
struct Args {
    /// Beacon node URL
    #[arg(long, env = "BEACON_URL", default_value = "http://localhost:5052")]
    beacon_url: String,

    /// API listen address
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Metrics listen address
    #[arg(long, env = "METRICS_LISTEN", default_value = "0.0.0.0:9090")]
    metrics_listen: SocketAddr,

    /// Timeout for each beacon node request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    request_timeout_secs: u64,

    /// Maximum number of finalized proofs kept in memory
    #[arg(long, env = "CACHE_CAPACITY", default_value_t = 4096)]
    cache_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    tracing::info!("Starting beacon proof service");
    tracing::info!(beacon_url = %args.beacon_url, "Beacon node");
    tracing::info!(listen = %args.listen, "API server");

    PrometheusBuilder::new()
        .with_http_listener(args.metrics_listen)
        .install()
        .context("Failed to install metrics exporter")?;
    tracing::info!(listen = %args.metrics_listen, "Metrics exporter");

    let client = BeaconClient::with_timeout(
        &args.beacon_url,
        Duration::from_secs(args.request_timeout_secs),
    )
    .context("Failed to build beacon client")?;
    let prover = Prover::connect(client)
        .await
        .context("Failed to load chain config from beacon node")?;

    // Initialize application state
    let app_state = state::AppState::new(prover, args.cache_capacity);

    // Start API server
    let api_handle = tokio::spawn(api::run_server(args.listen.clone(), app_state));

    // Wait for shutdown
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
        result = api_handle => {
            match result {
                Ok(Err(e)) => tracing::error!(error = %e, "API server error"),
                Err(e) => tracing::error!(error = %e, "API server task failed"),
                Ok(Ok(())) => {}
            }
        }
    }

    Ok(())
}
