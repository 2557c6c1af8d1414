//! Fetch And Prove
//!
//! Fetches a block and its state from a live beacon node, proves the
//! requested paths and writes the artifacts as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use gindex_proofs::hash::to_hex;
use gindex_proofs::{BeaconClient, BlockId, PathSpec, Prover};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "fetch-and-prove")]
#[command(about = "Prove beacon block and state values against a live beacon node")]
struct Args {
    /// Beacon node URL
    #[arg(long, env = "BEACON_URL", default_value = "http://localhost:5052")]
    beacon_url: String,

    /// Block to prove against: head, finalized, justified, genesis, a slot or a block root
    #[arg(long, default_value = "finalized")]
    block_id: BlockId,

    /// Path to prove, relative to the block header (repeatable)
    #[arg(long = "path", required = true)]
    paths: Vec<PathSpec>,

    /// Output file for the proof artifacts
    #[arg(short, long, default_value = "proofs.json")]
    output: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    beacon_node: String,
    block_id: String,
    proofs: Vec<gindex_proofs::ProofArtifact>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::info!(beacon_url = %args.beacon_url, block_id = %args.block_id, "Fetching beacon data");

    let client = BeaconClient::new(args.beacon_url.clone());
    let prover = Prover::connect(client)
        .await
        .context("Failed to load chain config from beacon node")?;
    tracing::info!(
        genesis_time = prover.config().genesis_time,
        seconds_per_slot = prover.config().seconds_per_slot,
        "Chain config"
    );

    let proofs = prover
        .prove_all(&args.block_id, &args.paths)
        .await
        .with_context(|| format!("Failed to prove paths in block {}", args.block_id))?;

    for proof in &proofs {
        tracing::info!(
            path = %proof.path,
            slot = proof.slot,
            timestamp = proof.timestamp,
            block_root = %to_hex(&proof.root_hash),
            gindex = %proof.target_gindex,
            witnesses = proof.witnesses.len(),
            value = %proof.leaf_value,
            "Proved"
        );
    }

    let snapshot = Snapshot {
        beacon_node: args.beacon_url,
        block_id: args.block_id.to_string(),
        proofs,
    };
    std::fs::write(&args.output, serde_json::to_string_pretty(&snapshot)?)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!(path = %args.output.display(), "Saved proofs");

    Ok(())
}
