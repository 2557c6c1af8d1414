//! Test Vector Generator
//!
//! Builds a synthetic chain in memory, proves a set of header and state
//! paths against it and writes valid and deliberately broken proofs as JSON
//! for verifier tests in other languages.

use anyhow::{Context, Result};
use clap::Parser;
use gindex_proofs::hash::to_hex;
use gindex_proofs::types::{preset, BeaconBlockHeader, BeaconState, PendingConsolidation, Validator};
use gindex_proofs::{
    verify_proof, BlockId, ChainConfig, GeneralizedIndex, InMemorySource, PathSpec, ProofArtifact,
    Prover,
};
use serde::Serialize;
use ssz_rs::prelude::Vector;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const GENESIS_TIME: u64 = 1_606_824_023;
const SECONDS_PER_SLOT: u64 = 12;
const BLOCK_SLOT: u64 = 1000;

#[derive(Parser, Debug)]
#[command(name = "generate-test-vectors")]
#[command(about = "Generate generalized-index proof test vectors")]
struct Args {
    /// Output directory for test vectors
    #[arg(short, long, default_value = "test-vectors")]
    output: PathBuf,

    /// Number of test validators to generate
    #[arg(long, default_value = "10")]
    num_validators: usize,
}

/// Test vector file format
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TestVectorFile {
    /// Preset used (minimal or gnosis)
    preset: &'static str,
    genesis_time: u64,
    seconds_per_slot: u64,
    /// Block root every proof is checked against
    block_root: String,
    /// Proofs that must verify
    valid: Vec<ProofArtifact>,
    /// Proofs that must be rejected
    invalid: Vec<InvalidVector>,
}

/// A broken proof for negative testing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvalidVector {
    description: String,
    #[serde(flatten)]
    proof: ProofArtifact,
    expected_error: String,
}

fn validator(i: usize) -> Result<Validator> {
    let byte = u8::try_from(i % 256)?;
    let mut validator = Validator::default();
    validator.pubkey = Vector::try_from(vec![byte; 48])
        .map_err(|_| anyhow::anyhow!("Invalid pubkey length"))?;
    validator.withdrawal_credentials[0] = 0x01;
    validator.withdrawal_credentials[12..32].fill(byte);
    validator.effective_balance = 32_000_000_000;
    validator.activation_eligibility_epoch = i as u64;
    validator.activation_epoch = 10 + i as u64;
    validator.exit_epoch = u64::MAX;
    validator.withdrawable_epoch = u64::MAX;
    Ok(validator)
}

fn build_state(num_validators: usize) -> Result<BeaconState> {
    let mut state = BeaconState::default();
    state.genesis_time = GENESIS_TIME;
    state.slot = BLOCK_SLOT;
    for i in 0..num_validators {
        state.validators.push(validator(i)?);
        state.balances.push(32_000_000_000 + i as u64);
        state.current_epoch_participation.push(0b111);
    }
    if num_validators >= 2 {
        state.pending_consolidations.push(PendingConsolidation {
            source_index: 1,
            target_index: 0,
        });
    }
    state.earliest_exit_epoch = 64;
    Ok(state)
}

/// Header at `BLOCK_SLOT` committing to `state`, plus a child block.
fn build_chain(state: BeaconState) -> Result<InMemorySource> {
    let mut source = InMemorySource::new(GENESIS_TIME, SECONDS_PER_SLOT);
    let state_root = source.insert_state(state)?;
    let block_root = source.insert_block(BeaconBlockHeader {
        slot: BLOCK_SLOT,
        proposer_index: 7,
        parent_root: [0x11; 32],
        state_root,
        body_root: [0x22; 32],
    })?;
    source.insert_block(BeaconBlockHeader {
        slot: BLOCK_SLOT + 1,
        proposer_index: 8,
        parent_root: block_root,
        state_root: [0x33; 32],
        body_root: [0x44; 32],
    })?;
    Ok(source)
}

fn paths(num_validators: usize) -> Result<Vec<PathSpec>> {
    let mut paths = vec![
        "slot".to_string(),
        "proposer_index".to_string(),
        "state_root".to_string(),
        "state_root/slot".to_string(),
        "state_root/earliest_exit_epoch".to_string(),
        "state_root/validators/__len__".to_string(),
    ];
    let indices: BTreeSet<usize> = [0, num_validators / 2, num_validators.saturating_sub(1)]
        .into_iter()
        .filter(|i| *i < num_validators)
        .collect();
    for i in indices {
        paths.push(format!("state_root/validators/{i}/withdrawal_credentials"));
        paths.push(format!("state_root/validators/{i}/activation_epoch"));
        paths.push(format!("state_root/balances/{i}"));
        paths.push(format!("state_root/current_epoch_participation/{i}"));
    }
    if num_validators >= 2 {
        paths.push("state_root/pending_consolidations/0/source_index".to_string());
    }
    paths
        .iter()
        .map(|p| p.parse().with_context(|| format!("Invalid path {p}")))
        .collect()
}

/// Describe why `proof` fails to verify.
fn rejection(proof: &ProofArtifact) -> Result<String> {
    match verify_proof(&proof.root_hash, proof.target_gindex, &proof.witnesses, &proof.leaf) {
        Ok(()) => anyhow::bail!("Broken proof for {} still verifies", proof.path),
        Err(e) => Ok(e.to_string()),
    }
}

fn invalid_vectors(valid: &[ProofArtifact]) -> Result<Vec<InvalidVector>> {
    let mut out = Vec::new();
    let Some(base) = valid.iter().find(|p| p.witnesses.len() > 1) else {
        return Ok(out);
    };

    let mut mutations: Vec<(&str, ProofArtifact)> = Vec::new();

    let mut tampered = base.clone();
    tampered.witnesses[0][0] ^= 0xff;
    mutations.push(("first witness tampered", tampered));

    let mut leaf = base.clone();
    leaf.leaf[31] ^= 0x01;
    mutations.push(("leaf tampered", leaf));

    let mut swapped = base.clone();
    swapped.witnesses.swap(0, 1);
    mutations.push(("witnesses swapped", swapped));

    let mut extra = base.clone();
    extra.witnesses.push([0u8; 32]);
    mutations.push(("extra witness appended", extra));

    let mut missing = base.clone();
    missing.witnesses.pop();
    mutations.push(("last witness dropped", missing));

    let mut sibling = base.clone();
    sibling.target_gindex = base.target_gindex.sibling()?;
    mutations.push(("gindex of the sibling", sibling));

    let mut deeper = base.clone();
    deeper.target_gindex = GeneralizedIndex::new(base.target_gindex.get() * 2)?;
    mutations.push(("gindex one level too deep", deeper));

    for (description, proof) in mutations {
        out.push(InvalidVector {
            description: description.to_string(),
            expected_error: rejection(&proof)?,
            proof,
        });
    }
    Ok(out)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    tracing::info!(
        output = %args.output.display(),
        validators = args.num_validators,
        preset = preset::NAME,
        "Generating test vectors"
    );

    // Ensure output directory exists
    std::fs::create_dir_all(&args.output)?;

    let source = build_chain(build_state(args.num_validators)?)?;
    let prover = Prover::new(source, ChainConfig::new(GENESIS_TIME, SECONDS_PER_SLOT));
    let valid = prover
        .prove_all(&BlockId::Slot(BLOCK_SLOT), &paths(args.num_validators)?)
        .await
        .context("Failed to prove synthetic chain")?;
    let invalid = invalid_vectors(&valid)?;
    let block_root = valid
        .first()
        .map(|p| to_hex(&p.root_hash))
        .context("No proofs generated")?;

    tracing::info!(valid = valid.len(), invalid = invalid.len(), %block_root, "Built vectors");

    let file = TestVectorFile {
        preset: preset::NAME,
        genesis_time: GENESIS_TIME,
        seconds_per_slot: SECONDS_PER_SLOT,
        block_root,
        valid,
        invalid,
    };

    let output_path = args.output.join("test_vectors.json");
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(&output_path, json)?;

    tracing::info!(path = %output_path.display(), "Wrote test vectors");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_vectors_verify_and_fail_as_described() {
        let source = build_chain(build_state(5).unwrap()).unwrap();
        let prover = Prover::new(source, ChainConfig::new(GENESIS_TIME, SECONDS_PER_SLOT));
        let valid = prover
            .prove_all(&BlockId::Slot(BLOCK_SLOT), &paths(5).unwrap())
            .await
            .unwrap();

        for proof in &valid {
            proof.verify().unwrap();
            assert_eq!(proof.timestamp, GENESIS_TIME + (BLOCK_SLOT + 1) * SECONDS_PER_SLOT);
        }

        let invalid = invalid_vectors(&valid).unwrap();
        assert_eq!(invalid.len(), 7);
        for vector in &invalid {
            assert!(vector.proof.verify().is_err(), "{}", vector.description);
        }
        assert!(invalid[3].expected_error.contains("more witnesses"));
    }

    #[test]
    fn test_paths_without_validators() {
        let paths = paths(0).unwrap();
        assert_eq!(paths.len(), 6);
    }
}
