//! # Generalized-Index Proof Library
//!
//! SSZ Merkle proofs addressed by generalized index over beacon block
//! headers and the states they commit to. Provides:
//! - gindex arithmetic and composition
//! - persistent copy-on-write proof trees with grafting
//! - single and multi-proof construction and verification
//! - path resolution against the Electra `BeaconState` schema
//! - a [`Prover`] that fetches data from a beacon node and stamps proofs
//!   with the time their root becomes available

pub mod beacon_client;
pub mod config;
pub mod gindex;
pub mod hash;
pub mod merkleize;
pub mod path;
pub mod proof;
pub mod prover;
pub mod schema;
pub mod source;
pub mod tree;
pub mod types;
pub mod verify;

pub use beacon_client::BeaconClient;
pub use config::ChainConfig;
pub use gindex::GeneralizedIndex;
pub use hash::Node;
pub use path::{PathError, PathSpec};
pub use proof::{build_multiproof, build_proof, Multiproof, ProofArtifact, ProofError, SingleProof};
pub use prover::{ProofRequest, Prover, ProverError};
pub use source::{BlockId, DataSource, HeaderInfo, InMemorySource};
pub use tree::{graft, Tree};
pub use verify::{verify_multiproof, verify_proof};
