//! Merkle proof construction.
//!
//! A [`SingleProof`] carries the witnesses for one node, ordered from the
//! sibling of the leaf up to the child of the root. A [`Multiproof`] proves
//! several nodes of the same tree with a shared set of helper nodes.
//! [`ProofArtifact`] is the JSON form handed to consumers.

use crate::gindex::{check_independent, helper_indices, GeneralizedIndex};
use crate::hash::{to_hex, Node};
use crate::tree::Tree;
use crate::verify::{compute_root, verify_multiproof, verify_proof};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from gindex arithmetic, tree navigation, and proof verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("Invalid generalized index {0}")]
    InvalidGIndex(u64),

    #[error("Generalized index overflow: {outer} concatenated with {inner} is deeper than 63")]
    GIndexOverflow { outer: u64, inner: u64 },

    #[error("Proof has more witnesses than the depth of gindex {0}")]
    ExtraWitness(u64),

    #[error("Proof for gindex {0} ran out of witnesses before reaching the root")]
    MissingWitness(u64),

    #[error("Root mismatch: expected {}, computed {}", to_hex(.expected), to_hex(.computed))]
    RootMismatch { expected: Node, computed: Node },

    #[error("Cannot graft at gindex {0}: no such node in the outer tree")]
    InvalidGraftTarget(u64),

    #[error("No node at gindex {0}")]
    NodeNotFound(u64),

    #[error("Element {index} is past the end of a sequence of length {length}")]
    ElementOutOfRange { index: u64, length: u64 },

    #[error("{count} leaves do not fit in a tree of depth {depth}")]
    TooManyLeaves { count: usize, depth: u32 },

    #[error("Multiproof targets overlap: gindex {ancestor} is an ancestor of {descendant}")]
    OverlappingTargets { ancestor: u64, descendant: u64 },

    #[error("Multiproof expects {expected} {what}, got {actual}")]
    MultiproofMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Merkleization failed: {0}")]
    Merkleization(String),
}

/// Proof of a single node against the root of its tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleProof {
    pub gindex: GeneralizedIndex,
    pub leaf: Node,
    /// Sibling hashes, deepest first.
    pub witnesses: Vec<Node>,
}

impl SingleProof {
    /// Root implied by the leaf and witnesses.
    ///
    /// # Errors
    /// Fails if the witness count does not match the gindex depth.
    pub fn root(&self) -> Result<Node, ProofError> {
        compute_root(self.gindex, &self.witnesses, &self.leaf)
    }

    /// # Errors
    /// See [`verify_proof`].
    pub fn verify(&self, root: &Node) -> Result<(), ProofError> {
        verify_proof(root, self.gindex, &self.witnesses, &self.leaf)
    }
}

/// Build the proof for the node at `target`.
///
/// # Errors
/// Returns `NodeNotFound` if `target` or one of its siblings is not part of
/// the tree.
pub fn build_proof(tree: &Tree, target: GeneralizedIndex) -> Result<SingleProof, ProofError> {
    let leaf = tree.get(target)?;
    let witnesses = target
        .branch_indices()
        .into_iter()
        .map(|sibling| tree.get(sibling))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SingleProof {
        gindex: target,
        leaf,
        witnesses,
    })
}

/// Proof of several nodes of one tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multiproof {
    pub indices: Vec<GeneralizedIndex>,
    /// One leaf per entry of `indices`, same order.
    pub leaves: Vec<Node>,
    /// Helper nodes in [`helper_indices`] order.
    pub helpers: Vec<Node>,
}

impl Multiproof {
    /// # Errors
    /// See [`verify_multiproof`].
    pub fn verify(&self, root: &Node) -> Result<(), ProofError> {
        verify_multiproof(root, &self.indices, &self.leaves, &self.helpers)
    }
}

/// Build a multiproof for `targets`.
///
/// # Errors
/// Returns `OverlappingTargets` if one target is an ancestor or duplicate of
/// another, `NodeNotFound` if a target or helper node is not part of the tree.
pub fn build_multiproof(
    tree: &Tree,
    targets: &[GeneralizedIndex],
) -> Result<Multiproof, ProofError> {
    check_independent(targets)?;
    let leaves = targets
        .iter()
        .map(|&g| tree.get(g))
        .collect::<Result<Vec<_>, _>>()?;
    let helpers = helper_indices(targets)
        .into_iter()
        .map(|g| tree.get(g))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Multiproof {
        indices: targets.to_vec(),
        leaves,
        helpers,
    })
}

/// A verified proof together with the context a consumer needs to check it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofArtifact {
    /// Path the proof was requested for, e.g. `state_root/slot`.
    pub path: String,
    /// Slot of the committing block.
    pub slot: u64,
    /// Unix time at which the committing block root becomes available to
    /// consumers (the timestamp of its child block).
    pub timestamp: u64,
    /// Root of the committing block header.
    #[serde(with = "hex_bytes32")]
    pub root_hash: Node,
    #[serde(rename = "targetGIndex")]
    pub target_gindex: GeneralizedIndex,
    #[serde(with = "hex_bytes32")]
    pub leaf: Node,
    /// Decoded leaf, e.g. a decimal string for integers.
    pub leaf_value: serde_json::Value,
    #[serde(with = "proof_vec_serde")]
    pub witnesses: Vec<Node>,
}

impl ProofArtifact {
    /// Re-check the artifact against its own root.
    ///
    /// # Errors
    /// See [`verify_proof`].
    pub fn verify(&self) -> Result<(), ProofError> {
        verify_proof(&self.root_hash, self.target_gindex, &self.witnesses, &self.leaf)
    }
}

// Hex encoding helpers for serde
mod hex_bytes32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&crate::hash::to_hex(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        crate::hash::parse_hex32(&s).map_err(serde::de::Error::custom)
    }
}

/// Custom serde for Vec<[u8; 32]> as hex strings
mod proof_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S>(data: &Vec<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex_strings: Vec<String> = data.iter().map(crate::hash::to_hex).collect();
        hex_strings.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_strings: Vec<String> = Vec::deserialize(deserializer)?;
        hex_strings
            .iter()
            .map(|s| crate::hash::parse_hex32(s).map_err(serde::de::Error::custom))
            .collect()
    }
}
