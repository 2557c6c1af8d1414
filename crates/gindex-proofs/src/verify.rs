//! Merkle proof verification.
//!
//! Verification is a pure walk from the leaf to the root. Witnesses are
//! consumed in the order given, deepest first, and are never reordered.

use crate::gindex::{check_independent, helper_indices, GeneralizedIndex};
use crate::hash::{hash_pair, Node};
use crate::proof::ProofError;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Root implied by `leaf` sitting at `index` with the given witnesses.
///
/// # Errors
/// - `ExtraWitness` if witnesses remain once the walk has reached the root.
/// - `MissingWitness` if the witnesses run out before the root.
pub fn compute_root(
    index: GeneralizedIndex,
    witnesses: &[Node],
    leaf: &Node,
) -> Result<Node, ProofError> {
    let mut buf = *leaf;
    let mut idx = index.get();
    for (step, witness) in witnesses.iter().enumerate() {
        if idx == 1 {
            return Err(ProofError::ExtraWitness(index.get()));
        }
        buf = if idx & 1 == 0 {
            hash_pair(&buf, witness)
        } else {
            hash_pair(witness, &buf)
        };
        idx >>= 1;
        trace!(step, gindex = idx, node = %hex::encode(buf), "proof step");
    }
    if idx != 1 {
        return Err(ProofError::MissingWitness(index.get()));
    }
    Ok(buf)
}

/// Check that `leaf` at `index` is committed to by `root`.
///
/// # Errors
/// `ExtraWitness` / `MissingWitness` for a witness count that does not match
/// the depth of `index`, `RootMismatch` if the computed root differs.
pub fn verify_proof(
    root: &Node,
    index: GeneralizedIndex,
    witnesses: &[Node],
    leaf: &Node,
) -> Result<(), ProofError> {
    let computed = compute_root(index, witnesses, leaf)?;
    if computed != *root {
        return Err(ProofError::RootMismatch {
            expected: *root,
            computed,
        });
    }
    debug!(gindex = %index, witnesses = witnesses.len(), "proof verified");
    Ok(())
}

/// Root implied by several leaves and the helper nodes of a multiproof.
///
/// `helpers` must be ordered as [`helper_indices`] returns them.
///
/// # Errors
/// `OverlappingTargets` if one index is an ancestor or duplicate of another,
/// `MultiproofMismatch` for inconsistent input lengths, `MissingWitness` if
/// the nodes given do not reach the root.
pub fn compute_multiproof_root(
    indices: &[GeneralizedIndex],
    leaves: &[Node],
    helpers: &[Node],
) -> Result<Node, ProofError> {
    check_independent(indices)?;
    if indices.len() != leaves.len() {
        return Err(ProofError::MultiproofMismatch {
            what: "leaves",
            expected: indices.len(),
            actual: leaves.len(),
        });
    }
    let helper_gindices = helper_indices(indices);
    if helper_gindices.len() != helpers.len() {
        return Err(ProofError::MultiproofMismatch {
            what: "helpers",
            expected: helper_gindices.len(),
            actual: helpers.len(),
        });
    }

    let mut nodes: HashMap<u64, Node> = indices
        .iter()
        .zip(leaves)
        .chain(helper_gindices.iter().zip(helpers))
        .map(|(g, node)| (g.get(), *node))
        .collect();
    let mut keys: Vec<u64> = nodes.keys().copied().collect();
    keys.sort_unstable_by(|a, b| b.cmp(a));

    let mut pos = 0;
    while pos < keys.len() {
        let k = keys[pos];
        if k > 1 && !nodes.contains_key(&(k >> 1)) {
            let left = nodes.get(&(k & !1)).copied();
            let right = nodes.get(&(k | 1)).copied();
            if let (Some(left), Some(right)) = (left, right) {
                nodes.insert(k >> 1, hash_pair(&left, &right));
                keys.push(k >> 1);
            }
        }
        pos += 1;
    }

    nodes
        .get(&1)
        .copied()
        .ok_or_else(|| ProofError::MissingWitness(indices.first().map_or(1, |g| g.get())))
}

/// Check a multiproof against `root`.
///
/// # Errors
/// See [`compute_multiproof_root`]; `RootMismatch` if the root differs.
pub fn verify_multiproof(
    root: &Node,
    indices: &[GeneralizedIndex],
    leaves: &[Node],
    helpers: &[Node],
) -> Result<(), ProofError> {
    let computed = compute_multiproof_root(indices, leaves, helpers)?;
    if computed != *root {
        return Err(ProofError::RootMismatch {
            expected: *root,
            computed,
        });
    }
    debug!(leaves = leaves.len(), helpers = helpers.len(), "multiproof verified");
    Ok(())
}
