//! Merkleization of beacon SSZ objects into proof trees.
//!
//! Building the full tree of a `BeaconState` is not an option: the validator
//! registry alone has 2^40 leaf slots. Instead an object is merkleized along
//! a *focus*, the path steps a proof will follow. Every node on that path is
//! materialized, every other subtree is collapsed into a single leaf holding
//! its root. The resulting tree has the same root as the full one and holds
//! every witness the focused proof needs, at a cost linear in the object size
//! for hashing and linear in the path depth for memory.

use crate::gindex::GeneralizedIndex;
use crate::hash::{hash_pair, mix_in_length, pack_bytes, pack_uint64s, zero_hash, Node, MAX_DEPTH};
use crate::path::PathStep;
use crate::proof::ProofError;
use crate::tree::{ceil_log2, graft, Tree};
use crate::types::{
    BeaconBlockHeader, BeaconState, Checkpoint, Eth1Data, ExecutionPayloadHeader, Fork,
    HistoricalSummary, PendingConsolidation, PendingDeposit, PendingPartialWithdrawal,
    SyncCommittee, Validator,
};
use ssz_rs::prelude::*;

/// Root of `chunks` padded with zero leaves to `2^depth` slots.
///
/// # Errors
/// Returns `TooManyLeaves` if the chunks do not fit.
pub fn merkle_root(chunks: &[Node], depth: u32) -> Result<Node, ProofError> {
    let capacity = 1_u128.checked_shl(depth).unwrap_or(0);
    if depth as usize > MAX_DEPTH || chunks.len() as u128 > capacity {
        return Err(ProofError::TooManyLeaves {
            count: chunks.len(),
            depth,
        });
    }
    if chunks.is_empty() {
        return Ok(zero_hash(depth));
    }
    let mut layer = chunks.to_vec();
    for level in 0..depth {
        if layer.len() % 2 == 1 {
            layer.push(zero_hash(level));
        }
        layer = layer
            .chunks_exact(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }
    Ok(layer[0])
}

/// Tree over `chunks` (padded to `2^depth` slots) in which only the path to
/// leaf `index` is materialized.
///
/// # Errors
/// Returns `TooManyLeaves` if the chunks do not fit.
pub fn focused_tree(chunks: &[Node], depth: u32, index: u64) -> Result<Tree, ProofError> {
    if depth == 0 {
        return Ok(Tree::leaf(chunks.first().copied().unwrap_or_default()));
    }
    let half = 1_u128 << (depth - 1);
    let split = if (chunks.len() as u128) < half {
        chunks.len()
    } else {
        usize::try_from(half).map_err(|_| ProofError::TooManyLeaves {
            count: chunks.len(),
            depth,
        })?
    };
    let (left, right) = chunks.split_at(split);
    if u128::from(index) < half {
        Ok(Tree::branch(
            &focused_tree(left, depth - 1, index)?,
            &collapsed(right, depth - 1)?,
        ))
    } else {
        let index = u64::try_from(u128::from(index) - half).unwrap_or(u64::MAX);
        Ok(Tree::branch(
            &collapsed(left, depth - 1)?,
            &focused_tree(right, depth - 1, index)?,
        ))
    }
}

fn collapsed(chunks: &[Node], depth: u32) -> Result<Tree, ProofError> {
    if chunks.is_empty() {
        Tree::zero(depth)
    } else {
        merkle_root(chunks, depth).map(Tree::leaf)
    }
}

/// An SSZ value that can be turned into a proof tree.
pub trait Merkleize {
    /// Hash tree root of the value.
    ///
    /// # Errors
    /// Returns `Merkleization` if the value cannot be hashed.
    fn root(&self) -> Result<Node, ProofError>;

    /// Tree of the value, expanded along `focus`. With an empty focus this
    /// is a single leaf holding the root.
    ///
    /// # Errors
    /// Returns `ElementOutOfRange` if `focus` indexes past the end of a list.
    fn merkle_tree(&self, _focus: &[PathStep]) -> Result<Tree, ProofError> {
        Ok(Tree::leaf(self.root()?))
    }
}

/// Values that can be elements of an SSZ vector or list.
pub trait Element: Merkleize + Sized {
    /// Bytes per element for packed basic types, `None` when every element
    /// takes its own chunk.
    const PACKED_SIZE: Option<usize> = None;

    /// Leaf chunks of a sequence of these elements.
    ///
    /// # Errors
    /// Propagates hashing failures of the elements.
    fn chunks(items: &[Self]) -> Result<Vec<Node>, ProofError> {
        items.iter().map(Merkleize::root).collect()
    }
}

fn ssz_root<T: HashTreeRoot>(value: &T) -> Result<Node, ProofError> {
    value
        .hash_tree_root()
        .map(Into::into)
        .map_err(|e| ProofError::Merkleization(format!("{e:?}")))
}

impl Merkleize for u8 {
    fn root(&self) -> Result<Node, ProofError> {
        let mut chunk = [0u8; 32];
        chunk[0] = *self;
        Ok(chunk)
    }
}

impl Element for u8 {
    const PACKED_SIZE: Option<usize> = Some(1);

    fn chunks(items: &[Self]) -> Result<Vec<Node>, ProofError> {
        Ok(pack_bytes(items))
    }
}

impl Merkleize for u64 {
    fn root(&self) -> Result<Node, ProofError> {
        Ok(crate::hash::uint64_chunk(*self))
    }
}

impl Element for u64 {
    const PACKED_SIZE: Option<usize> = Some(8);

    fn chunks(items: &[Self]) -> Result<Vec<Node>, ProofError> {
        Ok(pack_uint64s(items))
    }
}

impl Merkleize for bool {
    fn root(&self) -> Result<Node, ProofError> {
        u8::from(*self).root()
    }
}

impl<const N: usize> Merkleize for [u8; N] {
    fn root(&self) -> Result<Node, ProofError> {
        let chunks = pack_bytes(self);
        merkle_root(&chunks, ceil_log2(chunks.len() as u64))
    }
}

impl Element for [u8; 32] {}

impl Merkleize for U256 {
    fn root(&self) -> Result<Node, ProofError> {
        ssz_root(self)
    }
}

impl<const N: usize> Merkleize for Bitvector<N> {
    fn root(&self) -> Result<Node, ProofError> {
        ssz_root(self)
    }
}

fn chunk_depth<T: Element>(bound: usize) -> u32 {
    let bound = bound as u64;
    let chunks = match T::PACKED_SIZE {
        Some(size) => (bound * size as u64).div_ceil(32),
        None => bound,
    };
    ceil_log2(chunks)
}

/// Data tree of a vector or list, expanded towards `index`.
fn sequence_tree<T: Element>(
    items: &[T],
    depth: u32,
    index: u64,
    rest: &[PathStep],
) -> Result<Tree, ProofError> {
    let length = items.len() as u64;
    if index >= length {
        return Err(ProofError::ElementOutOfRange { index, length });
    }
    let chunks = T::chunks(items)?;
    match T::PACKED_SIZE {
        Some(size) => focused_tree(&chunks, depth, index * size as u64 / 32),
        None => {
            let tree = focused_tree(&chunks, depth, index)?;
            if rest.is_empty() {
                return Ok(tree);
            }
            let item = usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .ok_or(ProofError::ElementOutOfRange { index, length })?;
            let at = GeneralizedIndex::from_depth_and_index(depth, index)?;
            graft(&tree, at, &item.merkle_tree(rest)?)
        }
    }
}

impl<T: Element, const N: usize> Merkleize for Vector<T, N> {
    fn root(&self) -> Result<Node, ProofError> {
        merkle_root(&T::chunks(&self[..])?, chunk_depth::<T>(N))
    }

    fn merkle_tree(&self, focus: &[PathStep]) -> Result<Tree, ProofError> {
        match focus.split_first() {
            Some((PathStep::Index(index), rest)) => {
                sequence_tree(&self[..], chunk_depth::<T>(N), *index, rest)
            }
            _ => Ok(Tree::leaf(self.root()?)),
        }
    }
}

impl<T: Element, const N: usize> Element for Vector<T, N> {}

impl<T: Element, const N: usize> Merkleize for List<T, N> {
    fn root(&self) -> Result<Node, ProofError> {
        let data_root = merkle_root(&T::chunks(&self[..])?, chunk_depth::<T>(N))?;
        Ok(mix_in_length(&data_root, self.len() as u64))
    }

    fn merkle_tree(&self, focus: &[PathStep]) -> Result<Tree, ProofError> {
        let length = self.len() as u64;
        match focus.split_first() {
            Some((PathStep::Length, _)) => {
                let data_root = merkle_root(&T::chunks(&self[..])?, chunk_depth::<T>(N))?;
                Ok(Tree::list(&Tree::leaf(data_root), length))
            }
            Some((PathStep::Index(index), rest)) => {
                let data = sequence_tree(&self[..], chunk_depth::<T>(N), *index, rest)?;
                Ok(Tree::list(&data, length))
            }
            _ => Ok(Tree::leaf(self.root()?)),
        }
    }
}

/// Tree of one container field: expanded if `focus` names it, collapsed to
/// its root otherwise.
fn field_tree<T: Merkleize>(value: &T, name: &str, focus: &[PathStep]) -> Result<Tree, ProofError> {
    match focus.split_first() {
        Some((PathStep::Field(field), rest)) if field == name => value.merkle_tree(rest),
        _ => Ok(Tree::leaf(value.root()?)),
    }
}

macro_rules! merkleize_container {
    ($($ty:ident { $($field:ident),+ $(,)? })+) => {$(
        impl Merkleize for $ty {
            fn root(&self) -> Result<Node, ProofError> {
                let roots = [$(self.$field.root()?),+];
                merkle_root(&roots, ceil_log2(roots.len() as u64))
            }

            fn merkle_tree(&self, focus: &[PathStep]) -> Result<Tree, ProofError> {
                if focus.is_empty() {
                    return Ok(Tree::leaf(self.root()?));
                }
                let fields = [$(field_tree(&self.$field, stringify!($field), focus)?),+];
                Tree::container(&fields)
            }
        }

        impl Element for $ty {}
    )+};
}

merkleize_container! {
    BeaconBlockHeader { slot, proposer_index, parent_root, state_root, body_root }
    Fork { previous_version, current_version, epoch }
    Checkpoint { epoch, root }
    Eth1Data { deposit_root, deposit_count, block_hash }
    Validator {
        pubkey,
        withdrawal_credentials,
        effective_balance,
        slashed,
        activation_eligibility_epoch,
        activation_epoch,
        exit_epoch,
        withdrawable_epoch,
    }
    HistoricalSummary { block_summary_root, state_summary_root }
    SyncCommittee { pubkeys, aggregate_pubkey }
    ExecutionPayloadHeader {
        parent_hash,
        fee_recipient,
        state_root,
        receipts_root,
        logs_bloom,
        prev_randao,
        block_number,
        gas_limit,
        gas_used,
        timestamp,
        extra_data,
        base_fee_per_gas,
        block_hash,
        transactions_root,
        withdrawals_root,
        blob_gas_used,
        excess_blob_gas,
    }
    PendingDeposit { pubkey, withdrawal_credentials, amount, signature, slot }
    PendingPartialWithdrawal { validator_index, amount, withdrawable_epoch }
    PendingConsolidation { source_index, target_index }
    BeaconState {
        genesis_time,
        genesis_validators_root,
        slot,
        fork,
        latest_block_header,
        block_roots,
        state_roots,
        historical_roots,
        eth1_data,
        eth1_data_votes,
        eth1_deposit_index,
        validators,
        balances,
        randao_mixes,
        slashings,
        previous_epoch_participation,
        current_epoch_participation,
        justification_bits,
        previous_justified_checkpoint,
        current_justified_checkpoint,
        finalized_checkpoint,
        inactivity_scores,
        current_sync_committee,
        next_sync_committee,
        latest_execution_payload_header,
        next_withdrawal_index,
        next_withdrawal_validator_index,
        historical_summaries,
        deposit_requests_start_index,
        deposit_balance_to_consume,
        exit_balance_to_consume,
        earliest_exit_epoch,
        consolidation_balance_to_consume,
        earliest_consolidation_epoch,
        pending_deposits,
        pending_partial_withdrawals,
        pending_consolidations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{resolve, PathSpec};
    use crate::proof::build_proof;
    use crate::schema::{BEACON_BLOCK_HEADER, BEACON_STATE};

    fn focus(path: &str) -> Vec<PathStep> {
        path.parse::<PathSpec>().unwrap().steps().to_vec()
    }

    fn validator(i: u8) -> Validator {
        let mut validator = Validator::default();
        validator.pubkey = Vector::try_from(vec![i; 48]).unwrap();
        validator.withdrawal_credentials[0] = 0x01;
        validator.withdrawal_credentials[31] = i;
        validator.effective_balance = 32_000_000_000;
        validator.slashed = i % 2 == 1;
        validator.activation_epoch = 100 + u64::from(i);
        validator.exit_epoch = u64::MAX;
        validator.withdrawable_epoch = u64::MAX;
        validator
    }

    fn sample_state() -> BeaconState {
        let mut state = BeaconState::default();
        state.genesis_time = 1_606_824_023;
        state.slot = 4242;
        state.fork.current_version = [5, 0, 0, 100];
        state.earliest_exit_epoch = 77;
        for i in 0..5u8 {
            state.validators.push(validator(i));
            state.balances.push(32_000_000_000 + u64::from(i));
            state.current_epoch_participation.push(i);
        }
        state.pending_consolidations.push(PendingConsolidation {
            source_index: 3,
            target_index: 1,
        });
        state.latest_execution_payload_header.block_number = 9_000_000;
        state.latest_execution_payload_header.extra_data.push(0xee);
        state
    }

    #[test]
    fn test_merkle_root_padding() {
        let a = [1u8; 32];
        assert_eq!(merkle_root(&[a], 0).unwrap(), a);
        assert_eq!(merkle_root(&[a], 1).unwrap(), hash_pair(&a, &[0u8; 32]));
        assert_eq!(
            merkle_root(&[a], 2).unwrap(),
            hash_pair(&hash_pair(&a, &[0u8; 32]), &zero_hash(1))
        );
        assert_eq!(merkle_root(&[], 40).unwrap(), zero_hash(40));
        assert!(merkle_root(&[a, a, a], 1).is_err());
    }

    #[test]
    fn test_focused_tree_matches_full_tree() {
        let chunks: Vec<Node> = (0..11u8).map(|i| [i; 32]).collect();
        let full = Tree::from_leaves(&chunks, 4).unwrap();
        for index in [0, 5, 10, 15] {
            let focused = focused_tree(&chunks, 4, index).unwrap();
            assert_eq!(focused.root(), full.root());
            let target = GeneralizedIndex::from_depth_and_index(4, index).unwrap();
            assert_eq!(
                build_proof(&focused, target).unwrap(),
                build_proof(&full, target).unwrap()
            );
        }
    }

    #[test]
    fn test_roots_match_ssz_rs() {
        let v = validator(7);
        assert_eq!(v.root().unwrap(), ssz_root(&v).unwrap());

        let header = BeaconBlockHeader {
            slot: 100,
            proposer_index: 3,
            parent_root: [1u8; 32],
            state_root: [2u8; 32],
            body_root: [3u8; 32],
        };
        assert_eq!(header.root().unwrap(), ssz_root(&header).unwrap());

        let state = sample_state();
        assert_eq!(
            state.latest_execution_payload_header.root().unwrap(),
            ssz_root(&state.latest_execution_payload_header).unwrap()
        );
        assert_eq!(
            state.current_sync_committee.root().unwrap(),
            ssz_root(&state.current_sync_committee).unwrap()
        );
        assert_eq!(state.balances.root().unwrap(), ssz_root(&state.balances).unwrap());
        assert_eq!(state.root().unwrap(), ssz_root(&state).unwrap());
    }

    #[test]
    fn test_focused_state_tree_keeps_root() {
        let state = sample_state();
        let root = state.root().unwrap();
        for path in [
            "slot",
            "validators/3/activation_epoch",
            "validators/__len__",
            "balances/2",
            "current_epoch_participation/4",
            "pending_consolidations/0/source_index",
            "latest_execution_payload_header/block_number",
            "fork/current_version",
        ] {
            let tree = state.merkle_tree(&focus(path)).unwrap();
            assert_eq!(tree.root(), root, "{path}");
        }
    }

    #[test]
    fn test_focused_state_proofs() {
        let state = sample_state();
        let root = state.root().unwrap();
        let cases: [(&str, serde_json::Value); 6] = [
            ("slot", "4242".into()),
            ("validators/3/activation_epoch", "103".into()),
            ("validators/3/slashed", true.into()),
            ("validators/__len__", "5".into()),
            ("balances/2", "32000000002".into()),
            ("current_epoch_participation/4", "4".into()),
        ];
        for (path, expected) in cases {
            let resolved = resolve(&BEACON_STATE, &path.parse().unwrap()).unwrap();
            let tree = state.merkle_tree(&focus(path)).unwrap();
            let proof = build_proof(&tree, resolved.gindex).unwrap();
            proof.verify(&root).unwrap();
            assert_eq!(
                resolved.leaf_kind.decode(&proof.leaf, resolved.offset),
                expected,
                "{path}"
            );
        }
    }

    #[test]
    fn test_validator_leaf_is_its_root() {
        let state = sample_state();
        let resolved = resolve(&BEACON_STATE, &"validators/1".parse().unwrap()).unwrap();
        let tree = state.merkle_tree(&focus("validators/1")).unwrap();
        assert_eq!(tree.get(resolved.gindex).unwrap(), validator(1).root().unwrap());
    }

    #[test]
    fn test_header_tree_with_grafted_state() {
        let state = sample_state();
        let header = BeaconBlockHeader {
            slot: 4242,
            state_root: state.root().unwrap(),
            ..Default::default()
        };
        let path: PathSpec = "state_root/validators/2/withdrawal_credentials".parse().unwrap();
        let resolved = resolve(&BEACON_BLOCK_HEADER, &path).unwrap();
        let link = resolved.link.clone().unwrap();

        let header_tree = header.merkle_tree(path.steps()).unwrap();
        let state_tree = state.merkle_tree(&link.focus).unwrap();
        let tree = graft(&header_tree, link.at, &state_tree).unwrap();
        assert_eq!(tree.root(), header.root().unwrap());

        let proof = build_proof(&tree, resolved.gindex).unwrap();
        proof.verify(&header.root().unwrap()).unwrap();
        assert_eq!(proof.leaf, validator(2).withdrawal_credentials);
    }

    #[test]
    fn test_index_past_list_end() {
        let state = sample_state();
        assert_eq!(
            state.merkle_tree(&focus("validators/5/slashed")).unwrap_err(),
            ProofError::ElementOutOfRange {
                index: 5,
                length: 5
            }
        );
    }
}
