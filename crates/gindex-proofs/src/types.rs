//! Beacon Chain SSZ Types
//!
//! SSZ containers for the block header and the Electra `BeaconState`,
//! deriving `ssz_rs` traits for (de)serialization and reference hashing.
//! List and vector bounds come from the preset selected by cargo feature.

use ssz_rs::prelude::*;

/// Preset constants - only one feature should be active
#[cfg(all(feature = "gnosis", not(feature = "minimal")))]
pub mod preset {
    pub const NAME: &str = "gnosis";
    pub const SLOTS_PER_HISTORICAL_ROOT: usize = 8192;
    pub const HISTORICAL_ROOTS_LIMIT: usize = 16_777_216;
    /// `EPOCHS_PER_ETH1_VOTING_PERIOD * SLOTS_PER_EPOCH`
    pub const ETH1_DATA_VOTES_LIMIT: usize = 1024;
    /// Maximum number of validators (2^40)
    pub const VALIDATOR_REGISTRY_LIMIT: usize = 1_099_511_627_776;
    pub const EPOCHS_PER_HISTORICAL_VECTOR: usize = 65_536;
    pub const EPOCHS_PER_SLASHINGS_VECTOR: usize = 8192;
    pub const SYNC_COMMITTEE_SIZE: usize = 512;
    pub const PENDING_DEPOSITS_LIMIT: usize = 134_217_728;
    pub const PENDING_PARTIAL_WITHDRAWALS_LIMIT: usize = 134_217_728;
    /// Maximum pending consolidations (2^18)
    pub const PENDING_CONSOLIDATIONS_LIMIT: usize = 262_144;
}

#[cfg(feature = "minimal")]
pub mod preset {
    pub const NAME: &str = "minimal";
    pub const SLOTS_PER_HISTORICAL_ROOT: usize = 64;
    pub const HISTORICAL_ROOTS_LIMIT: usize = 16_777_216;
    pub const ETH1_DATA_VOTES_LIMIT: usize = 32;
    pub const VALIDATOR_REGISTRY_LIMIT: usize = 1_099_511_627_776;
    pub const EPOCHS_PER_HISTORICAL_VECTOR: usize = 64;
    pub const EPOCHS_PER_SLASHINGS_VECTOR: usize = 64;
    pub const SYNC_COMMITTEE_SIZE: usize = 32;
    pub const PENDING_DEPOSITS_LIMIT: usize = 134_217_728;
    pub const PENDING_PARTIAL_WITHDRAWALS_LIMIT: usize = 64;
    pub const PENDING_CONSOLIDATIONS_LIMIT: usize = 64;
}

#[cfg(not(any(feature = "gnosis", feature = "minimal")))]
pub mod preset {
    pub const NAME: &str = "mainnet";
    pub const SLOTS_PER_HISTORICAL_ROOT: usize = 8192;
    pub const HISTORICAL_ROOTS_LIMIT: usize = 16_777_216;
    pub const ETH1_DATA_VOTES_LIMIT: usize = 2048;
    pub const VALIDATOR_REGISTRY_LIMIT: usize = 1_099_511_627_776;
    pub const EPOCHS_PER_HISTORICAL_VECTOR: usize = 65_536;
    pub const EPOCHS_PER_SLASHINGS_VECTOR: usize = 8192;
    pub const SYNC_COMMITTEE_SIZE: usize = 512;
    pub const PENDING_DEPOSITS_LIMIT: usize = 134_217_728;
    pub const PENDING_PARTIAL_WITHDRAWALS_LIMIT: usize = 134_217_728;
    pub const PENDING_CONSOLIDATIONS_LIMIT: usize = 262_144;
}

use preset::*;

pub const BYTES_PER_LOGS_BLOOM: usize = 256;
pub const MAX_EXTRA_DATA_BYTES: usize = 32;
pub const JUSTIFICATION_BITS_LENGTH: usize = 4;

pub type BlsPubkey = Vector<u8, 48>;
pub type BlsSignature = Vector<u8, 96>;

/// Beacon block header
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct BeaconBlockHeader {
    pub slot: u64,
    pub proposer_index: u64,
    pub parent_root: [u8; 32],
    pub state_root: [u8; 32],
    pub body_root: [u8; 32],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Fork {
    pub previous_version: [u8; 4],
    pub current_version: [u8; 4],
    pub epoch: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Checkpoint {
    pub epoch: u64,
    pub root: [u8; 32],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Eth1Data {
    pub deposit_root: [u8; 32],
    pub deposit_count: u64,
    pub block_hash: [u8; 32],
}

/// Validator record from the beacon state
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Validator {
    pub pubkey: BlsPubkey,
    pub withdrawal_credentials: [u8; 32],
    /// Effective balance in Gwei
    pub effective_balance: u64,
    pub slashed: bool,
    pub activation_eligibility_epoch: u64,
    pub activation_epoch: u64,
    pub exit_epoch: u64,
    pub withdrawable_epoch: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct HistoricalSummary {
    pub block_summary_root: [u8; 32],
    pub state_summary_root: [u8; 32],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SyncCommittee {
    pub pubkeys: Vector<BlsPubkey, SYNC_COMMITTEE_SIZE>,
    pub aggregate_pubkey: BlsPubkey,
}

/// Deneb/Electra execution payload header
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ExecutionPayloadHeader {
    pub parent_hash: [u8; 32],
    pub fee_recipient: [u8; 20],
    pub state_root: [u8; 32],
    pub receipts_root: [u8; 32],
    pub logs_bloom: Vector<u8, BYTES_PER_LOGS_BLOOM>,
    pub prev_randao: [u8; 32],
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: List<u8, MAX_EXTRA_DATA_BYTES>,
    pub base_fee_per_gas: U256,
    pub block_hash: [u8; 32],
    pub transactions_root: [u8; 32],
    pub withdrawals_root: [u8; 32],
    pub blob_gas_used: u64,
    pub excess_blob_gas: u64,
}

/// Pending deposit entry (Electra)
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct PendingDeposit {
    pub pubkey: BlsPubkey,
    pub withdrawal_credentials: [u8; 32],
    pub amount: u64,
    pub signature: BlsSignature,
    pub slot: u64,
}

/// Pending partial withdrawal (Electra)
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct PendingPartialWithdrawal {
    pub validator_index: u64,
    pub amount: u64,
    pub withdrawable_epoch: u64,
}

/// Pending consolidation entry (Electra)
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct PendingConsolidation {
    pub source_index: u64,
    pub target_index: u64,
}

/// Fork whose state layout [`BeaconState`] decodes, as named in the
/// `Eth-Consensus-Version` header.
pub const STATE_FORK: &str = "electra";

/// Electra `BeaconState`, all 37 fields in SSZ order.
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct BeaconState {
    pub genesis_time: u64,
    pub genesis_validators_root: [u8; 32],
    pub slot: u64,
    pub fork: Fork,
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: Vector<[u8; 32], SLOTS_PER_HISTORICAL_ROOT>,
    pub state_roots: Vector<[u8; 32], SLOTS_PER_HISTORICAL_ROOT>,
    pub historical_roots: List<[u8; 32], HISTORICAL_ROOTS_LIMIT>,
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: List<Eth1Data, ETH1_DATA_VOTES_LIMIT>,
    pub eth1_deposit_index: u64,
    pub validators: List<Validator, VALIDATOR_REGISTRY_LIMIT>,
    pub balances: List<u64, VALIDATOR_REGISTRY_LIMIT>,
    pub randao_mixes: Vector<[u8; 32], EPOCHS_PER_HISTORICAL_VECTOR>,
    pub slashings: Vector<u64, EPOCHS_PER_SLASHINGS_VECTOR>,
    pub previous_epoch_participation: List<u8, VALIDATOR_REGISTRY_LIMIT>,
    pub current_epoch_participation: List<u8, VALIDATOR_REGISTRY_LIMIT>,
    pub justification_bits: Bitvector<JUSTIFICATION_BITS_LENGTH>,
    pub previous_justified_checkpoint: Checkpoint,
    pub current_justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub inactivity_scores: List<u64, VALIDATOR_REGISTRY_LIMIT>,
    pub current_sync_committee: SyncCommittee,
    pub next_sync_committee: SyncCommittee,
    pub latest_execution_payload_header: ExecutionPayloadHeader,
    pub next_withdrawal_index: u64,
    pub next_withdrawal_validator_index: u64,
    pub historical_summaries: List<HistoricalSummary, HISTORICAL_ROOTS_LIMIT>,
    pub deposit_requests_start_index: u64,
    pub deposit_balance_to_consume: u64,
    pub exit_balance_to_consume: u64,
    pub earliest_exit_epoch: u64,
    pub consolidation_balance_to_consume: u64,
    pub earliest_consolidation_epoch: u64,
    pub pending_deposits: List<PendingDeposit, PENDING_DEPOSITS_LIMIT>,
    pub pending_partial_withdrawals: List<PendingPartialWithdrawal, PENDING_PARTIAL_WITHDRAWALS_LIMIT>,
    pub pending_consolidations: List<PendingConsolidation, PENDING_CONSOLIDATIONS_LIMIT>,
}
