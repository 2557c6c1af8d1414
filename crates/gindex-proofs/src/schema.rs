//! Static SSZ schemas used to resolve paths into generalized indices.
//!
//! Only the shape matters here: field order, element sizes, and list limits.
//! Values wider than a chunk that are never navigated into (BLS keys,
//! bitvectors, byte lists) are [`SchemaNode::Opaque`]: a path can end at them
//! but not descend further.

use crate::types::preset;

/// Shape of one SSZ value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaNode {
    /// Little-endian unsigned integer of the given byte width.
    Uint(usize),
    Bool,
    /// Fixed byte string of at most one chunk.
    Bytes(usize),
    /// Addressable only through its hash tree root.
    Opaque,
    Container(&'static Container),
    Vector {
        elem: &'static SchemaNode,
        length: u64,
    },
    List {
        elem: &'static SchemaNode,
        limit: u64,
    },
    /// A 32-byte root committing to another object, e.g. the header's
    /// `state_root`. Paths continue into the target container.
    Link(&'static Container),
}

impl SchemaNode {
    /// Byte width of a packed basic type, `None` for types that occupy whole
    /// chunks.
    #[must_use]
    pub const fn packed_size(&self) -> Option<usize> {
        match self {
            Self::Uint(size) => Some(*size),
            Self::Bool => Some(1),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: SchemaNode,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Container {
    pub name: &'static str,
    pub fields: &'static [Field],
}

impl Container {
    /// Position and shape of the named field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<(usize, &SchemaNode)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .map(|(i, f)| (i, &f.kind))
    }
}

static UINT8: SchemaNode = SchemaNode::Uint(1);
static UINT64: SchemaNode = SchemaNode::Uint(8);
static BYTES32: SchemaNode = SchemaNode::Bytes(32);
static PUBKEY: SchemaNode = SchemaNode::Opaque;
static ETH1_DATA_NODE: SchemaNode = SchemaNode::Container(&ETH1_DATA);
static VALIDATOR_NODE: SchemaNode = SchemaNode::Container(&VALIDATOR);
static HISTORICAL_SUMMARY_NODE: SchemaNode = SchemaNode::Container(&HISTORICAL_SUMMARY);
static PENDING_DEPOSIT_NODE: SchemaNode = SchemaNode::Container(&PENDING_DEPOSIT);
static PENDING_PARTIAL_WITHDRAWAL_NODE: SchemaNode =
    SchemaNode::Container(&PENDING_PARTIAL_WITHDRAWAL);
static PENDING_CONSOLIDATION_NODE: SchemaNode = SchemaNode::Container(&PENDING_CONSOLIDATION);

const VALIDATOR_REGISTRY_LIMIT: u64 = preset::VALIDATOR_REGISTRY_LIMIT as u64;
const HISTORICAL_ROOTS_LIMIT: u64 = preset::HISTORICAL_ROOTS_LIMIT as u64;
const SLOTS_PER_HISTORICAL_ROOT: u64 = preset::SLOTS_PER_HISTORICAL_ROOT as u64;

pub static BEACON_BLOCK_HEADER: Container = Container {
    name: "BeaconBlockHeader",
    fields: &[
        Field { name: "slot", kind: SchemaNode::Uint(8) },
        Field { name: "proposer_index", kind: SchemaNode::Uint(8) },
        Field { name: "parent_root", kind: SchemaNode::Bytes(32) },
        Field { name: "state_root", kind: SchemaNode::Link(&BEACON_STATE) },
        Field { name: "body_root", kind: SchemaNode::Bytes(32) },
    ],
};

/// Header as embedded in the state (`latest_block_header`); its
/// `state_root` is a plain root.
pub static LATEST_BLOCK_HEADER: Container = Container {
    name: "BeaconBlockHeader",
    fields: &[
        Field { name: "slot", kind: SchemaNode::Uint(8) },
        Field { name: "proposer_index", kind: SchemaNode::Uint(8) },
        Field { name: "parent_root", kind: SchemaNode::Bytes(32) },
        Field { name: "state_root", kind: SchemaNode::Bytes(32) },
        Field { name: "body_root", kind: SchemaNode::Bytes(32) },
    ],
};

pub static FORK: Container = Container {
    name: "Fork",
    fields: &[
        Field { name: "previous_version", kind: SchemaNode::Bytes(4) },
        Field { name: "current_version", kind: SchemaNode::Bytes(4) },
        Field { name: "epoch", kind: SchemaNode::Uint(8) },
    ],
};

pub static CHECKPOINT: Container = Container {
    name: "Checkpoint",
    fields: &[
        Field { name: "epoch", kind: SchemaNode::Uint(8) },
        Field { name: "root", kind: SchemaNode::Bytes(32) },
    ],
};

pub static ETH1_DATA: Container = Container {
    name: "Eth1Data",
    fields: &[
        Field { name: "deposit_root", kind: SchemaNode::Bytes(32) },
        Field { name: "deposit_count", kind: SchemaNode::Uint(8) },
        Field { name: "block_hash", kind: SchemaNode::Bytes(32) },
    ],
};

pub static VALIDATOR: Container = Container {
    name: "Validator",
    fields: &[
        Field { name: "pubkey", kind: SchemaNode::Opaque },
        Field { name: "withdrawal_credentials", kind: SchemaNode::Bytes(32) },
        Field { name: "effective_balance", kind: SchemaNode::Uint(8) },
        Field { name: "slashed", kind: SchemaNode::Bool },
        Field { name: "activation_eligibility_epoch", kind: SchemaNode::Uint(8) },
        Field { name: "activation_epoch", kind: SchemaNode::Uint(8) },
        Field { name: "exit_epoch", kind: SchemaNode::Uint(8) },
        Field { name: "withdrawable_epoch", kind: SchemaNode::Uint(8) },
    ],
};

pub static HISTORICAL_SUMMARY: Container = Container {
    name: "HistoricalSummary",
    fields: &[
        Field { name: "block_summary_root", kind: SchemaNode::Bytes(32) },
        Field { name: "state_summary_root", kind: SchemaNode::Bytes(32) },
    ],
};

pub static SYNC_COMMITTEE: Container = Container {
    name: "SyncCommittee",
    fields: &[
        Field {
            name: "pubkeys",
            kind: SchemaNode::Vector {
                elem: &PUBKEY,
                length: preset::SYNC_COMMITTEE_SIZE as u64,
            },
        },
        Field { name: "aggregate_pubkey", kind: SchemaNode::Opaque },
    ],
};

pub static EXECUTION_PAYLOAD_HEADER: Container = Container {
    name: "ExecutionPayloadHeader",
    fields: &[
        Field { name: "parent_hash", kind: SchemaNode::Bytes(32) },
        Field { name: "fee_recipient", kind: SchemaNode::Bytes(20) },
        Field { name: "state_root", kind: SchemaNode::Bytes(32) },
        Field { name: "receipts_root", kind: SchemaNode::Bytes(32) },
        Field { name: "logs_bloom", kind: SchemaNode::Opaque },
        Field { name: "prev_randao", kind: SchemaNode::Bytes(32) },
        Field { name: "block_number", kind: SchemaNode::Uint(8) },
        Field { name: "gas_limit", kind: SchemaNode::Uint(8) },
        Field { name: "gas_used", kind: SchemaNode::Uint(8) },
        Field { name: "timestamp", kind: SchemaNode::Uint(8) },
        Field { name: "extra_data", kind: SchemaNode::Opaque },
        Field { name: "base_fee_per_gas", kind: SchemaNode::Uint(32) },
        Field { name: "block_hash", kind: SchemaNode::Bytes(32) },
        Field { name: "transactions_root", kind: SchemaNode::Bytes(32) },
        Field { name: "withdrawals_root", kind: SchemaNode::Bytes(32) },
        Field { name: "blob_gas_used", kind: SchemaNode::Uint(8) },
        Field { name: "excess_blob_gas", kind: SchemaNode::Uint(8) },
    ],
};

pub static PENDING_DEPOSIT: Container = Container {
    name: "PendingDeposit",
    fields: &[
        Field { name: "pubkey", kind: SchemaNode::Opaque },
        Field { name: "withdrawal_credentials", kind: SchemaNode::Bytes(32) },
        Field { name: "amount", kind: SchemaNode::Uint(8) },
        Field { name: "signature", kind: SchemaNode::Opaque },
        Field { name: "slot", kind: SchemaNode::Uint(8) },
    ],
};

pub static PENDING_PARTIAL_WITHDRAWAL: Container = Container {
    name: "PendingPartialWithdrawal",
    fields: &[
        Field { name: "validator_index", kind: SchemaNode::Uint(8) },
        Field { name: "amount", kind: SchemaNode::Uint(8) },
        Field { name: "withdrawable_epoch", kind: SchemaNode::Uint(8) },
    ],
};

pub static PENDING_CONSOLIDATION: Container = Container {
    name: "PendingConsolidation",
    fields: &[
        Field { name: "source_index", kind: SchemaNode::Uint(8) },
        Field { name: "target_index", kind: SchemaNode::Uint(8) },
    ],
};

pub static BEACON_STATE: Container = Container {
    name: "BeaconState",
    fields: &[
        Field { name: "genesis_time", kind: SchemaNode::Uint(8) },
        Field { name: "genesis_validators_root", kind: SchemaNode::Bytes(32) },
        Field { name: "slot", kind: SchemaNode::Uint(8) },
        Field { name: "fork", kind: SchemaNode::Container(&FORK) },
        Field { name: "latest_block_header", kind: SchemaNode::Container(&LATEST_BLOCK_HEADER) },
        Field {
            name: "block_roots",
            kind: SchemaNode::Vector { elem: &BYTES32, length: SLOTS_PER_HISTORICAL_ROOT },
        },
        Field {
            name: "state_roots",
            kind: SchemaNode::Vector { elem: &BYTES32, length: SLOTS_PER_HISTORICAL_ROOT },
        },
        Field {
            name: "historical_roots",
            kind: SchemaNode::List { elem: &BYTES32, limit: HISTORICAL_ROOTS_LIMIT },
        },
        Field { name: "eth1_data", kind: SchemaNode::Container(&ETH1_DATA) },
        Field {
            name: "eth1_data_votes",
            kind: SchemaNode::List {
                elem: &ETH1_DATA_NODE,
                limit: preset::ETH1_DATA_VOTES_LIMIT as u64,
            },
        },
        Field { name: "eth1_deposit_index", kind: SchemaNode::Uint(8) },
        Field {
            name: "validators",
            kind: SchemaNode::List { elem: &VALIDATOR_NODE, limit: VALIDATOR_REGISTRY_LIMIT },
        },
        Field {
            name: "balances",
            kind: SchemaNode::List { elem: &UINT64, limit: VALIDATOR_REGISTRY_LIMIT },
        },
        Field {
            name: "randao_mixes",
            kind: SchemaNode::Vector {
                elem: &BYTES32,
                length: preset::EPOCHS_PER_HISTORICAL_VECTOR as u64,
            },
        },
        Field {
            name: "slashings",
            kind: SchemaNode::Vector {
                elem: &UINT64,
                length: preset::EPOCHS_PER_SLASHINGS_VECTOR as u64,
            },
        },
        Field {
            name: "previous_epoch_participation",
            kind: SchemaNode::List { elem: &UINT8, limit: VALIDATOR_REGISTRY_LIMIT },
        },
        Field {
            name: "current_epoch_participation",
            kind: SchemaNode::List { elem: &UINT8, limit: VALIDATOR_REGISTRY_LIMIT },
        },
        Field { name: "justification_bits", kind: SchemaNode::Opaque },
        Field { name: "previous_justified_checkpoint", kind: SchemaNode::Container(&CHECKPOINT) },
        Field { name: "current_justified_checkpoint", kind: SchemaNode::Container(&CHECKPOINT) },
        Field { name: "finalized_checkpoint", kind: SchemaNode::Container(&CHECKPOINT) },
        Field {
            name: "inactivity_scores",
            kind: SchemaNode::List { elem: &UINT64, limit: VALIDATOR_REGISTRY_LIMIT },
        },
        Field { name: "current_sync_committee", kind: SchemaNode::Container(&SYNC_COMMITTEE) },
        Field { name: "next_sync_committee", kind: SchemaNode::Container(&SYNC_COMMITTEE) },
        Field {
            name: "latest_execution_payload_header",
            kind: SchemaNode::Container(&EXECUTION_PAYLOAD_HEADER),
        },
        Field { name: "next_withdrawal_index", kind: SchemaNode::Uint(8) },
        Field { name: "next_withdrawal_validator_index", kind: SchemaNode::Uint(8) },
        Field {
            name: "historical_summaries",
            kind: SchemaNode::List {
                elem: &HISTORICAL_SUMMARY_NODE,
                limit: HISTORICAL_ROOTS_LIMIT,
            },
        },
        Field { name: "deposit_requests_start_index", kind: SchemaNode::Uint(8) },
        Field { name: "deposit_balance_to_consume", kind: SchemaNode::Uint(8) },
        Field { name: "exit_balance_to_consume", kind: SchemaNode::Uint(8) },
        Field { name: "earliest_exit_epoch", kind: SchemaNode::Uint(8) },
        Field { name: "consolidation_balance_to_consume", kind: SchemaNode::Uint(8) },
        Field { name: "earliest_consolidation_epoch", kind: SchemaNode::Uint(8) },
        Field {
            name: "pending_deposits",
            kind: SchemaNode::List {
                elem: &PENDING_DEPOSIT_NODE,
                limit: preset::PENDING_DEPOSITS_LIMIT as u64,
            },
        },
        Field {
            name: "pending_partial_withdrawals",
            kind: SchemaNode::List {
                elem: &PENDING_PARTIAL_WITHDRAWAL_NODE,
                limit: preset::PENDING_PARTIAL_WITHDRAWALS_LIMIT as u64,
            },
        },
        Field {
            name: "pending_consolidations",
            kind: SchemaNode::List {
                elem: &PENDING_CONSOLIDATION_NODE,
                limit: preset::PENDING_CONSOLIDATIONS_LIMIT as u64,
            },
        },
    ],
};
