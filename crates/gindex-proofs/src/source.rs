//! Beacon data sources.
//!
//! The prover only needs a handful of reads from a beacon node. They are
//! expressed by [`DataSource`] so the HTTP client can be swapped for the
//! in-memory [`InMemorySource`] in tests and vector generation.

use crate::hash::{parse_hex32, to_hex, Node};
use crate::merkleize::Merkleize;
use crate::proof::ProofError;
use crate::types::{BeaconBlockHeader, BeaconState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use thiserror::Error;

/// Block (or state) identifier, in Beacon API form.
///
/// When used as a state id, `Root` names a *state* root, as it does in the
/// Beacon API's `state_id` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BlockId {
    Head,
    Finalized,
    Justified,
    Genesis,
    Slot(u64),
    Root(Node),
}

impl BlockId {
    /// Whether the id always names the same block. Named tags move with
    /// the chain.
    #[must_use]
    pub const fn is_immutable(&self) -> bool {
        matches!(self, Self::Slot(_) | Self::Root(_) | Self::Genesis)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid block id {0:?}")]
pub struct InvalidBlockId(pub String);

impl FromStr for BlockId {
    type Err = InvalidBlockId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "head" => Ok(Self::Head),
            "finalized" => Ok(Self::Finalized),
            "justified" => Ok(Self::Justified),
            "genesis" => Ok(Self::Genesis),
            _ if s.starts_with("0x") => parse_hex32(s)
                .map(Self::Root)
                .map_err(|_| InvalidBlockId(s.to_string())),
            _ => s
                .parse()
                .map(Self::Slot)
                .map_err(|_| InvalidBlockId(s.to_string())),
        }
    }
}

impl TryFrom<String> for BlockId {
    type Error = InvalidBlockId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlockId> for String {
    fn from(id: BlockId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head => f.write_str("head"),
            Self::Finalized => f.write_str("finalized"),
            Self::Justified => f.write_str("justified"),
            Self::Genesis => f.write_str("genesis"),
            Self::Slot(slot) => slot.fmt(f),
            Self::Root(root) => f.write_str(&to_hex(root)),
        }
    }
}

/// A block header as reported by a beacon node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    /// Block root as reported by the node.
    pub root: Node,
    /// Whether the block is on the node's canonical chain.
    pub canonical: bool,
    pub header: BeaconBlockHeader,
}

/// Read access to beacon chain data.
pub trait DataSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn block_header(
        &self,
        block_id: &BlockId,
    ) -> impl Future<Output = Result<HeaderInfo, Self::Error>> + Send;

    fn state(&self, state_id: &BlockId)
        -> impl Future<Output = Result<BeaconState, Self::Error>> + Send;

    /// Headers of all known blocks whose parent is `parent_root`.
    fn headers_by_parent(
        &self,
        parent_root: &Node,
    ) -> impl Future<Output = Result<Vec<HeaderInfo>, Self::Error>> + Send;

    fn genesis_time(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send;

    fn seconds_per_slot(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InMemoryError {
    #[error("Block {0} not found")]
    BlockNotFound(String),

    #[error("State {0} not found")]
    StateNotFound(String),

    #[error(transparent)]
    Merkleization(#[from] ProofError),
}

/// A fixed chain held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    genesis_time: u64,
    seconds_per_slot: u64,
    blocks: Vec<HeaderInfo>,
    states: HashMap<Node, BeaconState>,
    head: Option<Node>,
    finalized: Option<Node>,
}

impl InMemorySource {
    #[must_use]
    pub fn new(genesis_time: u64, seconds_per_slot: u64) -> Self {
        Self {
            genesis_time,
            seconds_per_slot,
            ..Self::default()
        }
    }

    /// Add a canonical block. The latest canonical block becomes the head.
    ///
    /// # Errors
    /// Fails if the header cannot be hashed.
    pub fn insert_block(&mut self, header: BeaconBlockHeader) -> Result<Node, InMemoryError> {
        let root = header.root()?;
        self.blocks.push(HeaderInfo {
            root,
            canonical: true,
            header,
        });
        self.head = Some(root);
        Ok(root)
    }

    /// Add a block that lost fork choice.
    ///
    /// # Errors
    /// Fails if the header cannot be hashed.
    pub fn insert_orphan(&mut self, header: BeaconBlockHeader) -> Result<Node, InMemoryError> {
        let root = header.root()?;
        self.blocks.push(HeaderInfo {
            root,
            canonical: false,
            header,
        });
        Ok(root)
    }

    /// Store a state under its hash tree root.
    ///
    /// # Errors
    /// Fails if the state cannot be hashed.
    pub fn insert_state(&mut self, state: BeaconState) -> Result<Node, InMemoryError> {
        let root = state.root()?;
        self.states.insert(root, state);
        Ok(root)
    }

    pub fn set_finalized(&mut self, root: Node) {
        self.finalized = Some(root);
    }

    fn find_block(&self, block_id: &BlockId) -> Option<&HeaderInfo> {
        let by_root = |root: Option<Node>| {
            root.and_then(|root| self.blocks.iter().find(|b| b.root == root))
        };
        match block_id {
            BlockId::Head => by_root(self.head),
            BlockId::Finalized | BlockId::Justified => by_root(self.finalized),
            BlockId::Genesis => self
                .blocks
                .iter()
                .find(|b| b.canonical && b.header.slot == 0),
            BlockId::Slot(slot) => self
                .blocks
                .iter()
                .find(|b| b.canonical && b.header.slot == *slot),
            BlockId::Root(root) => by_root(Some(*root)),
        }
    }
}

impl DataSource for InMemorySource {
    type Error = InMemoryError;

    async fn block_header(&self, block_id: &BlockId) -> Result<HeaderInfo, Self::Error> {
        self.find_block(block_id)
            .cloned()
            .ok_or_else(|| InMemoryError::BlockNotFound(block_id.to_string()))
    }

    async fn state(&self, state_id: &BlockId) -> Result<BeaconState, Self::Error> {
        let state_root = match state_id {
            BlockId::Root(root) => Some(*root),
            other => self.find_block(other).map(|b| b.header.state_root),
        };
        state_root
            .and_then(|root| self.states.get(&root))
            .cloned()
            .ok_or_else(|| InMemoryError::StateNotFound(state_id.to_string()))
    }

    async fn headers_by_parent(&self, parent_root: &Node) -> Result<Vec<HeaderInfo>, Self::Error> {
        Ok(self
            .blocks
            .iter()
            .filter(|b| b.header.parent_root == *parent_root)
            .cloned()
            .collect())
    }

    async fn genesis_time(&self) -> Result<u64, Self::Error> {
        Ok(self.genesis_time)
    }

    async fn seconds_per_slot(&self) -> Result<u64, Self::Error> {
        Ok(self.seconds_per_slot)
    }
}
