//! Proof request orchestration.
//!
//! [`Prover`] turns a block id and a path into a self-verified
//! [`ProofArtifact`]: it fetches the header (and the state when the path
//! crosses `state_root`), builds the focused header tree with the state tree
//! grafted in, proves the target node and stamps the artifact with the time
//! at which the block root becomes available to consumers.

use crate::beacon_client::BeaconClientError;
use crate::config::ChainConfig;
use crate::hash::{to_hex, Node};
use crate::merkleize::Merkleize;
use crate::path::{resolve, PathError, PathSpec, ResolvedPath};
use crate::proof::{build_proof, ProofArtifact, ProofError};
use crate::schema::BEACON_BLOCK_HEADER;
use crate::source::{BlockId, DataSource, HeaderInfo, InMemoryError};
use crate::tree::{graft, Tree};
use crate::types::BeaconState;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors surfaced to callers of [`Prover`].
#[derive(Debug, Error)]
pub enum ProverError {
    #[error("Data source unavailable: {0}")]
    SourceUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("No descendant of block {} is known yet", to_hex(.root))]
    NoDescendantBlock { root: Node },

    #[error("Block {} has {count} competing children", to_hex(.root))]
    AmbiguousDescendant { root: Node, count: usize },

    #[error("Inconsistent snapshot: expected {what} {}, got {}", to_hex(.expected), to_hex(.actual))]
    InconsistentSnapshot {
        what: &'static str,
        expected: Node,
        actual: Node,
    },

    #[error("Timestamp of slot {slot} overflows")]
    TimestampOverflow { slot: u64 },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Proof(#[from] ProofError),
}

impl ProverError {
    fn unavailable<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::SourceUnavailable(Box::new(err))
    }

    /// Whether the source answered that the block or state does not exist,
    /// as opposed to failing to answer.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        let Self::SourceUnavailable(err) = self else {
            return false;
        };
        matches!(
            err.downcast_ref::<BeaconClientError>(),
            Some(BeaconClientError::NotFound(_))
        ) || matches!(
            err.downcast_ref::<InMemoryError>(),
            Some(InMemoryError::BlockNotFound(_) | InMemoryError::StateNotFound(_))
        )
    }
}

/// A request for one value of one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequest {
    pub block_id: BlockId,
    /// Path from the block header, e.g. `state_root/validators/0/slashed`.
    pub path: PathSpec,
}

/// Header and (optionally) state of one block.
struct Snapshot {
    info: HeaderInfo,
    state: Option<BeaconState>,
}

/// Builds proofs from a [`DataSource`].
#[derive(Debug)]
pub struct Prover<S> {
    source: S,
    config: ChainConfig,
}

impl<S: DataSource> Prover<S> {
    #[must_use]
    pub const fn new(source: S, config: ChainConfig) -> Self {
        Self { source, config }
    }

    /// Create a prover, reading the chain config from `source`.
    ///
    /// # Errors
    /// Returns `SourceUnavailable` if the config cannot be fetched.
    pub async fn connect(source: S) -> Result<Self, ProverError> {
        let config = ChainConfig::fetch(&source)
            .await
            .map_err(ProverError::unavailable)?;
        Ok(Self::new(source, config))
    }

    #[must_use]
    pub const fn config(&self) -> &ChainConfig {
        &self.config
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Prove one value.
    ///
    /// # Errors
    /// Any [`ProverError`]; a proof that fails its own verification is
    /// reported as `Proof`.
    #[instrument(skip(self, request), fields(block_id = %request.block_id, path = %request.path))]
    pub async fn prove(&self, request: &ProofRequest) -> Result<ProofArtifact, ProverError> {
        let mut artifacts = self
            .prove_all(&request.block_id, std::slice::from_ref(&request.path))
            .await?;
        artifacts
            .pop()
            .ok_or(ProverError::Path(PathError::Empty))
    }

    /// Prove several values of the same block from a single snapshot.
    ///
    /// # Errors
    /// Fails on the first path that cannot be proven.
    #[instrument(skip(self, paths), fields(block_id = %block_id, paths = paths.len()))]
    pub async fn prove_all(
        &self,
        block_id: &BlockId,
        paths: &[PathSpec],
    ) -> Result<Vec<ProofArtifact>, ProverError> {
        let resolved = paths
            .iter()
            .map(|path| resolve(&BEACON_BLOCK_HEADER, path))
            .collect::<Result<Vec<_>, _>>()?;
        let needs_state = resolved.iter().any(|r| r.link.is_some());

        let snapshot = self.snapshot(block_id, needs_state).await?;
        let header_root = snapshot.info.header.root()?;
        if header_root != snapshot.info.root {
            return Err(ProverError::InconsistentSnapshot {
                what: "block root",
                expected: snapshot.info.root,
                actual: header_root,
            });
        }
        let timestamp = self.timestamp(&header_root).await?;

        paths
            .iter()
            .zip(resolved)
            .map(|(path, resolved)| {
                build_artifact(&snapshot, header_root, timestamp, path, &resolved)
            })
            .collect()
    }

    /// Time at which the root of block `block_root` becomes available to
    /// consumers: the timestamp of the block built on top of it.
    ///
    /// # Errors
    /// `NoDescendantBlock` if no child is known, `AmbiguousDescendant` if
    /// no child can be singled out.
    #[instrument(skip(self, block_root), fields(block_root = %to_hex(block_root)))]
    pub async fn timestamp(&self, block_root: &Node) -> Result<u64, ProverError> {
        let children = self
            .source
            .headers_by_parent(block_root)
            .await
            .map_err(ProverError::unavailable)?;
        let child = select_descendant(block_root, children)?;
        debug!(slot = child.header.slot, "selected descendant");
        self.config
            .slot_timestamp(child.header.slot)
            .ok_or(ProverError::TimestampOverflow {
                slot: child.header.slot,
            })
    }

    async fn snapshot(&self, block_id: &BlockId, needs_state: bool) -> Result<Snapshot, ProverError> {
        if !needs_state {
            let info = self
                .source
                .block_header(block_id)
                .await
                .map_err(ProverError::unavailable)?;
            return Ok(Snapshot { info, state: None });
        }

        let (info, state) = match block_id {
            // As a state id a root names a state, so go through the header.
            BlockId::Root(_) => {
                let info = self
                    .source
                    .block_header(block_id)
                    .await
                    .map_err(ProverError::unavailable)?;
                let state = self
                    .source
                    .state(&BlockId::Root(info.header.state_root))
                    .await
                    .map_err(ProverError::unavailable)?;
                (info, state)
            }
            _ => tokio::try_join!(
                self.source.block_header(block_id),
                self.source.state(block_id)
            )
            .map_err(ProverError::unavailable)?,
        };
        Ok(Snapshot {
            info,
            state: Some(state),
        })
    }
}

fn build_artifact(
    snapshot: &Snapshot,
    header_root: Node,
    timestamp: u64,
    path: &PathSpec,
    resolved: &ResolvedPath,
) -> Result<ProofArtifact, ProverError> {
    let header = &snapshot.info.header;
    let mut tree = header.merkle_tree(path.steps()).map_err(out_of_range)?;

    if let Some(link) = &resolved.link {
        let state = snapshot.state.as_ref().ok_or(ProofError::InvalidGraftTarget(link.at.get()))?;
        let state_tree: Tree = state.merkle_tree(&link.focus).map_err(out_of_range)?;
        if state_tree.root() != header.state_root {
            return Err(ProverError::InconsistentSnapshot {
                what: "state root",
                expected: header.state_root,
                actual: state_tree.root(),
            });
        }
        tree = graft(&tree, link.at, &state_tree)?;
    }

    let proof = build_proof(&tree, resolved.gindex)?;
    proof.verify(&header_root)?;
    info!(
        path = %path,
        gindex = %resolved.gindex,
        witnesses = proof.witnesses.len(),
        "Proof generated"
    );

    Ok(ProofArtifact {
        path: path.to_string(),
        slot: header.slot,
        timestamp,
        root_hash: header_root,
        target_gindex: resolved.gindex,
        leaf: proof.leaf,
        leaf_value: resolved.leaf_kind.decode(&proof.leaf, resolved.offset),
        witnesses: proof.witnesses,
    })
}

/// Pick the child block whose timestamp stands for the parent's.
///
/// A single canonical child wins. Without one, a lone child is used;
/// several competing children cannot be told apart.
fn select_descendant(root: &Node, children: Vec<HeaderInfo>) -> Result<HeaderInfo, ProverError> {
    let mut canonical = children.iter().filter(|c| c.canonical);
    if let (Some(child), None) = (canonical.next(), canonical.next()) {
        return Ok(child.clone());
    }
    let count = children.len();
    let mut children = children.into_iter();
    match (children.next(), count) {
        (None, _) => Err(ProverError::NoDescendantBlock { root: *root }),
        (Some(child), 1) => Ok(child),
        (Some(_), count) => Err(ProverError::AmbiguousDescendant { root: *root, count }),
    }
}

/// A list index past the actual length is a bad request, not a broken tree.
fn out_of_range(err: ProofError) -> ProverError {
    match err {
        ProofError::ElementOutOfRange { index, length } => {
            ProverError::Path(PathError::IndexOutOfRange {
                index,
                bound: length,
            })
        }
        other => ProverError::Proof(other),
    }
}
