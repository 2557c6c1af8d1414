//! Path specifications and their resolution to generalized indices.
//!
//! A [`PathSpec`] names a value inside an SSZ object the way a human would,
//! e.g. `state_root/validators/0/withdrawal_credentials`. Resolving it
//! against a [`Container`] schema yields the gindex of the chunk holding the
//! value, how to decode that chunk, and where another object's tree has to
//! be grafted in.

use crate::gindex::GeneralizedIndex;
use crate::hash::Node;
use crate::proof::ProofError;
use crate::schema::{Container, SchemaNode};
use crate::tree::ceil_log2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the step addressing a list's length.
pub const LENGTH_STEP: &str = "__len__";

/// Errors resolving a path against a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Empty path")]
    Empty,

    #[error("Invalid path {path:?}: {reason}")]
    Parse { path: String, reason: String },

    #[error("{container} has no field {field:?}")]
    UnknownField {
        container: &'static str,
        field: String,
    },

    #[error("Expected an element index, found {0:?}")]
    ExpectedIndex(String),

    #[error("Index {index} out of range (bound {bound})")]
    IndexOutOfRange { index: u64, bound: u64 },

    #[error("Cannot descend into a leaf value with step {0:?}")]
    NotTraversable(String),

    #[error("Path is too deep: {0}")]
    GIndexOverflow(#[from] ProofError),
}

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Field(String),
    Index(u64),
    /// The length of a list.
    Length,
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => index.fmt(f),
            Self::Length => f.write_str(LENGTH_STEP),
        }
    }
}

/// A `/`-separated path of field names, element indices and `__len__`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathSpec {
    steps: Vec<PathStep>,
}

impl PathSpec {
    #[must_use]
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    #[must_use]
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// This path followed by `other`.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        let mut steps = self.steps.clone();
        steps.extend(other.steps.iter().cloned());
        Self { steps }
    }
}

impl FromStr for PathSpec {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        let steps = trimmed
            .split('/')
            .map(|part| {
                if part.is_empty() {
                    Err(PathError::Parse {
                        path: s.to_string(),
                        reason: "empty step".to_string(),
                    })
                } else if part == LENGTH_STEP {
                    Ok(PathStep::Length)
                } else if part.bytes().all(|b| b.is_ascii_digit()) {
                    part.parse().map(PathStep::Index).map_err(|e| PathError::Parse {
                        path: s.to_string(),
                        reason: format!("bad index {part:?}: {e}"),
                    })
                } else {
                    Ok(PathStep::Field(part.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }
}

impl TryFrom<String> for PathSpec {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PathSpec> for String {
    fn from(path: PathSpec) -> Self {
        path.to_string()
    }
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            step.fmt(f)?;
        }
        Ok(())
    }
}

/// How to turn the proven chunk back into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    /// Little-endian unsigned integer of the given byte width.
    Uint(usize),
    Bool,
    /// Leading bytes of the chunk.
    Bytes(usize),
    /// The hash tree root of a composite value.
    Root,
}

impl LeafKind {
    fn of(node: &SchemaNode) -> Self {
        match node {
            SchemaNode::Uint(size) => Self::Uint(*size),
            SchemaNode::Bool => Self::Bool,
            SchemaNode::Bytes(size) => Self::Bytes(*size),
            _ => Self::Root,
        }
    }

    /// Decode the value stored at byte `offset` of `node`.
    ///
    /// Integers are decimal strings (as the Beacon API renders them),
    /// booleans are JSON booleans, everything else is `0x` hex.
    #[must_use]
    pub fn decode(&self, node: &Node, offset: usize) -> serde_json::Value {
        match *self {
            Self::Uint(size) => {
                let end = (offset + size).min(node.len());
                serde_json::Value::String(le_bytes_to_decimal(&node[offset.min(end)..end]))
            }
            Self::Bool => serde_json::Value::Bool(node.get(offset).is_some_and(|b| *b != 0)),
            Self::Bytes(size) => {
                serde_json::Value::String(format!("0x{}", hex::encode(&node[..size.min(32)])))
            }
            Self::Root => serde_json::Value::String(crate::hash::to_hex(node)),
        }
    }
}

/// Decimal rendering of an arbitrary-width little-endian integer.
fn le_bytes_to_decimal(bytes: &[u8]) -> String {
    let mut digits: Vec<u8> = Vec::new();
    let mut value: Vec<u8> = bytes.iter().rev().copied().collect();
    while value.iter().any(|b| *b != 0) {
        let mut rem = 0u32;
        for byte in &mut value {
            let acc = (rem << 8) | u32::from(*byte);
            *byte = u8::try_from(acc / 10).unwrap_or(u8::MAX);
            rem = acc % 10;
        }
        digits.push(b'0' + u8::try_from(rem).unwrap_or(0));
    }
    if digits.is_empty() {
        return "0".to_string();
    }
    digits.iter().rev().map(|d| char::from(*d)).collect()
}

/// Where a second object's tree must be grafted into the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPoint {
    /// Gindex of the linking root field within the outer object.
    pub at: GeneralizedIndex,
    pub target: &'static Container,
    /// Remaining steps, relative to the linked object.
    pub focus: Vec<PathStep>,
}

/// A path resolved against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub gindex: GeneralizedIndex,
    pub leaf_kind: LeafKind,
    /// Byte offset of the value within its chunk (packed basic types).
    pub offset: usize,
    pub link: Option<LinkPoint>,
}

/// Resolve `path` starting at a container of type `root`.
///
/// # Errors
/// Any [`PathError`] describing why the path does not name a value.
pub fn resolve(root: &'static Container, path: &PathSpec) -> Result<ResolvedPath, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }

    let mut segments: Vec<GeneralizedIndex> = Vec::with_capacity(path.steps.len() + 1);
    let mut current = SchemaNode::Container(root);
    let mut offset = 0;
    let mut link = None;
    let mut finished = false;

    for (position, step) in path.steps.iter().enumerate() {
        if finished {
            return Err(PathError::NotTraversable(step.to_string()));
        }
        if let SchemaNode::Link(target) = current {
            if link.is_some() {
                return Err(PathError::NotTraversable(step.to_string()));
            }
            link = Some(LinkPoint {
                at: GeneralizedIndex::concat_all(segments.iter().copied())?,
                target,
                focus: path.steps[position..].to_vec(),
            });
            current = SchemaNode::Container(target);
        }

        match current {
            SchemaNode::Container(container) => {
                let PathStep::Field(name) = step else {
                    return Err(PathError::UnknownField {
                        container: container.name,
                        field: step.to_string(),
                    });
                };
                let (index, kind) =
                    container
                        .field(name)
                        .ok_or_else(|| PathError::UnknownField {
                            container: container.name,
                            field: name.clone(),
                        })?;
                let depth = ceil_log2(container.fields.len() as u64);
                segments.push(GeneralizedIndex::from_depth_and_index(depth, index as u64)?);
                current = *kind;
            }
            SchemaNode::Vector { elem, length } => {
                let PathStep::Index(index) = step else {
                    return Err(PathError::ExpectedIndex(step.to_string()));
                };
                if *index >= length {
                    return Err(PathError::IndexOutOfRange {
                        index: *index,
                        bound: length,
                    });
                }
                let (segment, byte_offset) = element_position(elem, length, *index)?;
                segments.push(segment);
                offset = byte_offset;
                finished = elem.packed_size().is_some();
                current = *elem;
            }
            SchemaNode::List { elem, limit } => match step {
                PathStep::Length => {
                    segments.push(GeneralizedIndex::new(3)?);
                    current = SchemaNode::Uint(8);
                    finished = true;
                }
                PathStep::Index(index) => {
                    if *index >= limit {
                        return Err(PathError::IndexOutOfRange {
                            index: *index,
                            bound: limit,
                        });
                    }
                    let (segment, byte_offset) = element_position(elem, limit, *index)?;
                    segments.push(GeneralizedIndex::new(2)?);
                    segments.push(segment);
                    offset = byte_offset;
                    finished = elem.packed_size().is_some();
                    current = *elem;
                }
                PathStep::Field(_) => return Err(PathError::ExpectedIndex(step.to_string())),
            },
            SchemaNode::Uint(_)
            | SchemaNode::Bool
            | SchemaNode::Bytes(_)
            | SchemaNode::Opaque
            | SchemaNode::Link(_) => {
                return Err(PathError::NotTraversable(step.to_string()));
            }
        }
    }

    Ok(ResolvedPath {
        gindex: GeneralizedIndex::concat_all(segments)?,
        leaf_kind: LeafKind::of(&current),
        offset,
        link,
    })
}

/// Gindex of element `index` within the chunk tree of a sequence of
/// `bound` elements, and its byte offset inside that chunk.
fn element_position(
    elem: &SchemaNode,
    bound: u64,
    index: u64,
) -> Result<(GeneralizedIndex, usize), PathError> {
    let (chunk_count, chunk, offset) = match elem.packed_size() {
        Some(size) => {
            let size = size as u64;
            let per_chunk = 32 / size;
            (
                bound.div_ceil(per_chunk),
                index / per_chunk,
                ((index % per_chunk) * size) as usize,
            )
        }
        None => (bound, index, 0),
    };
    let depth = ceil_log2(chunk_count);
    Ok((GeneralizedIndex::from_depth_and_index(depth, chunk)?, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BEACON_BLOCK_HEADER, BEACON_STATE, VALIDATOR};

    fn resolve_state(path: &str) -> ResolvedPath {
        resolve(&BEACON_STATE, &path.parse().unwrap()).unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let path: PathSpec = "state_root/validators/0/__len__".parse().unwrap();
        assert_eq!(
            path.steps(),
            &[
                PathStep::Field("state_root".into()),
                PathStep::Field("validators".into()),
                PathStep::Index(0),
                PathStep::Length,
            ]
        );
        assert_eq!(path.to_string(), "state_root/validators/0/__len__");
        assert_eq!("/slot/".parse::<PathSpec>().unwrap().to_string(), "slot");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<PathSpec>(), Err(PathError::Empty));
        assert!(matches!(
            "a//b".parse::<PathSpec>(),
            Err(PathError::Parse { .. })
        ));
        assert!(matches!(
            "validators/99999999999999999999999".parse::<PathSpec>(),
            Err(PathError::Parse { .. })
        ));
    }

    #[test]
    fn test_join_concatenates_steps() {
        let outer: PathSpec = "state_root".parse().unwrap();
        let inner: PathSpec = "validators/3".parse().unwrap();
        assert_eq!(outer.join(&inner).to_string(), "state_root/validators/3");
    }

    #[test]
    fn test_state_field_gindices() {
        assert_eq!(resolve_state("slot").gindex.get(), 66);
        assert_eq!(resolve_state("validators").gindex.get(), 75);
        assert_eq!(resolve_state("earliest_exit_epoch").gindex.get(), 95);
        assert_eq!(resolve_state("pending_consolidations").gindex.get(), 100);
    }

    #[test]
    fn test_list_length_gindex() {
        let resolved = resolve_state("validators/__len__");
        assert_eq!(resolved.gindex.get(), 75 * 2 + 1);
        assert_eq!(resolved.leaf_kind, LeafKind::Uint(8));
    }

    #[test]
    fn test_validator_field_gindex() {
        // validators (75) -> data (2) -> element 0 at depth 40 -> pubkey (8)
        let resolved = resolve_state("validators/0/pubkey");
        assert_eq!(resolved.gindex.get(), 150 << 43);
        assert_eq!(resolved.leaf_kind, LeafKind::Root);

        let resolved = resolve_state("validators/5/withdrawal_credentials");
        assert_eq!(resolved.gindex.get(), (((150 << 40) | 5) << 3) | 1);
        assert_eq!(resolved.leaf_kind, LeafKind::Bytes(32));
    }

    #[test]
    fn test_packed_element_offset() {
        // balances: 4 u64 per chunk, limit 2^40 -> 2^38 chunks
        let resolved = resolve_state("balances/6");
        assert_eq!(resolved.gindex.get(), ((76 * 2) << 38) | 1);
        assert_eq!(resolved.offset, 16);
        assert_eq!(resolved.leaf_kind, LeafKind::Uint(8));

        // participation flags: 32 per chunk
        let resolved = resolve_state("current_epoch_participation/33");
        assert_eq!(resolved.gindex.get(), ((80 * 2) << 35) | 1);
        assert_eq!(resolved.offset, 1);
    }

    #[test]
    fn test_header_path_crosses_link() {
        let path: PathSpec = "state_root/validators/0/pubkey".parse().unwrap();
        let resolved = resolve(&BEACON_BLOCK_HEADER, &path).unwrap();
        let link = resolved.link.clone().unwrap();
        assert_eq!(link.at.get(), 11);
        assert_eq!(link.target.name, "BeaconState");
        assert_eq!(link.focus, path.steps()[1..].to_vec());

        let in_state = resolve_state("validators/0/pubkey");
        assert_eq!(resolved.gindex, link.at.concat(in_state.gindex).unwrap());
    }

    #[test]
    fn test_header_only_path_has_no_link() {
        let resolved = resolve(&BEACON_BLOCK_HEADER, &"state_root".parse().unwrap()).unwrap();
        assert_eq!(resolved.gindex.get(), 11);
        assert_eq!(resolved.link, None);
        assert_eq!(resolved.leaf_kind, LeafKind::Root);
    }

    #[test]
    fn test_resolution_errors() {
        let err = |path: &str| resolve(&BEACON_STATE, &path.parse().unwrap()).unwrap_err();
        assert!(matches!(err("nope"), PathError::UnknownField { .. }));
        assert!(matches!(err("validators/pubkey"), PathError::ExpectedIndex(_)));
        assert!(matches!(err("slot/0"), PathError::NotTraversable(_)));
        assert!(matches!(err("balances/0/1"), PathError::NotTraversable(_)));
        assert!(matches!(err("validators/__len__/0"), PathError::NotTraversable(_)));
        assert!(matches!(
            err("validators/1099511627776"),
            PathError::IndexOutOfRange { .. }
        ));
        assert!(matches!(err("block_roots/8192"), PathError::IndexOutOfRange { .. }));
        assert!(matches!(err("fork/3"), PathError::UnknownField { .. }));
    }

    #[test]
    fn test_container_schema_root() {
        let resolved = resolve(&VALIDATOR, &"activation_epoch".parse().unwrap()).unwrap();
        assert_eq!(resolved.gindex.get(), 13);
    }

    #[test]
    fn test_decode_leaf_values() {
        let mut chunk = [0u8; 32];
        chunk[8..16].copy_from_slice(&1_606_824_023_u64.to_le_bytes());
        assert_eq!(LeafKind::Uint(8).decode(&chunk, 8), "1606824023");
        assert_eq!(LeafKind::Uint(8).decode(&chunk, 0), "0");
        assert_eq!(LeafKind::Bool.decode(&[1u8; 32], 0), true);
        assert_eq!(
            LeafKind::Bytes(4).decode(&[0xab; 32], 0),
            "0xabababab"
        );
        assert_eq!(
            LeafKind::Uint(32).decode(&[0xff; 32], 0),
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
    }

    #[test]
    fn test_path_spec_serde() {
        let path: PathSpec = serde_json::from_str("\"state_root/slot\"").unwrap();
        assert_eq!(path.steps().len(), 2);
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"state_root/slot\"");
        assert!(serde_json::from_str::<PathSpec>("\"\"").is_err());
    }
}
