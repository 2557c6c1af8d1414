//! Hashing primitives for SSZ Merkle trees.
//!
//! Every node in the tree is a 32-byte SHA-256 digest. Parents are the hash
//! of their two children concatenated; all-zero subtrees collapse to
//! precomputed "zero hashes".

use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// A 32-byte tree node.
pub type Node = [u8; 32];

/// Width of a chunk in bytes.
pub const BYTES_PER_CHUNK: usize = 32;

/// Deepest subtree a zero hash is precomputed for.
pub const MAX_DEPTH: usize = 64;

/// SHA-256 of two 32-byte nodes.
#[must_use]
pub fn hash_pair(left: &Node, right: &Node) -> Node {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

fn zero_hashes() -> &'static [Node; MAX_DEPTH + 1] {
    static ZERO_HASHES: OnceLock<[Node; MAX_DEPTH + 1]> = OnceLock::new();
    ZERO_HASHES.get_or_init(|| {
        let mut hashes = [[0u8; 32]; MAX_DEPTH + 1];
        for i in 1..=MAX_DEPTH {
            hashes[i] = hash_pair(&hashes[i - 1], &hashes[i - 1]);
        }
        hashes
    })
}

/// Root of a subtree of the given depth whose leaves are all zero.
///
/// `zero_hash(0)` is the zero chunk itself.
///
/// # Panics
/// Panics if `depth` exceeds [`MAX_DEPTH`].
#[must_use]
pub fn zero_hash(depth: u32) -> Node {
    zero_hashes()[depth as usize]
}

/// Little-endian chunk holding a single `u64`.
#[must_use]
pub fn uint64_chunk(value: u64) -> Node {
    let mut chunk = [0u8; 32];
    chunk[..8].copy_from_slice(&value.to_le_bytes());
    chunk
}

/// Right-pads a byte string of at most one chunk.
#[must_use]
pub fn bytes_chunk(bytes: &[u8]) -> Node {
    let mut chunk = [0u8; 32];
    let len = bytes.len().min(BYTES_PER_CHUNK);
    chunk[..len].copy_from_slice(&bytes[..len]);
    chunk
}

/// Packs `u64` values four to a chunk, as SSZ does for basic lists.
#[must_use]
pub fn pack_uint64s(values: &[u64]) -> Vec<Node> {
    values
        .chunks(BYTES_PER_CHUNK / 8)
        .map(|group| {
            let mut chunk = [0u8; 32];
            for (i, v) in group.iter().enumerate() {
                chunk[i * 8..(i + 1) * 8].copy_from_slice(&v.to_le_bytes());
            }
            chunk
        })
        .collect()
}

/// Packs raw bytes 32 to a chunk, zero padding the last one.
#[must_use]
pub fn pack_bytes(bytes: &[u8]) -> Vec<Node> {
    bytes.chunks(BYTES_PER_CHUNK).map(bytes_chunk).collect()
}

/// Mix in the length for a List's Merkle root.
/// `list_root = hash(data_root, length_as_le_bytes32)`
#[must_use]
pub fn mix_in_length(data_root: &Node, length: u64) -> Node {
    hash_pair(data_root, &uint64_chunk(length))
}

/// Renders a node as a `0x`-prefixed lowercase hex string.
#[must_use]
pub fn to_hex(node: &Node) -> String {
    format!("0x{}", hex::encode(node))
}

/// Parses a 32-byte hex string, with or without the `0x` prefix.
///
/// # Errors
/// Returns a message if the input is not valid hex or not 32 bytes long.
pub fn parse_hex32(s: &str) -> Result<Node, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| format!("Invalid hex: {e}"))?;
    bytes
        .try_into()
        .map_err(|_| "Expected 32 bytes".to_string())
}
