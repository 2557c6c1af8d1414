//! Generalized Index Arithmetic
//!
//! A generalized index (gindex) encodes the position of a node in a binary
//! Merkle tree: the root is 1, the children of `g` are `2g` and `2g + 1`.
//! Reading the bits of a gindex after its leading 1 from most to least
//! significant gives the left/right turns from the root down to the node.

use crate::proof::ProofError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Deepest position representable in a `u64` gindex.
pub const MAX_GINDEX_DEPTH: u32 = 63;

/// Position of a node in a binary Merkle tree. Always `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct GeneralizedIndex(u64);

impl GeneralizedIndex {
    /// The root of a tree.
    pub const ROOT: Self = Self(1);

    /// Wraps a raw gindex.
    ///
    /// # Errors
    /// Returns `InvalidGIndex` for 0.
    pub fn new(value: u64) -> Result<Self, ProofError> {
        if value == 0 {
            return Err(ProofError::InvalidGIndex(value));
        }
        Ok(Self(value))
    }

    /// Gindex of the `index`-th node at `depth`, i.e. `2^depth + index`.
    ///
    /// # Errors
    /// Returns `InvalidGIndex` if the depth is too large or `index` does not
    /// fit at that depth.
    pub fn from_depth_and_index(depth: u32, index: u64) -> Result<Self, ProofError> {
        if depth > MAX_GINDEX_DEPTH || index >> depth != 0 {
            return Err(ProofError::InvalidGIndex(index));
        }
        Ok(Self((1_u64 << depth) | index))
    }

    /// Raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Number of edges between the root and this node, `floor(log2(g))`.
    #[must_use]
    pub const fn depth(self) -> u32 {
        63 - self.0.leading_zeros()
    }

    /// Offset of this node among the nodes at its depth.
    #[must_use]
    pub const fn index_at_depth(self) -> u64 {
        self.0 ^ (1_u64 << self.depth())
    }

    #[must_use]
    pub const fn is_root(self) -> bool {
        self.0 == 1
    }

    /// Whether the node is a left child (even gindex).
    #[must_use]
    pub const fn is_left(self) -> bool {
        self.0 & 1 == 0
    }

    /// The other child of this node's parent, `g ^ 1`.
    ///
    /// # Errors
    /// The root has no sibling.
    pub fn sibling(self) -> Result<Self, ProofError> {
        if self.is_root() {
            return Err(ProofError::InvalidGIndex(self.0));
        }
        Ok(Self(self.0 ^ 1))
    }

    /// The parent of this node, `g >> 1`.
    ///
    /// # Errors
    /// The root has no parent.
    pub fn parent(self) -> Result<Self, ProofError> {
        if self.is_root() {
            return Err(ProofError::InvalidGIndex(self.0));
        }
        Ok(Self(self.0 >> 1))
    }

    /// # Errors
    /// Returns `InvalidGIndex` when the child would not fit in 64 bits.
    pub fn left_child(self) -> Result<Self, ProofError> {
        if self.depth() >= MAX_GINDEX_DEPTH {
            return Err(ProofError::InvalidGIndex(self.0));
        }
        Ok(Self(self.0 << 1))
    }

    /// # Errors
    /// Returns `InvalidGIndex` when the child would not fit in 64 bits.
    pub fn right_child(self) -> Result<Self, ProofError> {
        if self.depth() >= MAX_GINDEX_DEPTH {
            return Err(ProofError::InvalidGIndex(self.0));
        }
        Ok(Self((self.0 << 1) | 1))
    }

    /// Navigate to `self`, then to `inner` relative to the node found there.
    ///
    /// The inner index loses its leading 1-bit and its remaining bits are
    /// appended to `self`: `self * 2^depth(inner) + (inner - 2^depth(inner))`.
    ///
    /// # Errors
    /// Returns `GIndexOverflow` if the combined depth exceeds 63.
    pub fn concat(self, inner: Self) -> Result<Self, ProofError> {
        let depth = inner.depth();
        if self.depth() + depth > MAX_GINDEX_DEPTH {
            return Err(ProofError::GIndexOverflow {
                outer: self.0,
                inner: inner.0,
            });
        }
        Ok(Self((self.0 << depth) | inner.index_at_depth()))
    }

    /// Concatenate generalized indices along a path, folding left to right.
    ///
    /// An empty path yields the root.
    ///
    /// # Errors
    /// Returns `GIndexOverflow` if the path is deeper than 63 levels.
    pub fn concat_all<I>(gindices: I) -> Result<Self, ProofError>
    where
        I: IntoIterator<Item = Self>,
    {
        gindices
            .into_iter()
            .try_fold(Self::ROOT, |acc, g| acc.concat(g))
    }

    /// Turns from the root down to this node; `true` means "go right".
    pub fn path_bits(self) -> impl Iterator<Item = bool> {
        let depth = self.depth();
        (0..depth).rev().map(move |bit| (self.0 >> bit) & 1 == 1)
    }

    /// Gindices of the siblings along the path from this node to the root,
    /// deepest first. This is the witness order of a single proof.
    #[must_use]
    pub fn branch_indices(self) -> Vec<Self> {
        let mut out = Vec::with_capacity(self.depth() as usize);
        let mut current = self.0;
        while current > 1 {
            out.push(Self(current ^ 1));
            current >>= 1;
        }
        out
    }

    /// Gindices on the path from this node up to, but excluding, the root.
    #[must_use]
    pub fn path_indices(self) -> Vec<Self> {
        let mut out = Vec::with_capacity(self.depth() as usize);
        let mut current = self.0;
        while current > 1 {
            out.push(Self(current));
            current >>= 1;
        }
        out
    }
}

/// Gindices of all extra nodes needed to prove the given nodes together,
/// in decreasing order.
///
/// For a single index this is exactly [`GeneralizedIndex::branch_indices`].
#[must_use]
pub fn helper_indices(indices: &[GeneralizedIndex]) -> Vec<GeneralizedIndex> {
    let mut helpers = BTreeSet::new();
    let mut on_path = BTreeSet::new();
    for index in indices {
        helpers.extend(index.branch_indices());
        on_path.extend(index.path_indices());
    }
    let mut out: Vec<_> = helpers.difference(&on_path).copied().collect();
    out.reverse();
    out
}

/// Check that no gindex in `indices` is an ancestor or duplicate of another.
///
/// A multiproof over such a set would never fold the deeper node into its
/// ancestor, leaving the deeper leaf unchecked.
///
/// # Errors
/// `OverlappingTargets` naming the first offending pair.
pub fn check_independent(indices: &[GeneralizedIndex]) -> Result<(), ProofError> {
    let mut seen = BTreeSet::new();
    for index in indices {
        if !seen.insert(*index) {
            return Err(ProofError::OverlappingTargets {
                ancestor: index.get(),
                descendant: index.get(),
            });
        }
    }
    for index in indices {
        let mut current = index.get() >> 1;
        while current >= 1 {
            if seen.contains(&GeneralizedIndex(current)) {
                return Err(ProofError::OverlappingTargets {
                    ancestor: current,
                    descendant: index.get(),
                });
            }
            current >>= 1;
        }
    }
    Ok(())
}

impl TryFrom<u64> for GeneralizedIndex {
    type Error = ProofError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GeneralizedIndex> for u64 {
    fn from(g: GeneralizedIndex) -> Self {
        g.0
    }
}

impl fmt::Display for GeneralizedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(value: u64) -> GeneralizedIndex {
        GeneralizedIndex::new(value).unwrap()
    }

    #[test]
    fn test_zero_is_rejected() {
        assert!(matches!(
            GeneralizedIndex::new(0),
            Err(ProofError::InvalidGIndex(0))
        ));
        assert!(GeneralizedIndex::try_from(0_u64).is_err());
    }

    #[test]
    fn test_gindex_depth() {
        assert_eq!(g(1).depth(), 0); // root
        assert_eq!(g(2).depth(), 1);
        assert_eq!(g(3).depth(), 1);
        assert_eq!(g(4).depth(), 2);
        assert_eq!(g(7).depth(), 2);
        assert_eq!(g(8).depth(), 3);
        assert_eq!(g(u64::MAX).depth(), 63);
    }

    #[test]
    fn test_sibling_and_parent() {
        assert_eq!(g(6).sibling().unwrap(), g(7));
        assert_eq!(g(7).sibling().unwrap(), g(6));
        assert_eq!(g(6).parent().unwrap(), g(3));
        assert_eq!(g(7).parent().unwrap(), g(3));
        assert!(GeneralizedIndex::ROOT.sibling().is_err());
        assert!(GeneralizedIndex::ROOT.parent().is_err());
    }

    #[test]
    fn test_children() {
        assert_eq!(g(3).left_child().unwrap(), g(6));
        assert_eq!(g(3).right_child().unwrap(), g(7));
        assert!(g(1 << 63).left_child().is_err());
    }

    #[test]
    fn test_from_depth_and_index() {
        assert_eq!(GeneralizedIndex::from_depth_and_index(0, 0).unwrap(), g(1));
        assert_eq!(GeneralizedIndex::from_depth_and_index(2, 2).unwrap(), g(6));
        assert_eq!(
            GeneralizedIndex::from_depth_and_index(40, 5).unwrap(),
            g((1 << 40) + 5)
        );
        assert!(GeneralizedIndex::from_depth_and_index(2, 4).is_err());
        assert!(GeneralizedIndex::from_depth_and_index(64, 0).is_err());
    }

    #[test]
    fn test_concat_gindices_simple() {
        // Single gindex returns itself
        assert_eq!(GeneralizedIndex::concat_all([g(11)]).unwrap(), g(11));
        assert_eq!(GeneralizedIndex::concat_all([]).unwrap(), g(1));
    }

    #[test]
    fn test_concat_with_root_is_identity() {
        for value in [1, 2, 3, 11, 75, 1 << 40] {
            assert_eq!(GeneralizedIndex::ROOT.concat(g(value)).unwrap(), g(value));
            assert_eq!(g(value).concat(GeneralizedIndex::ROOT).unwrap(), g(value));
        }
    }

    #[test]
    fn test_concat_gindices_two_levels() {
        // Going to gindex 2, then to its left child (gindex 2 relative to that subtree)
        assert_eq!(g(2).concat(g(2)).unwrap(), g(4));
        // Going to gindex 2, then to its right child (gindex 3)
        assert_eq!(g(2).concat(g(3)).unwrap(), g(5));
        // header.state_root (11) -> state.validators (75)
        assert_eq!(g(11).concat(g(75)).unwrap(), g(0b1011_001011));
    }

    #[test]
    fn test_concat_is_associative() {
        let (a, b, c) = (g(11), g(75), g(2));
        assert_eq!(
            a.concat(b).unwrap().concat(c).unwrap(),
            a.concat(b.concat(c).unwrap()).unwrap()
        );
    }

    #[test]
    fn test_concat_overflow() {
        let deep = g(1 << 40);
        assert!(matches!(
            deep.concat(deep),
            Err(ProofError::GIndexOverflow { .. })
        ));
    }

    #[test]
    fn test_path_bits() {
        // 6 = 0b110: right, left
        let bits: Vec<bool> = g(6).path_bits().collect();
        assert_eq!(bits, vec![true, false]);
        assert_eq!(GeneralizedIndex::ROOT.path_bits().count(), 0);
    }

    #[test]
    fn test_branch_and_path_indices() {
        assert_eq!(g(6).branch_indices(), vec![g(7), g(2)]);
        assert_eq!(g(6).path_indices(), vec![g(6), g(3)]);
        assert!(GeneralizedIndex::ROOT.branch_indices().is_empty());
    }

    #[test]
    fn test_helper_indices_single_matches_branch() {
        assert_eq!(helper_indices(&[g(13)]), g(13).branch_indices());
    }

    #[test]
    fn test_helper_indices_shared_siblings() {
        // Proving 4 and 5 together: each is the other's sibling, only 3 is needed
        assert_eq!(helper_indices(&[g(4), g(5)]), vec![g(3)]);
        // Proving 4 and 7: need 5 and 6, in decreasing order
        assert_eq!(helper_indices(&[g(4), g(7)]), vec![g(6), g(5)]);
    }

    #[test]
    fn test_check_independent() {
        check_independent(&[g(4), g(7), g(5)]).unwrap();
        check_independent(&[GeneralizedIndex::ROOT]).unwrap();
        assert_eq!(
            check_independent(&[g(8), g(2)]),
            Err(ProofError::OverlappingTargets {
                ancestor: 2,
                descendant: 8
            })
        );
        assert_eq!(
            check_independent(&[g(6), g(6)]),
            Err(ProofError::OverlappingTargets {
                ancestor: 6,
                descendant: 6
            })
        );
        assert!(check_independent(&[g(5), GeneralizedIndex::ROOT]).is_err());
    }

    #[test]
    fn test_serde_roundtrip_rejects_zero() {
        let json = serde_json::to_string(&g(75)).unwrap();
        assert_eq!(json, "75");
        let decoded: GeneralizedIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, g(75));
        assert!(serde_json::from_str::<GeneralizedIndex>("0").is_err());
    }
}
