//! Persistent Merkle Tree
//!
//! An immutable binary hash tree addressable by generalized index. Nodes are
//! shared through `Arc`, so [`Tree::set`] copies only the path from the root
//! to the replaced node and every other subtree is shared with the original.
//! Trees are `Send + Sync` snapshots and can be read concurrently.
//!
//! Subtrees whose leaves are all zero are stored as a single
//! [`TreeNode::Zero`] marker. A `List<Validator, 2^40>` with a thousand
//! entries therefore costs memory proportional to its length, the same
//! virtual padding consensus clients use.

use crate::gindex::GeneralizedIndex;
use crate::hash::{hash_pair, mix_in_length, uint64_chunk, zero_hash, Node, MAX_DEPTH};
use crate::proof::ProofError;
use std::sync::Arc;

#[derive(Debug)]
enum TreeNode {
    /// A 32-byte chunk with no addressable children.
    Leaf(Node),
    /// An all-zero subtree of the given depth.
    Zero(u32),
    Branch {
        hash: Node,
        left: Arc<TreeNode>,
        right: Arc<TreeNode>,
    },
}

impl TreeNode {
    fn hash(&self) -> Node {
        match self {
            Self::Leaf(node) => *node,
            Self::Zero(depth) => zero_hash(*depth),
            Self::Branch { hash, .. } => *hash,
        }
    }

    fn branch(left: Arc<Self>, right: Arc<Self>) -> Arc<Self> {
        let hash = hash_pair(&left.hash(), &right.hash());
        Arc::new(Self::Branch { hash, left, right })
    }

    /// Children of an inner node; `None` for leaves.
    fn children(self: &Arc<Self>) -> Option<(Arc<Self>, Arc<Self>)> {
        match self.as_ref() {
            Self::Leaf(_) | Self::Zero(0) => None,
            Self::Zero(depth) => {
                let child = Arc::new(Self::Zero(depth - 1));
                Some((Arc::clone(&child), child))
            }
            Self::Branch { left, right, .. } => Some((Arc::clone(left), Arc::clone(right))),
        }
    }
}

/// Immutable Merkle tree snapshot.
#[derive(Debug, Clone)]
pub struct Tree {
    root: Arc<TreeNode>,
}

impl Tree {
    /// A single-node tree.
    #[must_use]
    pub fn leaf(node: Node) -> Self {
        Self {
            root: Arc::new(TreeNode::Leaf(node)),
        }
    }

    /// A tree of the given depth whose leaves are all zero.
    ///
    /// # Errors
    /// Returns `TooManyLeaves` if the depth exceeds the supported maximum.
    pub fn zero(depth: u32) -> Result<Self, ProofError> {
        if depth as usize > MAX_DEPTH {
            return Err(ProofError::TooManyLeaves { count: 0, depth });
        }
        Ok(Self {
            root: Arc::new(TreeNode::Zero(depth)),
        })
    }

    /// A tree whose root has `left` and `right` as children.
    #[must_use]
    pub fn branch(left: &Self, right: &Self) -> Self {
        Self {
            root: TreeNode::branch(Arc::clone(&left.root), Arc::clone(&right.root)),
        }
    }

    /// Merkleize `leaves` into a tree with `2^depth` leaf slots, padding the
    /// unused slots with zero subtrees.
    ///
    /// # Errors
    /// Returns `TooManyLeaves` if the leaves do not fit at that depth.
    pub fn from_leaves(leaves: &[Node], depth: u32) -> Result<Self, ProofError> {
        let capacity = 1_u128.checked_shl(depth).unwrap_or(0);
        if depth as usize > MAX_DEPTH || leaves.len() as u128 > capacity {
            return Err(ProofError::TooManyLeaves {
                count: leaves.len(),
                depth,
            });
        }
        Ok(Self {
            root: build_subtree(leaves, depth),
        })
    }

    /// Merkleize already-built subtrees, e.g. the fields of a container.
    ///
    /// The subtrees are placed left to right at `depth`, the remaining slots
    /// are zero.
    ///
    /// # Errors
    /// Returns `TooManyLeaves` if the subtrees do not fit at that depth.
    pub fn from_subtrees(subtrees: &[Self], depth: u32) -> Result<Self, ProofError> {
        let capacity = 1_u128.checked_shl(depth).unwrap_or(0);
        if depth as usize > MAX_DEPTH || subtrees.len() as u128 > capacity {
            return Err(ProofError::TooManyLeaves {
                count: subtrees.len(),
                depth,
            });
        }
        let nodes: Vec<Arc<TreeNode>> = subtrees.iter().map(|t| Arc::clone(&t.root)).collect();
        Ok(Self {
            root: combine_subtrees(&nodes, depth),
        })
    }

    /// Tree of an SSZ container: one subtree per field, padded to the next
    /// power of two.
    ///
    /// # Errors
    /// Returns `TooManyLeaves` for containers with more than 2^63 fields.
    pub fn container(fields: &[Self]) -> Result<Self, ProofError> {
        Self::from_subtrees(fields, ceil_log2(fields.len() as u64))
    }

    /// Tree of an SSZ list: `data` (the padded element tree) on the left,
    /// the length chunk on the right.
    #[must_use]
    pub fn list(data: &Self, length: u64) -> Self {
        let tree = Self::branch(data, &Self::leaf(uint64_chunk(length)));
        debug_assert_eq!(tree.root(), mix_in_length(&data.root(), length));
        tree
    }

    /// Root hash of the tree.
    #[must_use]
    pub fn root(&self) -> Node {
        self.root.hash()
    }

    /// Node at `gindex`.
    ///
    /// # Errors
    /// Returns `NodeNotFound` if the path runs below a leaf.
    pub fn get(&self, gindex: GeneralizedIndex) -> Result<Node, ProofError> {
        self.subtree(gindex).map(|tree| tree.root())
    }

    /// Whether `gindex` addresses a node of this tree.
    #[must_use]
    pub fn contains(&self, gindex: GeneralizedIndex) -> bool {
        self.subtree(gindex).is_ok()
    }

    /// The subtree rooted at `gindex`, sharing storage with `self`.
    ///
    /// # Errors
    /// Returns `NodeNotFound` if the path runs below a leaf.
    pub fn subtree(&self, gindex: GeneralizedIndex) -> Result<Self, ProofError> {
        let mut node = Arc::clone(&self.root);
        for go_right in gindex.path_bits() {
            let (left, right) = node
                .children()
                .ok_or(ProofError::NodeNotFound(gindex.get()))?;
            node = if go_right { right } else { left };
        }
        Ok(Self { root: node })
    }

    /// A new tree with the node at `gindex` replaced by `subtree`.
    ///
    /// Only the nodes on the path to `gindex` are rebuilt; `self` is left
    /// untouched.
    ///
    /// # Errors
    /// Returns `NodeNotFound` if the path runs below a leaf.
    pub fn set(&self, gindex: GeneralizedIndex, subtree: &Self) -> Result<Self, ProofError> {
        let bits: Vec<bool> = gindex.path_bits().collect();
        let root = replace(&self.root, &bits, &subtree.root)
            .ok_or(ProofError::NodeNotFound(gindex.get()))?;
        Ok(Self { root })
    }
}

/// Graft `inner` into `outer` at `at`, producing a composite tree.
///
/// # Errors
/// Returns `InvalidGraftTarget` if `at` does not address a node of `outer`.
pub fn graft(outer: &Tree, at: GeneralizedIndex, inner: &Tree) -> Result<Tree, ProofError> {
    outer.set(at, inner).map_err(|_| ProofError::InvalidGraftTarget(at.get()))
}

fn replace(node: &Arc<TreeNode>, bits: &[bool], new: &Arc<TreeNode>) -> Option<Arc<TreeNode>> {
    let Some((&go_right, rest)) = bits.split_first() else {
        return Some(Arc::clone(new));
    };
    let (left, right) = node.children()?;
    Some(if go_right {
        TreeNode::branch(left, replace(&right, rest, new)?)
    } else {
        TreeNode::branch(replace(&left, rest, new)?, right)
    })
}

fn build_subtree(leaves: &[Node], depth: u32) -> Arc<TreeNode> {
    if leaves.is_empty() {
        return Arc::new(TreeNode::Zero(depth));
    }
    if depth == 0 {
        return Arc::new(TreeNode::Leaf(leaves[0]));
    }
    let half = 1_u128 << (depth - 1);
    let split = if (leaves.len() as u128) < half {
        leaves.len()
    } else {
        half as usize
    };
    let (left, right) = leaves.split_at(split);
    TreeNode::branch(build_subtree(left, depth - 1), build_subtree(right, depth - 1))
}

fn combine_subtrees(nodes: &[Arc<TreeNode>], depth: u32) -> Arc<TreeNode> {
    if nodes.is_empty() {
        return Arc::new(TreeNode::Zero(depth));
    }
    if depth == 0 {
        return Arc::clone(&nodes[0]);
    }
    let half = 1_u128 << (depth - 1);
    let split = if (nodes.len() as u128) < half {
        nodes.len()
    } else {
        half as usize
    };
    let (left, right) = nodes.split_at(split);
    TreeNode::branch(
        combine_subtrees(left, depth - 1),
        combine_subtrees(right, depth - 1),
    )
}

/// Smallest `d` with `2^d >= n` (0 for `n <= 1`).
#[must_use]
pub const fn ceil_log2(n: u64) -> u32 {
    if n <= 1 {
        0
    } else {
        64 - (n - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(value: u64) -> GeneralizedIndex {
        GeneralizedIndex::new(value).unwrap()
    }

    fn four_leaves() -> (Tree, [Node; 4]) {
        let leaves = [[1u8; 32], [2u8; 32], [3u8; 32], [4u8; 32]];
        (Tree::from_leaves(&leaves, 2).unwrap(), leaves)
    }

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(5), 3);
        assert_eq!(ceil_log2(8), 3);
        assert_eq!(ceil_log2(37), 6);
    }

    #[test]
    fn test_four_leaf_root_and_nodes() {
        let (tree, l) = four_leaves();
        let left = hash_pair(&l[0], &l[1]);
        let right = hash_pair(&l[2], &l[3]);
        assert_eq!(tree.root(), hash_pair(&left, &right));
        assert_eq!(tree.get(g(1)).unwrap(), tree.root());
        assert_eq!(tree.get(g(2)).unwrap(), left);
        assert_eq!(tree.get(g(3)).unwrap(), right);
        for (i, leaf) in l.iter().enumerate() {
            assert_eq!(tree.get(g(4 + i as u64)).unwrap(), *leaf);
        }
    }

    #[test]
    fn test_get_below_leaf_fails() {
        let (tree, _) = four_leaves();
        assert!(matches!(tree.get(g(8)), Err(ProofError::NodeNotFound(8))));
        assert!(!tree.contains(g(15)));
        assert!(tree.contains(g(7)));
    }

    #[test]
    fn test_virtual_padding() {
        // 3 actual leaves in a depth-2 tree (4 leaf slots)
        let leaves = [[1u8; 32], [2u8; 32], [3u8; 32]];
        let tree = Tree::from_leaves(&leaves, 2).unwrap();
        let right_subtree = hash_pair(&[3u8; 32], &zero_hash(0));
        assert_eq!(tree.get(g(3)).unwrap(), right_subtree);
        assert_eq!(tree.get(g(7)).unwrap(), [0u8; 32]);
    }

    #[test]
    fn test_large_sparse_tree() {
        // Only 2 leaves, but depth 40 (simulating the validator registry)
        let leaves = [[0xAA; 32], [0xBB; 32]];
        let tree = Tree::from_leaves(&leaves, 40).unwrap();
        let mut expected = hash_pair(&leaves[0], &leaves[1]);
        for depth in 1..40 {
            expected = hash_pair(&expected, &zero_hash(depth));
        }
        assert_eq!(tree.root(), expected);
        // A node deep inside the zero region is still addressable
        let far = GeneralizedIndex::from_depth_and_index(40, 1 << 39).unwrap();
        assert_eq!(tree.get(far).unwrap(), [0u8; 32]);
    }

    #[test]
    fn test_too_many_leaves() {
        let leaves = [[0u8; 32]; 5];
        assert!(matches!(
            Tree::from_leaves(&leaves, 2),
            Err(ProofError::TooManyLeaves { count: 5, depth: 2 })
        ));
    }

    #[test]
    fn test_zero_tree_root() {
        assert_eq!(Tree::zero(5).unwrap().root(), zero_hash(5));
        assert_eq!(Tree::from_leaves(&[], 5).unwrap().root(), zero_hash(5));
        assert!(Tree::zero(65).is_err());
    }

    #[test]
    fn test_set_is_copy_on_write() {
        let (tree, l) = four_leaves();
        let original_root = tree.root();
        let updated = tree.set(g(6), &Tree::leaf([9u8; 32])).unwrap();

        // The original snapshot is untouched
        assert_eq!(tree.root(), original_root);
        assert_eq!(tree.get(g(6)).unwrap(), l[2]);

        assert_eq!(updated.get(g(6)).unwrap(), [9u8; 32]);
        let expected = hash_pair(
            &hash_pair(&l[0], &l[1]),
            &hash_pair(&[9u8; 32], &l[3]),
        );
        assert_eq!(updated.root(), expected);
    }

    #[test]
    fn test_set_inside_zero_subtree() {
        let tree = Tree::zero(3).unwrap();
        let updated = tree.set(g(13), &Tree::leaf([7u8; 32])).unwrap();
        assert_eq!(updated.get(g(13)).unwrap(), [7u8; 32]);
        assert_eq!(updated.get(g(12)).unwrap(), [0u8; 32]);
        assert_eq!(updated.get(g(7)).unwrap(), zero_hash(1));
    }

    #[test]
    fn test_graft_subtree_is_navigable() {
        let (outer, _) = four_leaves();
        let (inner, inner_leaves) = four_leaves();
        let grafted = graft(&outer, g(5), &inner).unwrap();

        assert_eq!(grafted.get(g(5)).unwrap(), inner.root());
        // gindex 6 inside the inner tree, reached through outer slot 5
        let through = g(5).concat(g(6)).unwrap();
        assert_eq!(grafted.get(through).unwrap(), inner_leaves[2]);
    }

    #[test]
    fn test_graft_missing_slot() {
        let (outer, _) = four_leaves();
        let (inner, _) = four_leaves();
        assert!(matches!(
            graft(&outer, g(9), &inner),
            Err(ProofError::InvalidGraftTarget(9))
        ));
    }

    #[test]
    fn test_container_and_list_shapes() {
        let fields: Vec<Tree> = (1..=5u8).map(|i| Tree::leaf([i; 32])).collect();
        let container = Tree::container(&fields).unwrap();
        // 5 fields pad to 8 slots, depth 3
        assert_eq!(container.get(g(8 + 4)).unwrap(), [5u8; 32]);
        assert_eq!(container.get(g(8 + 7)).unwrap(), [0u8; 32]);

        let data = Tree::from_leaves(&[[1u8; 32]], 2).unwrap();
        let list = Tree::list(&data, 1);
        assert_eq!(list.get(g(3)).unwrap(), uint64_chunk(1));
        assert_eq!(list.get(g(2)).unwrap(), data.root());
        assert_eq!(list.root(), mix_in_length(&data.root(), 1));
    }

    #[test]
    fn test_tree_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Tree>();
    }
}
