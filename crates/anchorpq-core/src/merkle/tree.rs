//! Deterministic binary Merkle tree with proof extraction.
//!
//! Construction rules:
//! 1. Pair adjacent hashes left-to-right.
//! 2. A level with an odd count pairs its final node with itself.
//! 3. `parent = H(left ‖ right)` under the configured digest family.
//! 4. Repeat until a single root remains.
//!
//! The tree is immutable once built and retains every level so that
//! membership proofs can be extracted without recomputation.

use thiserror::Error;

use super::hash::{self, HashAlgorithm};

/// Errors from tree construction and proof extraction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MerkleError {
    /// A tree cannot be built from zero leaves.
    #[error("cannot build a Merkle tree from an empty leaf sequence")]
    EmptyInput,

    /// The requested leaf index does not exist.
    #[error("leaf index {index} out of range for {leaf_count} leaves")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of leaves in the tree.
        leaf_count: usize,
    },
}

/// Which side of the current node a proof sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Sibling is the left operand of the combining hash.
    Left,
    /// Sibling is the right operand of the combining hash.
    Right,
}

/// One step of a membership proof: a sibling hash and its side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofNode {
    /// The sibling's hash at this level.
    pub sibling_hash: Vec<u8>,
    /// Side the sibling occupies in the combining hash.
    pub side: Side,
}

/// An immutable Merkle tree over an ordered, non-empty leaf sequence.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    algorithm: HashAlgorithm,
    levels: Vec<Vec<Vec<u8>>>,
}

impl MerkleTree {
    /// Builds the tree, fully computing every level.
    ///
    /// # Errors
    ///
    /// Returns [`MerkleError::EmptyInput`] when `leaf_hashes` is empty.
    pub fn new(leaf_hashes: Vec<Vec<u8>>, algorithm: HashAlgorithm) -> Result<Self, MerkleError> {
        if leaf_hashes.is_empty() {
            return Err(MerkleError::EmptyInput);
        }

        let mut levels = vec![leaf_hashes];
        while levels.last().map_or(0, Vec::len) > 1 {
            let current = levels.last().map_or(&[][..], Vec::as_slice);
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let left = &pair[0];
                // Odd level: the final node pairs with itself.
                let right = pair.get(1).unwrap_or(left);
                next.push(hash::hash_concat(left, right, algorithm));
            }
            levels.push(next);
        }

        Ok(Self { algorithm, levels })
    }

    /// Returns the root hash.
    #[must_use]
    pub fn root(&self) -> &[u8] {
        // Construction guarantees a final single-node level.
        &self.levels[self.levels.len() - 1][0]
    }

    /// Returns the root as a lowercase hex string.
    #[must_use]
    pub fn root_hex(&self) -> String {
        hash::to_hex(self.root())
    }

    /// Number of leaves the tree was built from.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Number of levels, leaves included.
    #[must_use]
    pub fn height(&self) -> usize {
        self.levels.len()
    }

    /// Digest family the tree was built under.
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Extracts the membership proof for the leaf at `leaf_index`.
    ///
    /// At each level, an even index takes the node at `index + 1` as a
    /// `Right` sibling (or itself when that node does not exist,
    /// mirroring the odd-pairing rule); an odd index takes `index - 1`
    /// as a `Left` sibling.
    ///
    /// # Errors
    ///
    /// Returns [`MerkleError::IndexOutOfRange`] for an invalid index.
    pub fn proof(&self, leaf_index: usize) -> Result<Vec<ProofNode>, MerkleError> {
        let leaf_count = self.leaf_count();
        if leaf_index >= leaf_count {
            return Err(MerkleError::IndexOutOfRange {
                index: leaf_index,
                leaf_count,
            });
        }

        let mut proof = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut index = leaf_index;

        for level in &self.levels[..self.levels.len() - 1] {
            let (sibling_index, side) = if index % 2 == 0 {
                (usize::min(index + 1, level.len() - 1), Side::Right)
            } else {
                (index - 1, Side::Left)
            };
            proof.push(ProofNode {
                sibling_hash: level[sibling_index].clone(),
                side,
            });
            index /= 2;
        }

        Ok(proof)
    }
}

/// Walks a membership proof from `leaf` and compares the reconstructed
/// root against `expected_root` in constant time.
#[must_use]
pub fn verify_proof(
    leaf: &[u8],
    proof: &[ProofNode],
    expected_root: &[u8],
    algorithm: HashAlgorithm,
) -> bool {
    let mut current = leaf.to_vec();
    for node in proof {
        current = match node.side {
            Side::Left => hash::hash_concat(&node.sibling_hash, &current, algorithm),
            Side::Right => hash::hash_concat(&current, &node.sibling_hash, algorithm),
        };
    }
    hash::constant_time_equals(&current, expected_root)
}
