//! BLAKE2b-256 Merkle tree over shard shares.
//!
//! Leaves and inner nodes are domain separated so a leaf can never be
//! presented as an inner node.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use shared_types::ShardIndex;

type Blake2b256 = Blake2b<U32>;

pub type Hash = [u8; 32];

const LEAF_TAG: u8 = 0x00;
const NODE_TAG: u8 = 0x01;

pub fn leaf_hash(index: ShardIndex, share: &[u8]) -> Hash {
    let mut hasher = Blake2b256::new();
    hasher.update([LEAF_TAG]);
    hasher.update(index.to_be_bytes());
    hasher.update(share);
    hasher.finalize().into()
}

pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Blake2b256::new();
    hasher.update([NODE_TAG]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Domain-separated digest of arbitrary parts.
pub fn tagged_hash(tag: &[u8], parts: &[&[u8]]) -> Hash {
    let mut hasher = Blake2b256::new();
    hasher.update(tag);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Complete tree; `layers[0]` are the leaves, the last layer is the root.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    layers: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// `leaves.len()` must be a non-zero power of two.
    pub fn new(leaves: Vec<Hash>) -> Self {
        debug_assert!(leaves.len().is_power_of_two());
        let mut layers = vec![leaves];
        while let Some(last) = layers.last().filter(|l| l.len() > 1) {
            let next = last
                .chunks_exact(2)
                .map(|pair| node_hash(&pair[0], &pair[1]))
                .collect();
            layers.push(next);
        }
        Self { layers }
    }

    pub fn root(&self) -> Hash {
        self.layers
            .last()
            .and_then(|l| l.first())
            .copied()
            .unwrap_or_default()
    }

    /// Sibling path from leaf `index` up to the root.
    pub fn proof(&self, index: usize) -> Vec<Hash> {
        let mut path = Vec::with_capacity(self.layers.len().saturating_sub(1));
        let mut position = index;
        for layer in &self.layers[..self.layers.len() - 1] {
            path.push(layer[position ^ 1]);
            position >>= 1;
        }
        path
    }
}

/// Check that `leaf` sits at `index` under `root`, given a tree of `depth`.
pub fn verify_path(root: &Hash, index: usize, leaf: Hash, path: &[Hash], depth: usize) -> bool {
    if path.len() != depth || index >> depth != 0 {
        return false;
    }
    let mut acc = leaf;
    let mut position = index;
    for sibling in path {
        acc = if position & 1 == 0 {
            node_hash(&acc, sibling)
        } else {
            node_hash(sibling, &acc)
        };
        position >>= 1;
    }
    &acc == root
}
