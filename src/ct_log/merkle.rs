// src/ct_log/merkle.rs
//! RFC 6962 Merkle tree hashing
//!
//! The hasher consumes leaves one at a time and keeps only the roots of the
//! complete subtrees seen so far, so a whole log can be hashed without
//! holding every leaf hash in memory.

use sha2::{Digest, Sha256};

pub type Hash = [u8; 32];

/// Hash of a single leaf: SHA-256(0x00 || leaf)
pub fn leaf_hash(leaf: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([0x00u8]);
    hasher.update(leaf);
    hasher.finalize().into()
}

/// Hash of an interior node: SHA-256(0x01 || left || right)
pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([0x01u8]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Root of the empty tree: SHA-256 of the empty string
pub fn empty_root() -> Hash {
    Sha256::digest(b"").into()
}

/// Incremental Merkle tree hash calculator
#[derive(Debug, Default)]
pub struct TreeHasher {
    /// (leaf count, root) of complete subtrees, largest first
    stack: Vec<(u64, Hash)>,
    size: u64,
}

impl TreeHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leaves pushed so far
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Append a raw leaf
    pub fn push_leaf(&mut self, leaf: &[u8]) {
        self.push_hash(leaf_hash(leaf));
    }

    /// Append an already-computed leaf hash
    pub fn push_hash(&mut self, hash: Hash) {
        self.stack.push((1, hash));
        self.size += 1;

        while self.stack.len() >= 2 {
            let n = self.stack.len();
            if self.stack[n - 1].0 != self.stack[n - 2].0 {
                break;
            }
            let (right_size, right) = self.stack.pop().unwrap_or_default();
            let (left_size, left) = self.stack.pop().unwrap_or_default();
            self.stack.push((left_size + right_size, node_hash(&left, &right)));
        }
    }

    /// Tree head over every leaf pushed so far
    pub fn root(&self) -> Hash {
        let mut subtrees = self.stack.iter().rev();
        let Some((_, last)) = subtrees.next() else {
            return empty_root();
        };

        subtrees.fold(*last, |acc, (_, left)| node_hash(left, &acc))
    }
}
