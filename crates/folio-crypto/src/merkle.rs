use folio_types::Digest;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::hasher::HashProvider;

/// Side of a sibling in a Merkle proof path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Binary Merkle tree over entry hashes.
///
/// Parents are `H(hex(left) | hex(right))` under the ledger's named
/// algorithm. A layer of odd length pairs its last node with itself.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// Level 0 = leaves, last level = the single root.
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Build a tree bottom-up from leaf hashes.
    ///
    /// Zero leaves is an error. A single leaf is its own root.
    pub fn build(
        leaves: Vec<Digest>,
        hasher: &dyn HashProvider,
        algorithm: &str,
    ) -> Result<Self, CryptoError> {
        if leaves.is_empty() {
            return Err(CryptoError::EmptyTree);
        }

        let mut levels: Vec<Vec<Digest>> = vec![leaves];

        while levels[levels.len() - 1].len() > 1 {
            let current = &levels[levels.len() - 1];
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            for pair in current.chunks(2) {
                let right = pair.get(1).unwrap_or(&pair[0]);
                next.push(Self::combine(&pair[0], right, hasher, algorithm)?);
            }
            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// Compute a parent node from two children.
    pub fn combine(
        left: &Digest,
        right: &Digest,
        hasher: &dyn HashProvider,
        algorithm: &str,
    ) -> Result<Digest, CryptoError> {
        hasher.hash_str(&format!("{}|{}", left.to_hex(), right.to_hex()), algorithm)
    }

    /// The root hash of the tree.
    pub fn root(&self) -> &Digest {
        &self.levels[self.levels.len() - 1][0]
    }

    /// All layers, leaves first.
    pub fn levels(&self) -> &[Vec<Digest>] {
        &self.levels
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Generate an inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut path = Vec::with_capacity(self.levels.len() - 1);
        let mut idx = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let (sibling_idx, side) = if idx % 2 == 0 {
                (idx + 1, Side::Right)
            } else {
                (idx - 1, Side::Left)
            };
            // Past the end of an odd level the node was paired with itself.
            let hash = level.get(sibling_idx).unwrap_or(&level[idx]).clone();
            path.push(ProofStep { hash, side });
            idx /= 2;
        }

        Some(MerkleProof {
            leaf_index: index,
            path,
        })
    }
}

/// One sibling on the path from a leaf to the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub hash: Digest,
    pub side: Side,
}

/// Merkle inclusion proof: ordered siblings from leaf level upward.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub path: Vec<ProofStep>,
}

impl MerkleProof {
    /// The sibling hashes in order.
    pub fn siblings(&self) -> impl Iterator<Item = &Digest> {
        self.path.iter().map(|step| &step.hash)
    }

    /// Fold the path over `leaf` and return the resulting root.
    pub fn compute_root(
        &self,
        leaf: &Digest,
        hasher: &dyn HashProvider,
        algorithm: &str,
    ) -> Result<Digest, CryptoError> {
        let mut current = leaf.clone();
        for step in &self.path {
            current = match step.side {
                Side::Left => MerkleTree::combine(&step.hash, &current, hasher, algorithm)?,
                Side::Right => MerkleTree::combine(&current, &step.hash, hasher, algorithm)?,
            };
        }
        Ok(current)
    }

    /// Returns `true` if folding the path over `leaf` reproduces `root`.
    pub fn verify(
        &self,
        leaf: &Digest,
        root: &Digest,
        hasher: &dyn HashProvider,
        algorithm: &str,
    ) -> bool {
        self.compute_root(leaf, hasher, algorithm)
            .map(|computed| computed == *root)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::StandardHashProvider;

    const ALG: &str = "SHA-256";

    fn leaf(seed: u8) -> Digest {
        StandardHashProvider.hash(&[seed], ALG).unwrap()
    }

    fn tree(leaves: Vec<Digest>) -> MerkleTree {
        MerkleTree::build(leaves, &StandardHashProvider, ALG).unwrap()
    }

    fn h(left: &Digest, right: &Digest) -> Digest {
        MerkleTree::combine(left, right, &StandardHashProvider, ALG).unwrap()
    }

    #[test]
    fn empty_tree_is_rejected() {
        let err = MerkleTree::build(vec![], &StandardHashProvider, ALG).unwrap_err();
        assert_eq!(err, CryptoError::EmptyTree);
    }

    #[test]
    fn single_leaf_is_root() {
        let l = leaf(1);
        let t = tree(vec![l.clone()]);
        assert_eq!(t.root(), &l);
        assert_eq!(t.levels().len(), 1);
        assert!(t.proof(0).unwrap().path.is_empty());
    }

    #[test]
    fn odd_layer_duplicates_last_hash() {
        let (h1, h2, h3) = (leaf(1), leaf(2), leaf(3));
        let t = tree(vec![h1.clone(), h2.clone(), h3.clone()]);
        let expected = h(&h(&h1, &h2), &h(&h3, &h3));
        assert_eq!(t.root(), &expected);
        assert_eq!(t.levels().len(), 3);
    }

    #[test]
    fn parent_is_hash_of_joined_hex() {
        let (a, b) = (leaf(1), leaf(2));
        let expected = StandardHashProvider
            .hash_str(&format!("{}|{}", a.to_hex(), b.to_hex()), ALG)
            .unwrap();
        assert_eq!(tree(vec![a, b]).root(), &expected);
    }

    #[test]
    fn proof_verifies_for_all_leaves() {
        for count in 1..=9u8 {
            let leaves: Vec<Digest> = (0..count).map(leaf).collect();
            let t = tree(leaves.clone());
            for (i, l) in leaves.iter().enumerate() {
                let proof = t.proof(i).expect("proof should exist");
                assert!(
                    proof.verify(l, t.root(), &StandardHashProvider, ALG),
                    "proof for leaf {i} of {count} should verify"
                );
            }
        }
    }

    #[test]
    fn proof_for_unpaired_leaf_uses_itself() {
        let leaves: Vec<Digest> = (0..3).map(leaf).collect();
        let t = tree(leaves.clone());
        let proof = t.proof(2).unwrap();
        assert_eq!(proof.path[0].hash, leaves[2]);
        assert_eq!(proof.path[0].side, Side::Right);
    }

    #[test]
    fn proof_out_of_bounds_returns_none() {
        let t = tree(vec![leaf(1), leaf(2)]);
        assert!(t.proof(5).is_none());
    }

    #[test]
    fn wrong_leaf_fails_verification() {
        let t = tree(vec![leaf(1), leaf(2), leaf(3), leaf(4)]);
        let proof = t.proof(0).unwrap();
        assert!(!proof.verify(&leaf(99), t.root(), &StandardHashProvider, ALG));
    }

    #[test]
    fn power_of_two_leaves_have_log_depth() {
        let t = tree((0..8).map(leaf).collect());
        for i in 0..8 {
            assert_eq!(t.proof(i).unwrap().path.len(), 3);
        }
    }

    #[test]
    fn proof_serde_roundtrip() {
        let t = tree(vec![leaf(1), leaf(2), leaf(3)]);
        let proof = t.proof(1).unwrap();
        let json = serde_json::to_string(&proof).unwrap();
        let parsed: MerkleProof = serde_json::from_str(&json).unwrap();
        assert_eq!(proof, parsed);
        assert_eq!(parsed.siblings().count(), 2);
    }
}
