//! Binary Merkle tree construction and inclusion-proof verification.
//!
//! Pairs adjacent nodes left-to-right; on an odd count at a level, the last
//! node is promoted unchanged to the next level (never duplicated).

use pkgchain_types::{Hash, MerkleProof, ProofStep, Side};
use sha2::{Digest, Sha256};

/// `H(bytes)`: SHA-256, fixed 32-byte output.
pub fn h(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Hash(hasher.finalize().into())
}

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Hash(hasher.finalize().into())
}

/// Builds a tree over `leaves` (raw, unhashed inputs) in the given order and
/// returns the root plus one inclusion proof per leaf.
///
/// `leaves.len() == 0` yields `H(&[])` with no proofs; `leaves.len() == 1`
/// yields `H(leaves[0])` with a single empty proof.
pub fn build_tree(leaves: &[Vec<u8>]) -> (Hash, Vec<MerkleProof>) {
    if leaves.is_empty() {
        return (h(&[]), Vec::new());
    }

    let mut level: Vec<Hash> = leaves.iter().map(|l| h(l)).collect();
    let mut groups: Vec<Vec<usize>> = (0..level.len()).map(|i| vec![i]).collect();
    let mut proofs: Vec<MerkleProof> = leaves.iter().map(|_| MerkleProof::default()).collect();

    if level.len() == 1 {
        return (level[0], proofs);
    }

    while level.len() > 1 {
        let mut next_level = Vec::with_capacity(level.len().div_ceil(2));
        let mut next_groups = Vec::with_capacity(level.len().div_ceil(2));
        let mut i = 0;
        while i < level.len() {
            if i + 1 < level.len() {
                let left = level[i];
                let right = level[i + 1];
                let parent = hash_pair(&left, &right);

                for &leaf_idx in &groups[i] {
                    proofs[leaf_idx].steps.push(ProofStep {
                        sibling: right,
                        side: Side::Right,
                    });
                }
                for &leaf_idx in &groups[i + 1] {
                    proofs[leaf_idx].steps.push(ProofStep {
                        sibling: left,
                        side: Side::Left,
                    });
                }

                let mut merged = groups[i].clone();
                merged.extend_from_slice(&groups[i + 1]);
                next_level.push(parent);
                next_groups.push(merged);
                i += 2;
            } else {
                next_level.push(level[i]);
                next_groups.push(groups[i].clone());
                i += 1;
            }
        }
        level = next_level;
        groups = next_groups;
    }

    (level[0], proofs)
}

/// Recomputes the root from `leaf_hash` by successively hashing with each
/// sibling in tagged order, returning whether it equals `root`.
pub fn check_proof(root: &Hash, leaf_hash: &Hash, proof: &MerkleProof) -> bool {
    let mut current = *leaf_hash;
    for step in &proof.steps {
        current = match step.side {
            Side::Left => hash_pair(&step.sibling, &current),
            Side::Right => hash_pair(&current, &step.sibling),
        };
    }
    current == *root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tree_hashes_empty_input() {
        let (root, proofs) = build_tree(&[]);
        assert_eq!(root, h(&[]));
        assert!(proofs.is_empty());
    }

    #[test]
    fn single_leaf_root_is_its_hash_with_empty_proof() {
        let leaves = vec![b"only".to_vec()];
        let (root, proofs) = build_tree(&leaves);
        assert_eq!(root, h(&leaves[0]));
        assert_eq!(proofs.len(), 1);
        assert!(proofs[0].steps.is_empty());
        assert!(check_proof(&root, &h(&leaves[0]), &proofs[0]));
    }

    #[test]
    fn round_trip_holds_for_every_leaf_count() {
        for n in 1..=11usize {
            let leaves: Vec<Vec<u8>> = (0..n).map(|i| vec![i as u8; 4]).collect();
            let (root, proofs) = build_tree(&leaves);
            assert_eq!(proofs.len(), n);
            for (i, leaf) in leaves.iter().enumerate() {
                assert!(
                    check_proof(&root, &h(leaf), &proofs[i]),
                    "proof for leaf {i} of {n} failed to verify"
                );
            }
        }
    }

    #[test]
    fn odd_node_is_promoted_not_duplicated() {
        // Three leaves: the third is promoted unchanged for one level, so
        // its proof has exactly one step (vs. two for a balanced 4-leaf tree).
        let leaves: Vec<Vec<u8>> = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()];
        let (_, proofs) = build_tree(&leaves);
        assert_eq!(proofs[2].steps.len(), 1);
        assert_eq!(proofs[0].steps.len(), 2);
    }

    #[test]
    fn tampered_proof_fails() {
        let leaves: Vec<Vec<u8>> = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()];
        let (root, mut proofs) = build_tree(&leaves);
        proofs[0].steps[0].sibling = h(b"not-a-sibling");
        assert!(!check_proof(&root, &h(&leaves[0]), &proofs[0]));
    }
}
