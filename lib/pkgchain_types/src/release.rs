use serde::{Deserialize, Serialize};

use crate::{hash::Hash, merkle::MerkleProof, package::Repository};

/// A Repository snapshot plus its Merkle root and per-package inclusion proofs.
///
/// Invariant: `proofs[i]` verifies `repository.packages[i].hash` against `root_id`,
/// and `root_id` equals the Merkle root over the sorted package hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub repository: Repository,
    pub root_id: Hash,
    pub proofs: Vec<MerkleProof>,
}
