//! Release construction (Repository snapshot + Merkle root + per-package
//! proofs) and the verifier predicate registered for release payloads.

use pkgchain_skipchain::Verifier;
use pkgchain_types::{Hash, PkgchainError, Release, Repository};

/// Verifier id release data blocks are registered under.
pub const RELEASE_VERIFIER_ID: &str = "release-v1";

/// Builds a Release from a Repository: sorts packages by name, builds the
/// Merkle tree over the raw package hashes, and binds root + per-package
/// proofs into the Release.
pub fn build_release(mut repository: Repository) -> Release {
    repository.packages.sort_by(|a, b| a.name.cmp(&b.name));
    let leaves: Vec<Vec<u8>> = repository
        .packages
        .iter()
        .map(|p| p.hash.as_bytes().to_vec())
        .collect();
    let (root_id, proofs) = pkgchain_merkle::build_tree(&leaves);
    Release {
        repository,
        root_id,
        proofs,
    }
}

pub fn encode_release(release: &Release) -> Result<Vec<u8>, PkgchainError> {
    bincode::serialize(release).map_err(|e| PkgchainError::MalformedRequest(e.to_string()))
}

pub fn decode_release(bytes: &[u8]) -> Result<Release, PkgchainError> {
    bincode::deserialize(bytes).map_err(|e| PkgchainError::MalformedRequest(e.to_string()))
}

/// Registered under [`RELEASE_VERIFIER_ID`]: decodes the payload into a
/// Release and rejects it unless its root matches the Merkle root
/// recomputed over its own package hashes. Per-package proofs are not
/// checked at write time — they are reconstructable from the payload.
pub struct ReleaseVerifier;

impl Verifier for ReleaseVerifier {
    fn check(&self, payload: &[u8]) -> bool {
        let release = match decode_release(payload) {
            Ok(r) => r,
            Err(_) => return false,
        };
        if release.root_id == Hash::ZERO {
            return false;
        }
        let leaves: Vec<Vec<u8>> = release
            .repository
            .packages
            .iter()
            .map(|p| p.hash.as_bytes().to_vec())
            .collect();
        let (root, _) = pkgchain_merkle::build_tree(&leaves);
        root == release.root_id
    }
}
