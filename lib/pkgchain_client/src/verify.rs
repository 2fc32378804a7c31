//! Client-side reconstruction of the guarantees the facade's wire types
//! carry proofs for: package inclusion in a release root, and a
//! timestamp bundle's cosignature.

use pkgchain_merkle::{check_proof, h};
use pkgchain_types::{Hash, MerkleProof, Release};
use secp256k1::PublicKey;

/// Verifies that `package_hash` is included under `release`'s root at
/// `proof_index` (spec §8 invariant 1, checked entirely client-side: no
/// trust in the facade beyond the bytes it returned).
pub fn verify_inclusion(release: &Release, proof_index: usize, package_hash: Hash) -> bool {
    let Some(proof) = release.proofs.get(proof_index) else {
        return false;
    };
    check_proof(&release.root_id, &h(package_hash.as_bytes()), proof)
}

/// Verifies a single proof against an arbitrary root, for callers that
/// already pulled the root and proof out of a response by hand.
pub fn verify_proof(root: Hash, leaf_hash: Hash, proof: &MerkleProof) -> bool {
    check_proof(&root, &leaf_hash, proof)
}

/// Verifies a `TimestampBundle`'s aggregate cosignature against the
/// roster's public key (spec §8 invariant 5's signature half; freshness is
/// a separate, caller-supplied clock check via `pkgchain_timestamp::is_fresh`
/// to avoid this crate depending on wall-clock time).
pub fn verify_timestamp(
    bundle: &pkgchain_types::TimestampBundle,
    aggregated_pubkey: PublicKey,
) -> bool {
    let message = pkgchain_types::marshal_pair(bundle.time, &bundle.root_id);
    let Ok(sig_bytes) = <[u8; 64]>::try_from(bundle.signature.as_slice()) else {
        return false;
    };
    let Ok(signature) = musig2::CompactSignature::from_bytes(&sig_bytes) else {
        return false;
    };
    pkgchain_cosign::verify_signature(aggregated_pubkey, signature, &message).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgchain_types::{Package, Repository};

    #[test]
    fn verify_inclusion_accepts_a_real_package() {
        let repo = Repository::new(
            "debian".into(),
            "stable".into(),
            "1".into(),
            vec![
                Package::new("alpha".into(), "1.0".into(), Hash([1u8; 32])),
                Package::new("beta".into(), "1.0".into(), Hash([2u8; 32])),
            ],
            "https://example.invalid".into(),
        );
        let release = pkgchain_release::build_release(repo);
        assert!(verify_inclusion(&release, 0, Hash([1u8; 32])));
        assert!(!verify_inclusion(&release, 0, Hash([9u8; 32])));
    }
}
