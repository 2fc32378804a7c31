//! Timestamp layer: periodic Merkle root over every tracked repository's
//! data-chain head, co-signed by the server fleet (§4.6).

use std::time::Duration;

use pkgchain_cosign::{cosi_verify, DEFAULT_REASONABLE_SKEW};
use pkgchain_types::{marshal_pair, CosignDriver, Hash, PkgchainError, TimestampBundle};
use secp256k1::PublicKey;

/// `(root, proofs) := BuildTree(H, heads)`, `m := encode(now) || root`,
/// drive the cosigning primitive, and bind the result into a bundle.
///
/// `heads` must already be in sorted repository-identity order (the
/// ordering is a property of the caller's tracked-repository map, not of
/// this crate).
pub async fn produce_timestamp_bundle(
    heads: &[Hash],
    now_unix: i64,
    driver: &dyn CosignDriver,
) -> Result<TimestampBundle, PkgchainError> {
    let leaves: Vec<Vec<u8>> = heads.iter().map(|h| h.as_bytes().to_vec()).collect();
    let (root, proofs) = pkgchain_merkle::build_tree(&leaves);
    let message = marshal_pair(now_unix, &root);

    // Every signer runs §4.5's predicate before contributing a share; this
    // call represents that guard for the process driving the protocol.
    if !cosi_verify(&message, root, now_unix, DEFAULT_REASONABLE_SKEW) {
        return Err(PkgchainError::CosignFailed(
            "local cosiVerify rejected the timestamp message before signing".into(),
        ));
    }

    let signature = driver.sign(&message).await?;
    Ok(TimestampBundle {
        root_id: root,
        proofs,
        time: now_unix,
        signature,
    })
}

/// Client-side check (§8 invariant 5): the bundle's signature verifies
/// against the roster's aggregated public key over `encode(time) || root`.
pub fn verify_timestamp_signature(bundle: &TimestampBundle, aggregated_pubkey: PublicKey) -> bool {
    let message = marshal_pair(bundle.time, &bundle.root_id);
    let Ok(sig_bytes) = <[u8; 64]>::try_from(bundle.signature.as_slice()) else {
        return false;
    };
    let Ok(signature) = musig2::CompactSignature::from_bytes(&sig_bytes) else {
        return false;
    };
    pkgchain_cosign::verify_signature(aggregated_pubkey, signature, &message).is_ok()
}

/// Whether `bundle.time` is within `skew` of `now_unix` (part of §3's
/// Timestamp bundle invariant, checked independently of the signature).
pub fn is_fresh(bundle: &TimestampBundle, now_unix: i64, skew: Duration) -> bool {
    (now_unix - bundle.time).unsigned_abs() <= skew.as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pkgchain_cosign::LocalCosignDriver;
    use rand::rngs::OsRng;
    use secp256k1::SecretKey;

    struct RefusingDriver;
    #[async_trait]
    impl CosignDriver for RefusingDriver {
        async fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, PkgchainError> {
            Err(PkgchainError::CosignFailed("refused".into()))
        }
    }

    #[tokio::test]
    async fn produces_a_bundle_whose_signature_verifies() {
        let mut rng = OsRng;
        let keys: Vec<SecretKey> = (0..3).map(|_| SecretKey::new(&mut rng)).collect();
        let driver = LocalCosignDriver::new(keys);
        let agg_pubkey = driver.aggregated_pubkey().unwrap();

        let heads = vec![Hash([1u8; 32]), Hash([2u8; 32])];
        let bundle = produce_timestamp_bundle(&heads, 1_700_000_000, &driver)
            .await
            .unwrap();
        assert_eq!(bundle.time, 1_700_000_000);
        assert!(is_fresh(&bundle, 1_700_000_000, DEFAULT_REASONABLE_SKEW));
        assert!(verify_timestamp_signature(&bundle, agg_pubkey));
    }

    #[tokio::test]
    async fn cosign_failure_propagates() {
        let heads = vec![Hash([1u8; 32])];
        let err = produce_timestamp_bundle(&heads, 1_700_000_000, &RefusingDriver)
            .await
            .unwrap_err();
        assert!(matches!(err, PkgchainError::CosignFailed(_)));
    }

    #[test]
    fn freshness_rejects_outside_skew() {
        let bundle = TimestampBundle {
            root_id: Hash::ZERO,
            proofs: vec![],
            time: 0,
            signature: vec![],
        };
        assert!(is_fresh(&bundle, 0, DEFAULT_REASONABLE_SKEW));
        let too_late = DEFAULT_REASONABLE_SKEW.as_secs() as i64 + 1;
        assert!(!is_fresh(&bundle, too_late, DEFAULT_REASONABLE_SKEW));
    }
}
