use std::time::Duration;

use pkgchain_types::{unmarshal_pair, Hash};

/// Default maximum accepted difference between a signed timestamp and local
/// wall clock (spec §4.5, §GLOSSARY "reasonable skew").
pub const DEFAULT_REASONABLE_SKEW: Duration = Duration::from_secs(3600);

/// Local verification predicate every signer runs before contributing its
/// share (§4.5): splits `m` into `(signedTime, signedRoot)`, rejects on
/// clock skew, and rejects unless `signedRoot` matches the timestamp root
/// recomputed from the repository heads the signer currently knows about.
pub fn cosi_verify(message: &[u8], current_root: Hash, now_unix: i64, skew: Duration) -> bool {
    let Some((signed_time, signed_root)) = unmarshal_pair(message) else {
        return false;
    };
    let delta = (now_unix - signed_time).unsigned_abs();
    if delta > skew.as_secs() {
        return false;
    }
    signed_root == current_root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_fresh_matching_root() {
        let root = Hash([3u8; 32]);
        let msg = pkgchain_types::marshal_pair(1_000, &root);
        assert!(cosi_verify(&msg, root, 1_000, DEFAULT_REASONABLE_SKEW));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let root = Hash([3u8; 32]);
        let msg = pkgchain_types::marshal_pair(1_000, &root);
        let too_late = 1_000 + DEFAULT_REASONABLE_SKEW.as_secs() as i64 + 1;
        assert!(!cosi_verify(&msg, root, too_late, DEFAULT_REASONABLE_SKEW));
    }

    #[test]
    fn rejects_mismatched_root() {
        let root = Hash([3u8; 32]);
        let other = Hash([4u8; 32]);
        let msg = pkgchain_types::marshal_pair(1_000, &root);
        assert!(!cosi_verify(&msg, other, 1_000, DEFAULT_REASONABLE_SKEW));
    }

    #[test]
    fn rejects_undersized_message() {
        assert!(!cosi_verify(&[1, 2, 3], Hash::ZERO, 0, DEFAULT_REASONABLE_SKEW));
    }
}
