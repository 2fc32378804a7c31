/// A chain's payload predicate, registered under a `verifier_id` (§4.3's
/// Release verifier is one implementation of this).
pub trait Verifier: Send + Sync {
    fn check(&self, payload: &[u8]) -> bool;
}
