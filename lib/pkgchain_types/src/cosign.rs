use async_trait::async_trait;

use crate::error::PkgchainError;

/// The external co-signing collaborator's contract (spec §1, §4.5):
/// `sign(msg) -> σ`. Used both by the skipchain store (one call per
/// forward-link level) and the timestamp layer (one call per cycle) — in
/// both cases "driving the primitive" means the same thing: hand it a
/// message, get back aggregate-signature bytes or `CosignFailed`.
///
/// Crates that need a signature (`pkgchain_skipchain`, `pkgchain_timestamp`)
/// depend only on this trait, never on a concrete driver; `pkgchain_cosign`
/// provides the concrete implementation, and the service façade wires the
/// two together (spec §9's "explicit service-construction function").
#[async_trait]
pub trait CosignDriver: Send + Sync {
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, PkgchainError>;
}
