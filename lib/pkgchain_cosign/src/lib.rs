//! MuSig2-based co-signing driver: the round-state primitive
//! ([`CosignSigner`]), an in-process multi-signer driver
//! ([`LocalCosignDriver`]) implementing [`pkgchain_types::CosignDriver`],
//! and the local `cosiVerify` predicate (§4.5).

pub mod local_driver;
pub mod signer;
pub mod verify;

pub use local_driver::LocalCosignDriver;
pub use signer::{verify_signature, CosignError, CosignSigner};
pub use verify::{cosi_verify, DEFAULT_REASONABLE_SKEW};
