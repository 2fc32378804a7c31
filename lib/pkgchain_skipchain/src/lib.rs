//! Per-repository skipchain store: append-only hash-linked log with
//! multi-level forward links, genesis anchoring, and a per-chain verifier
//! predicate applied on every append.

pub mod store;
pub mod traits;

pub use store::SkipchainStore;
pub use traits::Verifier;
