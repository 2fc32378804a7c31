//! Core data model shared by every pkgchain crate: hashes, packages and
//! repositories, releases, skipblocks, timestamp bundles, and the wire
//! request/response set.

pub mod cosign;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod package;
pub mod release;
pub mod repository_chain;
pub mod skipblock;
pub mod timestamp;
pub mod wire;

pub use cosign::CosignDriver;
pub use error::PkgchainError;
pub use hash::Hash;
pub use merkle::{MerkleProof, ProofStep, Side};
pub use package::{Package, Repository};
pub use release::Release;
pub use repository_chain::RepositoryChain;
pub use skipblock::{ForwardLink, Roster, SignerIdentity, SkipBlock};
pub use timestamp::{marshal_pair, unmarshal_pair, TimestampBundle};
pub use wire::{Request, Response};
