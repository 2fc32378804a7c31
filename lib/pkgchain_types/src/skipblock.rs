use serde::{Deserialize, Serialize};

use crate::hash::Hash;

/// One signer's identity within a chain's roster: its public key (hex) and
/// the network address it can be reached at for propagation/cosigning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerIdentity {
    pub public_key: String,
    pub address: String,
}

/// Ordered list of signer identities for one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub signers: Vec<SignerIdentity>,
}

impl Roster {
    pub fn new(signers: Vec<SignerIdentity>) -> Self {
        Self { signers }
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }
}

/// A co-signature endorsing that the fleet has linked `target` as the
/// successor of the block holding this link, at skip level `level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardLink {
    pub level: u32,
    pub target: Hash,
    pub signature: Vec<u8>,
}

/// A node in the append-only per-repository log.
///
/// `hash` is computed over every field except `forward_links`, which are
/// appended post-hoc once a successor block exists (never removed, never
/// re-ordered).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipBlock {
    pub index: u64,
    pub hash: Hash,
    pub backward_links: Vec<Hash>,
    pub forward_links: Vec<ForwardLink>,
    pub roster: Roster,
    pub height: u32,
    pub base: u32,
    pub verifier_id: String,
    pub data: Vec<u8>,
    pub genesis_hash: Hash,
}

impl SkipBlock {
    /// The bytes hashed to produce `hash`: every immutable field, in a
    /// stable order, excluding `forward_links`.
    pub fn immutable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.index.to_be_bytes());
        for link in &self.backward_links {
            buf.extend_from_slice(link.as_bytes());
        }
        for signer in &self.roster.signers {
            buf.extend_from_slice(signer.public_key.as_bytes());
            buf.extend_from_slice(signer.address.as_bytes());
        }
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&self.base.to_be_bytes());
        buf.extend_from_slice(self.verifier_id.as_bytes());
        buf.extend_from_slice(&self.data);
        buf.extend_from_slice(self.genesis_hash.as_bytes());
        buf
    }
}
