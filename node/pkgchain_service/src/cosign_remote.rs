//! HTTP-distributed [`CosignDriver`]: a coordinator (the server proposing a
//! block) drives a MuSig2 round against every other roster member over
//! `/cosign/round1` and `/cosign/round2`, mirroring the nonce/partial-signature
//! round-trip `via_verifier_coordinator::verifier` runs against its
//! coordinator. Wire fields are hex-encoded rather than base64 (DESIGN.md):
//! `hex` is already carried for `Hash::to_hex`, `base64` is not a workspace
//! dependency.
//!
//! This complements, rather than replaces, [`pkgchain_cosign::LocalCosignDriver`]:
//! a single operator process holding every roster key still prefers the
//! in-process driver; this one is for a roster whose signers are separate
//! processes.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use musig2::{BinaryEncoding, CompactSignature, PartialSignature, PubNonce};
use pkgchain_cosign::CosignSigner;
use pkgchain_types::{CosignDriver, Hash, PkgchainError};
use secp256k1::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub(crate) struct Round1Request {
    pub(crate) message: Vec<u8>,
    pub(crate) signer_index: usize,
    pub(crate) nonce: String,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct Round1Response {
    pub(crate) nonce: String,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct Round2Request {
    pub(crate) message: Vec<u8>,
    pub(crate) signer_index: usize,
    pub(crate) partial: String,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct Round2Response {
    pub(crate) partial: String,
}

fn encode_nonce(nonce: &PubNonce) -> String {
    hex::encode(nonce.to_bytes())
}

fn decode_nonce(s: &str) -> Result<PubNonce, PkgchainError> {
    let bytes = hex::decode(s).map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
    PubNonce::from_bytes(&bytes).map_err(|e| PkgchainError::CosignFailed(e.to_string()))
}

fn encode_partial(sig: &PartialSignature) -> String {
    hex::encode(sig.serialize())
}

fn decode_partial(s: &str) -> Result<PartialSignature, PkgchainError> {
    let bytes = hex::decode(s).map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
    PartialSignature::from_slice(&bytes).map_err(|e| PkgchainError::CosignFailed(e.to_string()))
}

/// Coordinator-side driver: this node's own roster slot, and every peer's
/// base URL (`None` at this node's own index, since it never dials itself).
pub struct RemoteCosignDriver {
    secret_key: SecretKey,
    signer_index: usize,
    all_pubkeys: Vec<PublicKey>,
    peer_base_urls: Vec<Option<String>>,
    http: reqwest::Client,
}

impl RemoteCosignDriver {
    pub fn new(
        secret_key: SecretKey,
        signer_index: usize,
        all_pubkeys: Vec<PublicKey>,
        peer_base_urls: Vec<Option<String>>,
    ) -> Self {
        Self {
            secret_key,
            signer_index,
            all_pubkeys,
            peer_base_urls,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CosignDriver for RemoteCosignDriver {
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, PkgchainError> {
        let mut signer = CosignSigner::new(self.secret_key, self.signer_index, self.all_pubkeys.clone())
            .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
        let our_nonce = signer
            .start_signing_session(message.to_vec())
            .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;

        for (idx, base_url) in self.peer_base_urls.iter().enumerate() {
            let Some(base_url) = base_url else { continue };
            if idx == self.signer_index {
                continue;
            }
            let resp: Round1Response = self
                .http
                .post(format!("{base_url}/cosign/round1"))
                .json(&Round1Request {
                    message: message.to_vec(),
                    signer_index: self.signer_index,
                    nonce: encode_nonce(&our_nonce),
                })
                .send()
                .await
                .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?
                .json()
                .await
                .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
            signer
                .receive_nonce(idx, decode_nonce(&resp.nonce)?)
                .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
        }

        let our_partial = signer
            .create_partial_signature()
            .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;

        for (idx, base_url) in self.peer_base_urls.iter().enumerate() {
            let Some(base_url) = base_url else { continue };
            if idx == self.signer_index {
                continue;
            }
            let resp: Round2Response = self
                .http
                .post(format!("{base_url}/cosign/round2"))
                .json(&Round2Request {
                    message: message.to_vec(),
                    signer_index: self.signer_index,
                    partial: encode_partial(&our_partial),
                })
                .send()
                .await
                .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?
                .json()
                .await
                .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
            signer
                .receive_partial_signature(idx, decode_partial(&resp.partial)?)
                .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
        }

        let final_sig: CompactSignature = signer
            .create_final_signature()
            .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
        Ok(final_sig.serialize().to_vec())
    }
}

struct Session {
    signer: CosignSigner,
    our_nonce: PubNonce,
    our_partial: Option<PartialSignature>,
}

/// Peer-side session state for a roster member responding to a remote
/// coordinator's round1/round2 requests, keyed by `h(message)` so both
/// sides agree on which in-flight signing session a request belongs to.
pub struct CosignSessions {
    local_secret_key: SecretKey,
    local_signer_index: usize,
    all_pubkeys: Vec<PublicKey>,
    sessions: StdMutex<HashMap<Hash, Session>>,
}

impl CosignSessions {
    pub fn new(local_secret_key: SecretKey, local_signer_index: usize, all_pubkeys: Vec<PublicKey>) -> Self {
        Self {
            local_secret_key,
            local_signer_index,
            all_pubkeys,
            sessions: StdMutex::new(HashMap::new()),
        }
    }

    pub fn handle_round1(
        &self,
        message: &[u8],
        peer_index: usize,
        peer_nonce: PubNonce,
    ) -> Result<PubNonce, PkgchainError> {
        let key = pkgchain_merkle::h(message);
        let mut sessions = self.sessions.lock().unwrap();
        let session = if let Some(session) = sessions.get_mut(&key) {
            session
        } else {
            let mut signer = CosignSigner::new(self.local_secret_key, self.local_signer_index, self.all_pubkeys.clone())
                .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
            let our_nonce = signer
                .start_signing_session(message.to_vec())
                .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
            sessions.entry(key).or_insert(Session {
                signer,
                our_nonce,
                our_partial: None,
            })
        };
        session
            .signer
            .receive_nonce(peer_index, peer_nonce)
            .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
        Ok(session.our_nonce.clone())
    }

    pub fn handle_round2(
        &self,
        message: &[u8],
        peer_index: usize,
        peer_partial: PartialSignature,
    ) -> Result<PartialSignature, PkgchainError> {
        let key = pkgchain_merkle::h(message);
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&key)
            .ok_or_else(|| PkgchainError::CosignFailed("round2 arrived before round1".into()))?;

        if session.our_partial.is_none() {
            let partial = session
                .signer
                .create_partial_signature()
                .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
            session.our_partial = Some(partial);
        }
        session
            .signer
            .receive_partial_signature(peer_index, peer_partial)
            .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
        Ok(session.our_partial.unwrap())
    }
}
