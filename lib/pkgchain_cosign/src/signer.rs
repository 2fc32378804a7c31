use std::fmt;

use musig2::{CompactSignature, FirstRound, KeyAggContext, PartialSignature, PubNonce, SecNonceSpices, SecondRound};
use secp256k1::{PublicKey, Secp256k1, SecretKey};

#[derive(Debug)]
pub enum CosignError {
    Musig2(String),
    InvalidSignerIndex,
    InvalidState(String),
}

impl fmt::Display for CosignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CosignError::Musig2(e) => write!(f, "musig2 error: {e}"),
            CosignError::InvalidSignerIndex => write!(f, "invalid signer index"),
            CosignError::InvalidState(s) => write!(f, "invalid signer state: {s}"),
        }
    }
}

impl std::error::Error for CosignError {}

/// One participant's round state in a two-round MuSig2 session over the
/// roster's aggregate key. Mirrors the nonce-exchange / partial-signature
/// round structure of a standard MuSig2 signer; unlike a Bitcoin Taproot
/// signer this applies no key tweak, since the aggregate key here signs
/// timestamp/forward-link messages rather than spending a UTXO.
pub struct CosignSigner {
    secret_key: SecretKey,
    public_key: PublicKey,
    signer_index: usize,
    key_agg_ctx: KeyAggContext,
    first_round: Option<FirstRound>,
    second_round: Option<SecondRound<Vec<u8>>>,
    message: Vec<u8>,
}

impl fmt::Debug for CosignSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosignSigner")
            .field("public_key", &self.public_key)
            .field("signer_index", &self.signer_index)
            .finish()
    }
}

impl CosignSigner {
    pub fn new(
        secret_key: SecretKey,
        signer_index: usize,
        all_pubkeys: Vec<PublicKey>,
    ) -> Result<Self, CosignError> {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);

        if signer_index >= all_pubkeys.len() {
            return Err(CosignError::InvalidSignerIndex);
        }
        if all_pubkeys[signer_index] != public_key {
            return Err(CosignError::Musig2(
                "public key at signer_index does not match derived public key".into(),
            ));
        }

        let key_agg_ctx =
            KeyAggContext::new(all_pubkeys).map_err(|e| CosignError::Musig2(e.to_string()))?;

        Ok(Self {
            secret_key,
            public_key,
            signer_index,
            key_agg_ctx,
            first_round: None,
            second_round: None,
            message: Vec::new(),
        })
    }

    pub fn aggregated_pubkey(&self) -> PublicKey {
        self.key_agg_ctx.aggregated_pubkey()
    }

    pub fn signer_index(&self) -> usize {
        self.signer_index
    }

    pub fn start_signing_session(&mut self, message: Vec<u8>) -> Result<PubNonce, CosignError> {
        self.message = message.clone();

        let first_round = FirstRound::new(
            self.key_agg_ctx.clone(),
            rand::random::<[u8; 32]>(),
            self.signer_index,
            SecNonceSpices::new()
                .with_seckey(self.secret_key)
                .with_message(&message),
        )
        .map_err(|e| CosignError::Musig2(e.to_string()))?;

        let nonce = first_round.our_public_nonce();
        self.first_round = Some(first_round);
        Ok(nonce)
    }

    pub fn receive_nonce(&mut self, signer_index: usize, nonce: PubNonce) -> Result<(), CosignError> {
        let first_round = self
            .first_round
            .as_mut()
            .ok_or_else(|| CosignError::InvalidState("first round not started".into()))?;
        first_round
            .receive_nonce(signer_index, nonce)
            .map_err(|e| CosignError::Musig2(e.to_string()))
    }

    pub fn create_partial_signature(&mut self) -> Result<PartialSignature, CosignError> {
        let message = self.message.clone();
        let first_round = self
            .first_round
            .take()
            .ok_or_else(|| CosignError::InvalidState("first round not started".into()))?;
        let second_round = first_round
            .finalize(self.secret_key, message)
            .map_err(|e| CosignError::Musig2(e.to_string()))?;
        let partial_sig = second_round.our_signature();
        self.second_round = Some(second_round);
        Ok(partial_sig)
    }

    pub fn receive_partial_signature(
        &mut self,
        signer_index: usize,
        partial_sig: PartialSignature,
    ) -> Result<(), CosignError> {
        let second_round = self
            .second_round
            .as_mut()
            .ok_or_else(|| CosignError::InvalidState("second round not started".into()))?;
        second_round
            .receive_signature(signer_index, partial_sig)
            .map_err(|e| CosignError::Musig2(e.to_string()))
    }

    pub fn create_final_signature(&mut self) -> Result<CompactSignature, CosignError> {
        let second_round = self
            .second_round
            .take()
            .ok_or_else(|| CosignError::InvalidState("second round not started".into()))?;
        second_round
            .finalize()
            .map_err(|e| CosignError::Musig2(e.to_string()))
    }
}

/// Verifies a complete aggregate signature against the roster's aggregated
/// public key.
pub fn verify_signature(
    pubkey: PublicKey,
    signature: CompactSignature,
    message: &[u8],
) -> Result<(), CosignError> {
    musig2::verify_single(pubkey, signature, message)
        .map_err(|e| CosignError::Musig2(e.to_string()))
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn two_signers_produce_a_matching_aggregate_signature() {
        let mut rng = OsRng;
        let sk1 = SecretKey::new(&mut rng);
        let sk2 = SecretKey::new(&mut rng);
        let secp = Secp256k1::new();
        let pk1 = PublicKey::from_secret_key(&secp, &sk1);
        let pk2 = PublicKey::from_secret_key(&secp, &sk2);
        let pubkeys = vec![pk1, pk2];

        let mut signer1 = CosignSigner::new(sk1, 0, pubkeys.clone()).unwrap();
        let mut signer2 = CosignSigner::new(sk2, 1, pubkeys).unwrap();

        let message = b"timestamp message".to_vec();
        let nonce1 = signer1.start_signing_session(message.clone()).unwrap();
        let nonce2 = signer2.start_signing_session(message.clone()).unwrap();
        signer1.receive_nonce(1, nonce2).unwrap();
        signer2.receive_nonce(0, nonce1).unwrap();

        let sig1 = signer1.create_partial_signature().unwrap();
        let sig2 = signer2.create_partial_signature().unwrap();
        signer1.receive_partial_signature(1, sig2).unwrap();
        signer2.receive_partial_signature(0, sig1).unwrap();

        let final1 = signer1.create_final_signature().unwrap();
        let final2 = signer2.create_final_signature().unwrap();
        assert_eq!(final1.serialize(), final2.serialize());

        verify_signature(signer1.aggregated_pubkey(), final1, &message).unwrap();
    }

    #[test]
    fn invalid_signer_index_is_rejected() {
        let mut rng = OsRng;
        let sk1 = SecretKey::new(&mut rng);
        let secp = Secp256k1::new();
        let pk1 = PublicKey::from_secret_key(&secp, &sk1);
        let err = CosignSigner::new(sk1, 5, vec![pk1]).unwrap_err();
        assert!(matches!(err, CosignError::InvalidSignerIndex));
    }
}
