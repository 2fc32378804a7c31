use async_trait::async_trait;
use secp256k1::{PublicKey, Secp256k1, SecretKey};

use pkgchain_types::{CosignDriver, PkgchainError};

use crate::signer::CosignSigner;

/// Drives a full two-round MuSig2 session in-process across every signer in
/// `secret_keys`, in roster order. This is the concrete driver a single
/// server process uses when it holds every roster signer's key (the common
/// case for the fixed, operator-configured roster this system assumes — see
/// spec §1's Non-goals). A genuinely distributed deployment instead runs one
/// `CosignSigner` per process and exchanges nonces/partial signatures over
/// the network; that transport lives in the service façade, not here.
pub struct LocalCosignDriver {
    secret_keys: Vec<SecretKey>,
}

impl LocalCosignDriver {
    pub fn new(secret_keys: Vec<SecretKey>) -> Self {
        Self { secret_keys }
    }

    pub fn public_keys(&self) -> Vec<PublicKey> {
        let secp = Secp256k1::new();
        self.secret_keys
            .iter()
            .map(|sk| PublicKey::from_secret_key(&secp, sk))
            .collect()
    }

    /// The roster's MuSig2 aggregated public key, as seen by a verifier.
    pub fn aggregated_pubkey(&self) -> Result<PublicKey, PkgchainError> {
        musig2::KeyAggContext::new(self.public_keys())
            .map(|ctx| ctx.aggregated_pubkey())
            .map_err(|e| PkgchainError::CosignFailed(e.to_string()))
    }

    /// Runs the nonce-exchange and partial-signature rounds for every
    /// signer against `message`, returning the aggregate compact signature.
    pub fn aggregate_sign(&self, message: &[u8]) -> Result<Vec<u8>, PkgchainError> {
        let pubkeys = self.public_keys();
        let mut signers: Vec<CosignSigner> = self
            .secret_keys
            .iter()
            .enumerate()
            .map(|(i, sk)| {
                CosignSigner::new(*sk, i, pubkeys.clone())
                    .map_err(|e| PkgchainError::CosignFailed(e.to_string()))
            })
            .collect::<Result<_, _>>()?;

        let nonces: Vec<_> = signers
            .iter_mut()
            .map(|s| {
                s.start_signing_session(message.to_vec())
                    .map_err(|e| PkgchainError::CosignFailed(e.to_string()))
            })
            .collect::<Result<_, _>>()?;

        for i in 0..signers.len() {
            for (j, nonce) in nonces.iter().enumerate() {
                if i != j {
                    signers[i]
                        .receive_nonce(j, nonce.clone())
                        .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
                }
            }
        }

        let partials: Vec<_> = signers
            .iter_mut()
            .map(|s| {
                s.create_partial_signature()
                    .map_err(|e| PkgchainError::CosignFailed(e.to_string()))
            })
            .collect::<Result<_, _>>()?;

        for i in 0..signers.len() {
            for (j, partial) in partials.iter().enumerate() {
                if i != j {
                    signers[i]
                        .receive_partial_signature(j, *partial)
                        .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
                }
            }
        }

        let final_sig = signers[0]
            .create_final_signature()
            .map_err(|e| PkgchainError::CosignFailed(e.to_string()))?;
        Ok(final_sig.serialize().to_vec())
    }
}

#[async_trait]
impl CosignDriver for LocalCosignDriver {
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, PkgchainError> {
        self.aggregate_sign(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[tokio::test]
    async fn drives_a_five_signer_roster() {
        let mut rng = OsRng;
        let keys: Vec<SecretKey> = (0..5).map(|_| SecretKey::new(&mut rng)).collect();
        let driver = LocalCosignDriver::new(keys);
        let sig_bytes = driver.sign(b"hello roster").await.unwrap();
        assert_eq!(sig_bytes.len(), 64);
    }
}
