//! Bridges a `Signer` to a Cosmos chain's key conventions
//!
//! The chain profile decides the digest (sha256 or keccak256), the public
//! key type and the address format; the wrapped signer only ever sees a
//! 32-byte digest.

use crate::error::{ChainBridgeError, ChainBridgeResult};
use crate::signer::Signer;

use super::profile::CosmosChainProfile;
use super::pubkey::AccountPublicKey;

pub struct CosmosSignerKey<'a, S: ?Sized> {
    signer: &'a S,
    profile: &'static CosmosChainProfile,
}

impl<'a, S: Signer + ?Sized> CosmosSignerKey<'a, S> {
    pub fn new(signer: &'a S, profile: &'static CosmosChainProfile) -> Self {
        Self { signer, profile }
    }

    pub async fn compressed_public_key(&self) -> ChainBridgeResult<Vec<u8>> {
        let key = self.signer.public_key(true).await?;
        if key.len() != 33 {
            return Err(ChainBridgeError::crypto_error(format!(
                "Signer returned a {}-byte key, expected 33 compressed bytes",
                key.len()
            )));
        }
        Ok(key)
    }

    pub async fn public_key(&self) -> ChainBridgeResult<AccountPublicKey> {
        Ok(self.profile.public_key(&self.compressed_public_key().await?))
    }

    pub async fn address(&self) -> ChainBridgeResult<String> {
        self.profile.address(&self.compressed_public_key().await?)
    }

    /// Hash `sign_bytes` with the chain digest and sign the result
    pub async fn sign(&self, sign_bytes: &[u8]) -> ChainBridgeResult<[u8; 64]> {
        let digest = self.profile.digest(sign_bytes);
        self.signer.sign(&digest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmos::profile::{TERRA, XPLA};
    use crate::signer::RawKeySigner;
    use secp256k1::ecdsa::Signature;
    use secp256k1::{Message, PublicKey, Secp256k1};

    #[tokio::test]
    async fn test_signature_verifies_against_profile_digest() {
        let signer = RawKeySigner::from_bytes(&[0x01; 32]).unwrap();
        let secp = Secp256k1::verification_only();

        for profile in [&TERRA, &XPLA] {
            let key = CosmosSignerKey::new(&signer, profile);
            let signature = key.sign(b"sign bytes").await.unwrap();
            let public = PublicKey::from_slice(&key.compressed_public_key().await.unwrap()).unwrap();

            let message = Message::from_digest(profile.digest(b"sign bytes"));
            let signature = Signature::from_compact(&signature).unwrap();
            assert!(secp.verify_ecdsa(&message, &signature, &public).is_ok());
        }
    }

    #[tokio::test]
    async fn test_public_key_type_follows_profile() {
        let signer = RawKeySigner::from_bytes(&[0x01; 32]).unwrap();
        assert!(matches!(
            CosmosSignerKey::new(&signer, &TERRA).public_key().await.unwrap(),
            AccountPublicKey::Secp256k1(_)
        ));
        assert!(matches!(
            CosmosSignerKey::new(&signer, &XPLA).public_key().await.unwrap(),
            AccountPublicKey::EthSecp256k1(_)
        ));
    }
}
