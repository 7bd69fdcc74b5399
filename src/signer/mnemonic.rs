//! BIP39 / BIP32 derived signer
//!
//! SECURITY: Seeds and derived keys are wrapped in `Zeroizing` and cleared
//! on drop.

use std::str::FromStr;

use async_trait::async_trait;
use bip39::Mnemonic;
use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::secp256k1::Secp256k1;
use bitcoin::Network;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{RawKeySigner, Signer};
use crate::error::{ChainBridgeError, ChainBridgeResult};

const DERIVATION_FAILED: &str = "Failed to derive key pair from mnemonic passphrase";

/// BIP44 coordinates for `m/44'/{coin_type}'/{account}'/0/{index}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivationOptions {
    pub account: u32,
    pub index: u32,
    pub coin_type: u32,
}

impl Default for DerivationOptions {
    fn default() -> Self {
        Self {
            account: 0,
            index: 0,
            coin_type: 60,
        }
    }
}

impl DerivationOptions {
    pub fn with_coin_type(coin_type: u32) -> Self {
        Self {
            coin_type,
            ..Self::default()
        }
    }

    pub fn path(&self) -> String {
        format!(
            "m/44'/{}'/{}'/0/{}",
            self.coin_type, self.account, self.index
        )
    }
}

/// Signer backed by a key derived from a mnemonic phrase
#[derive(Debug)]
pub struct MnemonicSigner {
    inner: RawKeySigner,
    options: DerivationOptions,
}

impl MnemonicSigner {
    pub fn new(mnemonic: &str, options: DerivationOptions) -> ChainBridgeResult<Self> {
        let key = derive_private_key(mnemonic, &options)?;
        Ok(Self {
            inner: RawKeySigner::from_bytes(&key[..])?,
            options,
        })
    }

    pub fn options(&self) -> &DerivationOptions {
        &self.options
    }

    pub(crate) fn raw(&self) -> &RawKeySigner {
        &self.inner
    }
}

#[async_trait]
impl Signer for MnemonicSigner {
    async fn public_key(&self, compressed: bool) -> ChainBridgeResult<Vec<u8>> {
        self.inner.public_key(compressed).await
    }

    async fn sign(&self, digest: &[u8; 32]) -> ChainBridgeResult<[u8; 64]> {
        self.inner.sign(digest).await
    }
}

/// Derive the 32-byte private key at the BIP44 path described by `options`
pub fn derive_private_key(
    mnemonic: &str,
    options: &DerivationOptions,
) -> ChainBridgeResult<Zeroizing<[u8; 32]>> {
    let mnemonic = Mnemonic::parse(mnemonic.trim())
        .map_err(|e| ChainBridgeError::key_format(format!("Invalid mnemonic: {}", e)))?;
    let seed = Zeroizing::new(mnemonic.to_seed(""));

    let secp = Secp256k1::new();
    let path = DerivationPath::from_str(&options.path())
        .map_err(|e| ChainBridgeError::invalid_input(DERIVATION_FAILED).with_details(e.to_string()))?;
    let child = Xpriv::new_master(Network::Bitcoin, seed.as_ref())
        .and_then(|master| master.derive_priv(&secp, &path))
        .map_err(|e| ChainBridgeError::crypto_error(DERIVATION_FAILED).with_details(e.to_string()))?;

    Ok(Zeroizing::new(child.private_key.secret_bytes()))
}

/// Fresh 24-word English mnemonic from OS entropy
pub fn generate_mnemonic() -> ChainBridgeResult<String> {
    let mut entropy = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(entropy.as_mut());

    let mnemonic = Mnemonic::from_entropy(entropy.as_ref())
        .map_err(|e| ChainBridgeError::crypto_error(format!("Failed to create mnemonic: {}", e)))?;
    Ok(mnemonic.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::utils::crypto::{eth_address_bytes, to_checksum_address};

    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_default_path() {
        assert_eq!(DerivationOptions::default().path(), "m/44'/60'/0'/0/0");
        assert_eq!(DerivationOptions::with_coin_type(330).path(), "m/44'/330'/0'/0/0");
    }

    #[tokio::test]
    async fn test_known_ethereum_address() {
        let signer = MnemonicSigner::new(TEST_MNEMONIC, DerivationOptions::default()).unwrap();
        let public = signer.public_key(false).await.unwrap();
        let address = to_checksum_address(&eth_address_bytes(&public).unwrap());
        assert_eq!(address, "0x9858EfFD232B4033E47d90003D41EC34EcaEda94");
    }

    #[tokio::test]
    async fn test_index_changes_key() {
        let first = MnemonicSigner::new(TEST_MNEMONIC, DerivationOptions::default()).unwrap();
        let second = MnemonicSigner::new(
            TEST_MNEMONIC,
            DerivationOptions { index: 1, ..Default::default() },
        )
        .unwrap();
        assert_ne!(
            first.public_key(true).await.unwrap(),
            second.public_key(true).await.unwrap()
        );
    }

    #[test]
    fn test_invalid_mnemonic() {
        let err = MnemonicSigner::new("abandon abandon", DerivationOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::KeyFormat);
    }

    #[test]
    fn test_generate_mnemonic() {
        let phrase = generate_mnemonic().unwrap();
        assert_eq!(phrase.split_whitespace().count(), 24);
        assert!(derive_private_key(&phrase, &DerivationOptions::default()).is_ok());
    }
}
