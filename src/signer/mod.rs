//! Signer Module
//!
//! The single capability every chain engine signs through. A `Signer`
//! exposes its public key and signs 32-byte digests; it never hands out
//! the secret it is backed by.
//!
//! - **raw_key**: in-memory private key (hex or base64)
//! - **mnemonic**: BIP39/BIP32 derived key

pub mod mnemonic;
pub mod raw_key;

pub use mnemonic::{derive_private_key, generate_mnemonic, DerivationOptions, MnemonicSigner};
pub use raw_key::{parse_private_key, RawKeySigner};

use async_trait::async_trait;

use crate::error::ChainBridgeResult;

/// Custody-agnostic signing capability.
///
/// Implementations may be local keys, hardware devices or remote KMS
/// clients, so both methods are async.
#[async_trait]
pub trait Signer: Send + Sync {
    /// SEC1 public key: 33 bytes when `compressed`, else 65 bytes.
    async fn public_key(&self, compressed: bool) -> ChainBridgeResult<Vec<u8>>;

    /// Compact `r || s` ECDSA signature over `digest`, without recovery id.
    async fn sign(&self, digest: &[u8; 32]) -> ChainBridgeResult<[u8; 64]>;
}
