//! Raw private key signer
//!
//! SECURITY: The key is held in a `Zeroizing` buffer and never leaves
//! this module; `Debug` output is redacted.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use super::Signer;
use crate::error::{ChainBridgeError, ChainBridgeResult};

const INVALID_PRIVATE_KEY: &str = "Invalid private key.";

pub struct RawKeySigner {
    secret: Zeroizing<[u8; 32]>,
}

impl RawKeySigner {
    /// Build from raw 32-byte key material
    pub fn from_bytes(bytes: &[u8]) -> ChainBridgeResult<Self> {
        let secret: [u8; 32] = bytes.try_into().map_err(|_| {
            ChainBridgeError::key_format(INVALID_PRIVATE_KEY)
                .with_details(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        let secret = Zeroizing::new(secret);

        SecretKey::from_slice(&secret[..]).map_err(|_| {
            ChainBridgeError::key_format(INVALID_PRIVATE_KEY).with_details("scalar out of range")
        })?;

        Ok(Self { secret })
    }

    /// Build from a hex (optionally `0x`-prefixed) or base64 encoded key.
    ///
    /// Hex is tried first, so a string valid in both alphabets is hex.
    pub fn from_encoded(encoded: &str) -> ChainBridgeResult<Self> {
        let bytes = parse_private_key(encoded)?;
        Self::from_bytes(&bytes[..])
    }

    pub(crate) fn secret_key(&self) -> ChainBridgeResult<SecretKey> {
        Ok(SecretKey::from_slice(&self.secret[..])?)
    }

    /// `0x`-prefixed hex of the key, for account export only
    pub(crate) fn export_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.secret[..]))
    }

    fn public(&self) -> ChainBridgeResult<PublicKey> {
        let secp = Secp256k1::signing_only();
        Ok(PublicKey::from_secret_key(&secp, &self.secret_key()?))
    }
}

/// Decode a private key string, trying hex before base64
pub fn parse_private_key(encoded: &str) -> ChainBridgeResult<Zeroizing<Vec<u8>>> {
    let trimmed = encoded.trim();

    if is_hex_key(trimmed) {
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        return hex::decode(digits)
            .map(Zeroizing::new)
            .map_err(|e| ChainBridgeError::key_format(INVALID_PRIVATE_KEY).with_details(e.to_string()));
    }

    if is_base64_key(trimmed) {
        return STANDARD
            .decode(trimmed)
            .map(Zeroizing::new)
            .map_err(|e| ChainBridgeError::key_format(INVALID_PRIVATE_KEY).with_details(e.to_string()));
    }

    Err(ChainBridgeError::key_format(INVALID_PRIVATE_KEY))
}

fn is_hex_key(value: &str) -> bool {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_base64_key(value: &str) -> bool {
    if value.is_empty() || value.len() % 4 != 0 {
        return false;
    }
    let body = value.trim_end_matches('=');
    value.len() - body.len() <= 2
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/')
}

#[async_trait]
impl Signer for RawKeySigner {
    async fn public_key(&self, compressed: bool) -> ChainBridgeResult<Vec<u8>> {
        let public = self.public()?;
        Ok(if compressed {
            public.serialize().to_vec()
        } else {
            public.serialize_uncompressed().to_vec()
        })
    }

    async fn sign(&self, digest: &[u8; 32]) -> ChainBridgeResult<[u8; 64]> {
        let secp = Secp256k1::signing_only();
        let message = Message::from_digest(*digest);
        let signature = secp.sign_ecdsa(&message, &self.secret_key()?);
        Ok(signature.serialize_compact())
    }
}

// Implement Debug manually to avoid exposing the key
impl std::fmt::Debug for RawKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawKeySigner")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
