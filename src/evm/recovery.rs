//! Recovery-id search
//!
//! Signers return a bare `r || s`. EVM transactions also need the recovery
//! id, so both candidates are tried and the one whose recovered key hashes
//! to the signer's known public-key hash wins.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1};

use crate::error::{ChainBridgeError, ChainBridgeResult};
use crate::utils::crypto::keccak256;

/// `v` is 27 or 28; transaction encoders re-map it per type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveredSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl RecoveredSignature {
    /// 65-byte `r || s || v` as used by `personal_sign`
    pub fn to_rsv_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }
}

const CANDIDATES: [u8; 2] = [27, 28];

/// Find the `v` for which `ecrecover(digest, v, r, s)` matches `public_key_hash`.
///
/// `public_key_hash` is keccak256 of the 64-byte uncompressed key (no `0x04`).
pub fn recover_signature(
    digest: &[u8; 32],
    public_key_hash: &[u8; 32],
    signature: &[u8; 64],
) -> ChainBridgeResult<RecoveredSignature> {
    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(*digest);

    for v in CANDIDATES {
        let recovery_id = RecoveryId::from_i32((v - 27) as i32)?;
        let Ok(candidate) = RecoverableSignature::from_compact(signature, recovery_id) else {
            continue;
        };
        let Ok(public_key) = secp.recover_ecdsa(&message, &candidate) else {
            continue;
        };

        let uncompressed = public_key.serialize_uncompressed();
        if keccak256(&uncompressed[1..]) == *public_key_hash {
            let mut r = [0u8; 32];
            let mut s = [0u8; 32];
            r.copy_from_slice(&signature[..32]);
            s.copy_from_slice(&signature[32..]);
            return Ok(RecoveredSignature { r, s, v });
        }
    }

    Err(ChainBridgeError::recovery_exhausted(
        "No recovery id reproduces the signer's public key",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::SecretKey;

    fn key_and_hash(byte: u8) -> (SecretKey, [u8; 32]) {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[byte; 32]).unwrap();
        let public = secret.public_key(&secp).serialize_uncompressed();
        (secret, keccak256(&public[1..]))
    }

    #[test]
    fn test_recovers_matching_v() {
        let secp = Secp256k1::new();
        let (secret, hash) = key_and_hash(0x46);
        let digest = keccak256(b"recover me");
        let (expected_id, compact) = secp
            .sign_ecdsa_recoverable(&Message::from_digest(digest), &secret)
            .serialize_compact();

        let recovered = recover_signature(&digest, &hash, &compact).unwrap();
        assert_eq!(recovered.v as i32, expected_id.to_i32() + 27);
        assert_eq!(&recovered.to_rsv_bytes()[..64], &compact[..]);
    }

    #[test]
    fn test_wrong_key_is_exhausted() {
        let secp = Secp256k1::new();
        let (secret, _) = key_and_hash(0x46);
        let (_, other_hash) = key_and_hash(0x47);
        let digest = keccak256(b"recover me");
        let (_, compact) = secp
            .sign_ecdsa_recoverable(&Message::from_digest(digest), &secret)
            .serialize_compact();

        let err = recover_signature(&digest, &other_hash, &compact).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RecoveryExhausted);
    }

    #[test]
    fn test_garbage_signature_is_exhausted() {
        let (_, hash) = key_and_hash(0x46);
        let err = recover_signature(&[0x01; 32], &hash, &[0u8; 64]).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::RecoveryExhausted);
    }
}
