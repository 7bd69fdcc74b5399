//! Hashing and address helpers shared by both chain engines.

use crate::error::{ChainBridgeError, ChainBridgeResult};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

/// Keccak256 hash (used for Ethereum addresses and digests)
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// RIPEMD160(SHA256(data)), the Cosmos secp256k1 address hash
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(sha256(data));
    hasher.finalize().into()
}

/// Hash of an uncompressed public key as compared during recovery search
pub fn public_key_hash(uncompressed: &[u8]) -> ChainBridgeResult<[u8; 32]> {
    match uncompressed {
        [0x04, rest @ ..] if rest.len() == 64 => Ok(keccak256(rest)),
        _ => Err(ChainBridgeError::crypto_error(format!(
            "Expected 65-byte uncompressed public key, got {} bytes",
            uncompressed.len()
        ))),
    }
}

/// Ethereum address bytes for an uncompressed public key
pub fn eth_address_bytes(uncompressed: &[u8]) -> ChainBridgeResult<[u8; 20]> {
    let hash = public_key_hash(uncompressed)?;
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Ok(address)
}

/// Convert raw address bytes to checksummed Ethereum address
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut result = String::from("0x");
    for (i, ch) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };

        if ch.is_ascii_digit() {
            result.push(ch);
        } else if nibble >= 8 {
            result.push(ch.to_ascii_uppercase());
        } else {
            result.push(ch);
        }
    }

    result
}

/// Parse a `0x`-prefixed (or bare) 20-byte hex address
pub fn parse_eth_address(address: &str) -> ChainBridgeResult<[u8; 20]> {
    let stripped = strip_hex_prefix(address);
    let bytes = hex::decode(stripped)
        .map_err(|e| ChainBridgeError::invalid_input(format!("Invalid address {}: {}", address, e)))?;
    bytes
        .try_into()
        .map_err(|_| ChainBridgeError::invalid_input(format!("Address must be 20 bytes: {}", address)))
}

pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}
