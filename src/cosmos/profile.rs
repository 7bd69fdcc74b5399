//! Per-chain parameters of Cosmos SDK chains
//!
//! Everything that differs between the supported chains lives here, so the
//! engine itself is chain-agnostic.

use bech32::{ToBase32, Variant};
use secp256k1::PublicKey;

use crate::error::{ChainBridgeError, ChainBridgeResult, ErrorCodeTable};
use crate::types::ChainType;
use crate::utils::crypto::{eth_address_bytes, hash160, keccak256, sha256};

use super::error_codes::SDK_ERROR_CODES;
use super::pubkey::AccountPublicKey;
use super::types::DecCoin;

/// Hash applied to sign bytes before ECDSA
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestKind {
    Sha256,
    Keccak256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// `ripemd160(sha256(compressed))` addresses
    Secp256k1,
    /// Ethereum-style `keccak256(uncompressed)[12..]` addresses
    EthSecp256k1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CosmosChainProfile {
    pub chain: ChainType,
    pub bech32_prefix: &'static str,
    pub fee_denom: &'static str,
    pub decimals: u8,
    pub coin_type: u32,
    pub digest: DigestKind,
    pub key_type: KeyType,
    pub default_gas_price: &'static str,
    pub error_codes: ErrorCodeTable,
}

pub const XPLA: CosmosChainProfile = CosmosChainProfile {
    chain: ChainType::Xpla,
    bech32_prefix: "xpla",
    fee_denom: "axpla",
    decimals: 18,
    coin_type: 60,
    digest: DigestKind::Keccak256,
    key_type: KeyType::EthSecp256k1,
    default_gas_price: "850000000000",
    error_codes: SDK_ERROR_CODES,
};

pub const TERRA: CosmosChainProfile = CosmosChainProfile {
    chain: ChainType::Terra,
    bech32_prefix: "terra",
    fee_denom: "uluna",
    decimals: 6,
    coin_type: 330,
    digest: DigestKind::Sha256,
    key_type: KeyType::Secp256k1,
    default_gas_price: "0.015",
    error_codes: SDK_ERROR_CODES,
};

impl CosmosChainProfile {
    pub fn for_chain(chain: ChainType) -> ChainBridgeResult<&'static CosmosChainProfile> {
        match chain {
            ChainType::Xpla => Ok(&XPLA),
            ChainType::Terra => Ok(&TERRA),
            other => Err(ChainBridgeError::dependency_missing(format!(
                "{} is not a Cosmos SDK chain",
                other
            ))),
        }
    }

    pub fn digest(&self, sign_bytes: &[u8]) -> [u8; 32] {
        match self.digest {
            DigestKind::Sha256 => sha256(sign_bytes),
            DigestKind::Keccak256 => keccak256(sign_bytes),
        }
    }

    pub fn default_gas_prices(&self) -> Vec<DecCoin> {
        vec![DecCoin::new(self.default_gas_price, self.fee_denom)]
    }

    /// Chain-typed public key for a 33-byte compressed key
    pub fn public_key(&self, compressed: &[u8]) -> AccountPublicKey {
        match self.key_type {
            KeyType::Secp256k1 => AccountPublicKey::Secp256k1(compressed.to_vec()),
            KeyType::EthSecp256k1 => AccountPublicKey::EthSecp256k1(compressed.to_vec()),
        }
    }

    /// Bech32 account address of a compressed public key
    pub fn address(&self, compressed: &[u8]) -> ChainBridgeResult<String> {
        let raw: Vec<u8> = match self.key_type {
            KeyType::Secp256k1 => hash160(compressed).to_vec(),
            KeyType::EthSecp256k1 => {
                let uncompressed = PublicKey::from_slice(compressed)?.serialize_uncompressed();
                eth_address_bytes(&uncompressed)?.to_vec()
            }
        };
        Ok(bech32::encode(self.bech32_prefix, raw.to_base32(), Variant::Bech32)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // compressed key of private key 0x01..01
    const PUBKEY: &str = "031b84c5567b126440995d3ed5aaba0565d71e1834604819ff9c17f5e9d5dd078f";

    #[test]
    fn test_profiles() {
        assert_eq!(CosmosChainProfile::for_chain(ChainType::Xpla).unwrap().coin_type, 60);
        assert_eq!(CosmosChainProfile::for_chain(ChainType::Terra).unwrap().fee_denom, "uluna");
        assert!(CosmosChainProfile::for_chain(ChainType::Ethereum).is_err());
        assert_eq!(TERRA.default_gas_prices()[0].to_string(), "0.015uluna");
        assert_eq!(XPLA.default_gas_prices()[0].to_string(), "850000000000axpla");
    }

    #[test]
    fn test_addresses_use_profile_prefix() {
        let key = hex::decode(PUBKEY).unwrap();
        let terra = TERRA.address(&key).unwrap();
        let xpla = XPLA.address(&key).unwrap();
        assert!(terra.starts_with("terra1"));
        assert!(xpla.starts_with("xpla1"));

        // xpla addresses carry the Ethereum address bytes
        let (_, data, _) = bech32::decode(&xpla).unwrap();
        let bytes: Vec<u8> = bech32::FromBase32::from_base32(&data).unwrap();
        assert_eq!(
            crate::utils::crypto::to_checksum_address(&bytes),
            "0x1a642f0E3c3aF545E7AcBD38b07251B3990914F1"
        );
    }

    #[test]
    fn test_digest_kind() {
        assert_eq!(TERRA.digest(b"abc"), sha256(b"abc"));
        assert_eq!(XPLA.digest(b"abc"), keccak256(b"abc"));
    }
}
