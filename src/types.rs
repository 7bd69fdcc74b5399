//! Shared types for ChainBridge Core
//!
//! Records that every engine produces. Chain-native shapes live in
//! `evm::types` and `cosmos::types` and are carried here through
//! externally tagged unions (`{"evm": {...}}`), so callers branch on an
//! explicit discriminant.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cosmos::types::{CosmosFeeConfig, CosmosTxData, CosmosTxFee, CosmosTxLog};
use crate::error::ChainBridgeError;
use crate::evm::types::{EvmFeeConfig, EvmTxData, EvmTxFee, EvmTxLog};

// =============================================================================
// Chain Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    Ethereum,
    Polygon,
    Xpla,
    Terra,
}

impl ChainType {
    pub const ALL: [ChainType; 4] = [
        ChainType::Ethereum,
        ChainType::Polygon,
        ChainType::Xpla,
        ChainType::Terra,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainType::Ethereum => "ethereum",
            ChainType::Polygon => "polygon",
            ChainType::Xpla => "xpla",
            ChainType::Terra => "terra",
        }
    }

    pub fn is_evm(&self) -> bool {
        matches!(self, ChainType::Ethereum | ChainType::Polygon)
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainType {
    type Err = ChainBridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChainType::ALL
            .iter()
            .copied()
            .find(|chain| chain.as_str() == s.to_ascii_lowercase())
            .ok_or_else(|| {
                let supported = ChainType::ALL
                    .iter()
                    .map(|c| format!("\"{}\"", c))
                    .collect::<Vec<_>>()
                    .join(", ");
                ChainBridgeError::dependency_missing(format!(
                    "Wrong client: \"{}\" given. Supported clients are: {}",
                    s, supported
                ))
            })
    }
}

// =============================================================================
// Accounts & Balances
// =============================================================================

/// Key material for a freshly created or imported account
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: String,
    pub public_key: Option<String>,
    pub private_key: String,
    pub mnemonic: Option<String>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .field("mnemonic", &self.mnemonic.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub nonce: u64,
    pub account_number: Option<u64>,
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub value: u128,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub hash: String,
    pub miner: String,
    /// Unix seconds
    pub timestamp: u64,
    pub txs: Vec<String>,
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Success,
    Failure,
}

impl TxStatus {
    pub fn from_success(success: bool) -> Self {
        if success {
            TxStatus::Success
        } else {
            TxStatus::Failure
        }
    }
}

/// Outcome of a broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub txhash: String,
    pub status: TxStatus,
    pub raw_log: Option<String>,
}

impl TransactionResult {
    pub fn pending(txhash: impl Into<String>) -> Self {
        Self {
            txhash: txhash.into(),
            status: TxStatus::Pending,
            raw_log: None,
        }
    }
}

/// A transaction as observed on chain, normalized across engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub txhash: String,
    pub block_number: u64,
    pub status: TxStatus,
    pub fee: TxFee,
    pub data: TxData,
    pub logs: Vec<TxLog>,
    pub contract_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxFee {
    Evm(EvmTxFee),
    Cosmos(CosmosTxFee),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxData {
    Evm(EvmTxData),
    Cosmos(CosmosTxData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxLog {
    Evm(EvmTxLog),
    Cosmos(CosmosTxLog),
}

/// Fee parameters computed for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeConfig {
    Evm(EvmFeeConfig),
    Cosmos(CosmosFeeConfig),
}
