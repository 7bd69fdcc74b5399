//! EVM request, response and normalized record types

use serde::{Deserialize, Serialize};

use crate::utils::quantity::to_hex_quantity;

/// EIP-2718 envelope kinds this crate signs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvmTxType {
    /// Type 0, EIP-155 replay protected
    Legacy,
    /// Type 2 fee market transaction
    Eip1559,
}

impl EvmTxType {
    pub fn type_byte(&self) -> Option<u8> {
        match self {
            Self::Legacy => None,
            Self::Eip1559 => Some(0x02),
        }
    }
}

/// Caller-facing transaction request, filled in by `create_tx`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmCreateTxData {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default)]
    pub value: u128,
    /// Hex call data
    pub data: Option<String>,
    pub nonce: Option<u64>,
    pub gas: Option<u64>,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub chain_id: Option<u64>,
    #[serde(rename = "type")]
    pub tx_type: Option<EvmTxType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmFeeConfig {
    pub gas: u64,
    pub gas_price: u128,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmTxFee {
    pub gas: u64,
    pub gas_price: u128,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub gas_used: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmTxData {
    pub from: String,
    pub to: Option<String>,
    pub value: u128,
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmTxLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub log_index: u64,
}

// =============================================================================
// JSON-RPC payloads (hex quantities, coerced during normalization)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: String,
    pub block_number: Option<String>,
    pub from: String,
    pub to: Option<String>,
    pub value: String,
    pub input: String,
    pub nonce: String,
    pub gas: String,
    pub gas_price: Option<String>,
    pub max_fee_per_gas: Option<String>,
    pub max_priority_fee_per_gas: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: String,
    pub block_number: String,
    /// `0x1` success, `0x0` reverted
    pub status: Option<String>,
    pub gas_used: String,
    pub effective_gas_price: Option<String>,
    pub contract_address: Option<String>,
    #[serde(default)]
    pub logs: Vec<RpcLog>,
}

impl RpcReceipt {
    pub fn succeeded(&self) -> bool {
        matches!(self.status.as_deref(), Some(s) if s != "0x0" && s != "0x")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    pub data: String,
    pub log_index: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    pub number: String,
    pub hash: String,
    pub miner: String,
    pub timestamp: String,
    /// Hashes, since blocks are fetched without full transactions
    #[serde(default)]
    pub transactions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeHistory {
    pub oldest_block: String,
    #[serde(default)]
    pub base_fee_per_gas: Vec<String>,
    /// Absent when no percentiles were requested
    pub reward: Option<Vec<Vec<String>>>,
}

/// Arguments of `eth_call` / `eth_estimateGas`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl From<&EvmCreateTxData> for CallRequest {
    fn from(tx: &EvmCreateTxData) -> Self {
        Self {
            from: tx.from.clone(),
            to: tx.to.clone(),
            value: (tx.value > 0).then(|| to_hex_quantity(tx.value)),
            data: tx.data.clone(),
        }
    }
}
