//! Conversion of LCD records into the shared `Transaction` shape

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use crate::error::{ChainBridgeError, ChainBridgeResult, ErrorCodeTable};
use crate::types::{Block, Transaction, TransactionResult, TxData, TxFee, TxLog, TxStatus};
use crate::utils::crypto::sha256;

use super::provider::LcdBlock;
use super::types::{BroadcastResponse, CosmosTxData, CosmosTxFee, TxInfo};

const CONTRACT_ADDRESS_KEYS: [&str; 2] = ["_contract_address", "contract_address"];

/// Address of a contract instantiated by the transaction, from its events
fn instantiated_contract(info: &TxInfo) -> Option<String> {
    info.logs
        .iter()
        .flat_map(|log| log.events.iter())
        .filter(|event| event.get("type").and_then(Value::as_str) == Some("instantiate"))
        .flat_map(|event| {
            event
                .get("attributes")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        })
        .find_map(|attribute| {
            let key = attribute.get("key").and_then(Value::as_str)?;
            if CONTRACT_ADDRESS_KEYS.contains(&key) {
                attribute.get("value").and_then(Value::as_str).map(str::to_string)
            } else {
                None
            }
        })
}

pub fn normalize_transaction(info: &TxInfo) -> Transaction {
    Transaction {
        txhash: info.txhash.clone(),
        block_number: info.height,
        status: TxStatus::from_success(info.code == 0),
        fee: TxFee::Cosmos(CosmosTxFee {
            gas_wanted: info.gas_wanted,
            gas_used: info.gas_used,
            amount: info.fee.clone(),
        }),
        data: TxData::Cosmos(CosmosTxData {
            messages: info.messages.clone(),
            memo: info.memo.clone(),
            timeout_height: info.timeout_height,
        }),
        logs: info.logs.iter().cloned().map(TxLog::Cosmos).collect(),
        contract_address: instantiated_contract(info),
    }
}

/// Result of a block-mode broadcast.
///
/// A non-zero code at height 0 never made it into a block and is raised as
/// a chain failure; a non-zero code inside a block is a failed transaction.
pub fn broadcast_result(
    response: &BroadcastResponse,
    table: &ErrorCodeTable,
) -> ChainBridgeResult<TransactionResult> {
    let raw_log = (!response.raw_log.is_empty()).then(|| response.raw_log.clone());

    if response.code != 0 && response.height == 0 {
        return Err(ChainBridgeError::chain_failure(
            response.code,
            raw_log.as_deref(),
            table,
        ));
    }

    Ok(TransactionResult {
        txhash: response.txhash.clone(),
        status: TxStatus::from_success(response.code == 0),
        raw_log,
    })
}

fn base64_to_upper_hex(value: &str) -> ChainBridgeResult<String> {
    Ok(hex::encode_upper(STANDARD.decode(value)?))
}

pub fn normalize_block(block: &LcdBlock) -> ChainBridgeResult<Block> {
    let header = &block.block.header;
    let timestamp = chrono::DateTime::parse_from_rfc3339(&header.time)
        .map_err(|e| {
            ChainBridgeError::provider(format!("Invalid block time {:?}: {}", header.time, e))
        })?
        .timestamp();

    let txs = block
        .block
        .data
        .txs
        .iter()
        .map(|tx| Ok(hex::encode_upper(sha256(&STANDARD.decode(tx)?))))
        .collect::<ChainBridgeResult<Vec<_>>>()?;

    Ok(Block {
        number: header.height,
        hash: base64_to_upper_hex(&block.block_id.hash)?,
        miner: base64_to_upper_hex(&header.proposer_address)?,
        timestamp: u64::try_from(timestamp).unwrap_or_default(),
        txs,
    })
}
