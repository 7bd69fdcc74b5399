//! Conversion of JSON-RPC records into the shared `Transaction` shape

use crate::error::ChainBridgeResult;
use crate::types::{Block, Transaction, TransactionResult, TxData, TxFee, TxLog, TxStatus};
use crate::utils::crypto::{keccak256, to_checksum_address};
use crate::utils::quantity::{parse_hex_u128, parse_hex_u64};

use super::types::{EvmTxData, EvmTxFee, EvmTxLog, RpcBlock, RpcLog, RpcReceipt, RpcTransaction};

/// Event emitted by factory contracts: `ContractCreated(address)`
pub fn contract_created_topic() -> String {
    format!("0x{}", hex::encode(keccak256(b"ContractCreated(address)")))
}

fn parse_opt_u128(value: Option<&str>) -> ChainBridgeResult<Option<u128>> {
    value.map(parse_hex_u128).transpose()
}

/// Contract address from the receipt, else from the last creation event
pub fn contract_address(receipt: &RpcReceipt) -> Option<String> {
    if let Some(address) = receipt.contract_address.as_deref().filter(|a| !a.is_empty()) {
        return Some(address.to_string());
    }

    let topic = contract_created_topic();
    receipt
        .logs
        .iter()
        .rev()
        .filter(|log| log.topics.first().is_some_and(|t| t.eq_ignore_ascii_case(&topic)))
        .find_map(|log| {
            let word = hex::decode(log.topics.get(1)?.trim_start_matches("0x")).ok()?;
            (word.len() == 32).then(|| to_checksum_address(&word[12..]))
        })
}

fn normalize_log(log: &RpcLog) -> ChainBridgeResult<TxLog> {
    Ok(TxLog::Evm(EvmTxLog {
        address: log.address.clone(),
        topics: log.topics.clone(),
        data: log.data.clone(),
        log_index: log.log_index.as_deref().map(parse_hex_u64).transpose()?.unwrap_or(0),
    }))
}

/// `receipt` is `None` while the transaction is still in the mempool
pub fn normalize_transaction(
    tx: &RpcTransaction,
    receipt: Option<&RpcReceipt>,
) -> ChainBridgeResult<Transaction> {
    let status = match receipt {
        Some(r) => TxStatus::from_success(r.succeeded()),
        None => TxStatus::Pending,
    };

    let block_number = match (receipt, tx.block_number.as_deref()) {
        (Some(r), _) => parse_hex_u64(&r.block_number)?,
        (None, Some(n)) => parse_hex_u64(n)?,
        (None, None) => 0,
    };

    let gas_price = match receipt.and_then(|r| r.effective_gas_price.as_deref()) {
        Some(price) => parse_hex_u128(price)?,
        None => parse_opt_u128(tx.gas_price.as_deref())?.unwrap_or(0),
    };

    let fee = EvmTxFee {
        gas: parse_hex_u64(&tx.gas)?,
        gas_price,
        max_fee_per_gas: parse_opt_u128(tx.max_fee_per_gas.as_deref())?,
        max_priority_fee_per_gas: parse_opt_u128(tx.max_priority_fee_per_gas.as_deref())?,
        gas_used: receipt.map(|r| parse_hex_u64(&r.gas_used)).transpose()?.unwrap_or(0),
    };

    let data = EvmTxData {
        from: tx.from.clone(),
        to: tx.to.clone(),
        value: parse_hex_u128(&tx.value)?,
        input: tx.input.clone(),
    };

    let logs = receipt
        .map(|r| r.logs.iter().map(normalize_log).collect::<ChainBridgeResult<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();

    Ok(Transaction {
        txhash: tx.hash.clone(),
        block_number,
        status,
        fee: TxFee::Evm(fee),
        data: TxData::Evm(data),
        logs,
        contract_address: receipt.and_then(contract_address),
    })
}

pub fn receipt_result(receipt: &RpcReceipt) -> TransactionResult {
    let status = TxStatus::from_success(receipt.succeeded());
    TransactionResult {
        txhash: receipt.transaction_hash.clone(),
        status,
        raw_log: (status == TxStatus::Failure).then(|| "execution reverted".to_string()),
    }
}

pub fn normalize_block(block: &RpcBlock) -> ChainBridgeResult<Block> {
    Ok(Block {
        number: parse_hex_u64(&block.number)?,
        hash: block.hash.clone(),
        miner: block.miner.clone(),
        timestamp: parse_hex_u64(&block.timestamp)?,
        txs: block.transactions.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc_tx() -> RpcTransaction {
        RpcTransaction {
            hash: "0xabc".into(),
            block_number: Some("0x10".into()),
            from: "0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F".into(),
            to: None,
            value: "0xde0b6b3a7640000".into(),
            input: "0x6080".into(),
            nonce: "0x9".into(),
            gas: "0x5208".into(),
            gas_price: Some("0x4a817c800".into()),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            tx_type: Some("0x0".into()),
        }
    }

    fn receipt(status: &str) -> RpcReceipt {
        RpcReceipt {
            transaction_hash: "0xabc".into(),
            block_number: "0x11".into(),
            status: Some(status.into()),
            gas_used: "0x5208".into(),
            effective_gas_price: Some("0x3b9aca00".into()),
            contract_address: None,
            logs: Vec::new(),
        }
    }

    #[test]
    fn test_numbers_are_coerced() {
        let tx = normalize_transaction(&rpc_tx(), Some(&receipt("0x1"))).unwrap();
        assert_eq!(tx.block_number, 17);
        assert_eq!(tx.status, TxStatus::Success);
        match tx.fee {
            TxFee::Evm(fee) => {
                assert_eq!(fee.gas, 21000);
                assert_eq!(fee.gas_used, 21000);
                assert_eq!(fee.gas_price, 1_000_000_000);
            }
            other => panic!("unexpected fee {:?}", other),
        }
        match tx.data {
            TxData::Evm(data) => assert_eq!(data.value, 1_000_000_000_000_000_000),
            other => panic!("unexpected data {:?}", other),
        }
    }

    #[test]
    fn test_reverted_is_failure() {
        let tx = normalize_transaction(&rpc_tx(), Some(&receipt("0x0"))).unwrap();
        assert_eq!(tx.status, TxStatus::Failure);
        assert_eq!(receipt_result(&receipt("0x0")).status, TxStatus::Failure);
    }

    #[test]
    fn test_missing_receipt_is_pending() {
        let tx = normalize_transaction(&rpc_tx(), None).unwrap();
        assert_eq!(tx.status, TxStatus::Pending);
        assert_eq!(tx.block_number, 16);
        assert!(tx.logs.is_empty());
    }

    #[test]
    fn test_contract_address_from_creation_event() {
        let mut r = receipt("0x1");
        r.logs.push(RpcLog {
            address: "0x1111111111111111111111111111111111111111".into(),
            topics: vec![
                contract_created_topic(),
                format!("0x{}{}", "00".repeat(12), "35".repeat(20)),
            ],
            data: "0x".into(),
            log_index: Some("0x0".into()),
        });

        assert_eq!(
            contract_address(&r).unwrap().to_lowercase(),
            format!("0x{}", "35".repeat(20))
        );

        r.contract_address = Some("0x2222222222222222222222222222222222222222".into());
        assert_eq!(
            contract_address(&r).unwrap(),
            "0x2222222222222222222222222222222222222222"
        );
    }
}
