//! EVM node access
//!
//! `EvmProvider` is the seam between the signing engine and the network.
//! `JsonRpcProvider` is the HTTP JSON-RPC implementation; tests substitute
//! in-memory providers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::EvmConnectionOptions;
use crate::error::{ChainBridgeError, ChainBridgeResult};
use crate::utils::quantity::{parse_hex_u128, parse_hex_u64, to_hex_quantity};

use super::types::{CallRequest, FeeHistory, RpcBlock, RpcReceipt, RpcTransaction};

#[async_trait]
pub trait EvmProvider: Send + Sync {
    async fn get_balance(&self, address: &str) -> ChainBridgeResult<u128>;

    async fn get_transaction_count(&self, address: &str) -> ChainBridgeResult<u64>;

    async fn estimate_gas(&self, call: &CallRequest) -> ChainBridgeResult<u64>;

    async fn gas_price(&self) -> ChainBridgeResult<u128>;

    async fn fee_history(
        &self,
        block_count: u64,
        reward_percentiles: &[f64],
    ) -> ChainBridgeResult<FeeHistory>;

    /// Returns the transaction hash accepted by the node
    async fn send_raw_transaction(&self, raw_tx: &str) -> ChainBridgeResult<String>;

    /// Resolves once the transaction is included
    async fn wait_for_receipt(&self, tx_hash: &str) -> ChainBridgeResult<RpcReceipt>;

    async fn get_transaction(&self, tx_hash: &str) -> ChainBridgeResult<Option<RpcTransaction>>;

    async fn get_transaction_receipt(&self, tx_hash: &str) -> ChainBridgeResult<Option<RpcReceipt>>;

    /// Latest block when `number` is `None`
    async fn get_block(&self, number: Option<u64>) -> ChainBridgeResult<RpcBlock>;

    /// `eth_call` against the latest block, returning hex output
    async fn call(&self, call: &CallRequest) -> ChainBridgeResult<String>;
}

// =============================================================================
// JSON-RPC over HTTP
// =============================================================================

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

pub struct JsonRpcProvider {
    client: reqwest::Client,
    url: String,
    poll_interval: Duration,
    max_attempts: u32,
    next_id: AtomicU64,
}

impl JsonRpcProvider {
    pub fn new(options: &EvmConnectionOptions) -> ChainBridgeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout())
            .build()?;

        Ok(Self {
            client,
            url: options.node_url.clone(),
            poll_interval: options.receipt_poll_interval(),
            max_attempts: options.receipt_max_attempts,
            next_id: AtomicU64::new(1),
        })
    }

    /// Call `method`, treating a JSON `null` result as `None`
    async fn request_opt<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> ChainBridgeResult<Option<T>> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response: RpcResponse<T> = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(ChainBridgeError::provider(format!("{} failed: {}", method, error.message))
                .with_details(format!("rpc code {}", error.code)));
        }
        Ok(response.result)
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> ChainBridgeResult<T> {
        self.request_opt(method, params)
            .await?
            .ok_or_else(|| ChainBridgeError::provider(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl EvmProvider for JsonRpcProvider {
    async fn get_balance(&self, address: &str) -> ChainBridgeResult<u128> {
        let balance: String = self.request("eth_getBalance", json!([address, "latest"])).await?;
        parse_hex_u128(&balance)
    }

    async fn get_transaction_count(&self, address: &str) -> ChainBridgeResult<u64> {
        let count: String = self
            .request("eth_getTransactionCount", json!([address, "latest"]))
            .await?;
        parse_hex_u64(&count)
    }

    async fn estimate_gas(&self, call: &CallRequest) -> ChainBridgeResult<u64> {
        let gas: String = self.request("eth_estimateGas", json!([call])).await?;
        parse_hex_u64(&gas)
    }

    async fn gas_price(&self) -> ChainBridgeResult<u128> {
        let price: String = self.request("eth_gasPrice", json!([])).await?;
        parse_hex_u128(&price)
    }

    async fn fee_history(
        &self,
        block_count: u64,
        reward_percentiles: &[f64],
    ) -> ChainBridgeResult<FeeHistory> {
        self.request(
            "eth_feeHistory",
            json!([to_hex_quantity(block_count as u128), "latest", reward_percentiles]),
        )
        .await
    }

    async fn send_raw_transaction(&self, raw_tx: &str) -> ChainBridgeResult<String> {
        self.request("eth_sendRawTransaction", json!([raw_tx])).await
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> ChainBridgeResult<RpcReceipt> {
        for _ in 0..self.max_attempts {
            if let Some(receipt) = self.get_transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(ChainBridgeError::provider(format!(
            "Transaction {} not mined after {} receipt polls",
            tx_hash, self.max_attempts
        )))
    }

    async fn get_transaction(&self, tx_hash: &str) -> ChainBridgeResult<Option<RpcTransaction>> {
        self.request_opt("eth_getTransactionByHash", json!([tx_hash])).await
    }

    async fn get_transaction_receipt(&self, tx_hash: &str) -> ChainBridgeResult<Option<RpcReceipt>> {
        self.request_opt("eth_getTransactionReceipt", json!([tx_hash])).await
    }

    async fn get_block(&self, number: Option<u64>) -> ChainBridgeResult<RpcBlock> {
        let tag = match number {
            Some(n) => to_hex_quantity(n as u128),
            None => "latest".to_string(),
        };
        self.request("eth_getBlockByNumber", json!([tag, false])).await
    }

    async fn call(&self, call: &CallRequest) -> ChainBridgeResult<String> {
        self.request("eth_call", json!([call, "latest"])).await
    }
}
