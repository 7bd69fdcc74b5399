//! Connection configuration
//!
//! Options are plain serde structs so they can be embedded in an
//! application's own config file:
//!
//! ```json
//! { "type": "xpla", "nodeURL": "https://cube-lcd.xpla.dev", "chainID": "cube_47-5" }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cosmos::types::DecCoin;
use crate::error::{ChainBridgeError, ChainBridgeResult};
use crate::types::ChainType;

const DEFAULT_RECEIPT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_RECEIPT_MAX_ATTEMPTS: u32 = 120;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

fn default_receipt_poll_interval_ms() -> u64 {
    DEFAULT_RECEIPT_POLL_INTERVAL_MS
}

fn default_receipt_max_attempts() -> u32 {
    DEFAULT_RECEIPT_MAX_ATTEMPTS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmConnectionOptions {
    #[serde(rename = "nodeURL")]
    pub node_url: String,
    #[serde(rename = "chainID")]
    pub chain_id: u64,
    /// Delay between `eth_getTransactionReceipt` polls in `send_signed_tx`
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default = "default_receipt_max_attempts")]
    pub receipt_max_attempts: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl EvmConnectionOptions {
    pub fn new(node_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            node_url: node_url.into(),
            chain_id,
            receipt_poll_interval_ms: DEFAULT_RECEIPT_POLL_INTERVAL_MS,
            receipt_max_attempts: DEFAULT_RECEIPT_MAX_ATTEMPTS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> ChainBridgeResult<()> {
        validate_node_url(&self.node_url)?;
        if self.chain_id == 0 {
            return Err(ChainBridgeError::invalid_input("chainID must be non-zero"));
        }
        if self.receipt_max_attempts == 0 {
            return Err(ChainBridgeError::invalid_input("receiptMaxAttempts must be non-zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmosConnectionOptions {
    #[serde(rename = "nodeURL")]
    pub node_url: String,
    #[serde(rename = "chainID")]
    pub chain_id: String,
    /// Falls back to the chain profile's default gas price
    #[serde(default)]
    pub gas_prices: Option<Vec<DecCoin>>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl CosmosConnectionOptions {
    pub fn new(node_url: impl Into<String>, chain_id: impl Into<String>) -> Self {
        Self {
            node_url: node_url.into(),
            chain_id: chain_id.into(),
            gas_prices: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> ChainBridgeResult<()> {
        validate_node_url(&self.node_url)?;
        if self.chain_id.trim().is_empty() {
            return Err(ChainBridgeError::invalid_input("chainID must not be empty"));
        }
        for price in self.gas_prices.iter().flatten() {
            price.validate()?;
        }
        Ok(())
    }
}

/// Options for one chain connection, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockchainClientOptions {
    Ethereum(EvmConnectionOptions),
    Polygon(EvmConnectionOptions),
    Xpla(CosmosConnectionOptions),
    Terra(CosmosConnectionOptions),
}

impl BlockchainClientOptions {
    pub fn chain_type(&self) -> ChainType {
        match self {
            Self::Ethereum(_) => ChainType::Ethereum,
            Self::Polygon(_) => ChainType::Polygon,
            Self::Xpla(_) => ChainType::Xpla,
            Self::Terra(_) => ChainType::Terra,
        }
    }

    pub fn validate(&self) -> ChainBridgeResult<()> {
        match self {
            Self::Ethereum(o) | Self::Polygon(o) => o.validate(),
            Self::Xpla(o) | Self::Terra(o) => o.validate(),
        }
    }

    /// Parse and validate. An unknown `type` is reported as a missing client.
    pub fn from_json_str(json: &str) -> ChainBridgeResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let chain = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ChainBridgeError::invalid_input("Connection options require a `type` field"))?;
        chain.parse::<ChainType>()?;

        let options: Self = serde_json::from_value(value)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ChainBridgeResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }
}

fn validate_node_url(node_url: &str) -> ChainBridgeResult<()> {
    let url = Url::parse(node_url)
        .map_err(|e| ChainBridgeError::invalid_input(format!("Invalid node URL {}: {}", node_url, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ChainBridgeError::invalid_input(format!(
            "Node URL must use http or https, got {}",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ChainBridgeError::invalid_input("Node URL has no host"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_parse_evm_options_with_defaults() {
        let options = BlockchainClientOptions::from_json_str(
            r#"{"type":"ethereum","nodeURL":"https://rpc.sepolia.org","chainID":11155111}"#,
        )
        .unwrap();

        assert_eq!(options.chain_type(), ChainType::Ethereum);
        match options {
            BlockchainClientOptions::Ethereum(o) => {
                assert_eq!(o.chain_id, 11155111);
                assert_eq!(o.receipt_poll_interval(), Duration::from_secs(1));
                assert_eq!(o.receipt_max_attempts, 120);
            }
            other => panic!("unexpected options {:?}", other),
        }
    }

    #[test]
    fn test_parse_cosmos_options() {
        let options = BlockchainClientOptions::from_json_str(
            r#"{"type":"xpla","nodeURL":"https://cube-lcd.xpla.dev","chainID":"cube_47-5",
                "gasPrices":[{"denom":"axpla","amount":"850000000000"}]}"#,
        )
        .unwrap();

        match options {
            BlockchainClientOptions::Xpla(o) => {
                assert_eq!(o.chain_id, "cube_47-5");
                assert_eq!(o.gas_prices.unwrap()[0].denom, "axpla");
            }
            other => panic!("unexpected options {:?}", other),
        }
    }

    #[test]
    fn test_unknown_chain_is_dependency_missing() {
        let err = BlockchainClientOptions::from_json_str(
            r#"{"type":"solana","nodeURL":"https://api.mainnet-beta.solana.com"}"#,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DependencyMissing);
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(EvmConnectionOptions::new("ftp://node", 1).validate().is_err());
        assert!(EvmConnectionOptions::new("not a url", 1).validate().is_err());
        assert!(EvmConnectionOptions::new("http://localhost:8545", 0).validate().is_err());
        assert!(CosmosConnectionOptions::new("https://lcd.terra.dev", " ").validate().is_err());
        assert!(CosmosConnectionOptions::new("https://lcd.terra.dev", "phoenix-1").validate().is_ok());
    }
}
