//! Cosmos LCD (REST) access
//!
//! `CosmosProvider` is the seam the engine talks through; `LcdProvider` is
//! the HTTP implementation against the SDK's gRPC-gateway routes.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::config::CosmosConnectionOptions;
use crate::error::{ChainBridgeError, ChainBridgeResult};
use crate::utils::quantity::de_u64;

use super::pubkey::AccountPublicKey;
use super::tx::{AuthInfo, SignMode, SignerInfo, Tx, TxBody};
use super::types::{
    AccountInfo, BroadcastMode, BroadcastResponse, Coin, CosmosTxLog, DecCoin, Fee,
    FeeEstimateRequest, SignerData, TxInfo,
};

#[async_trait]
pub trait CosmosProvider: Send + Sync {
    async fn account_info(&self, address: &str) -> ChainBridgeResult<AccountInfo>;

    /// Simulate `request` signed by `signers` and price the adjusted gas
    async fn estimate_fee(
        &self,
        signers: &[SignerData],
        request: &FeeEstimateRequest,
    ) -> ChainBridgeResult<Fee>;

    async fn broadcast(&self, tx_bytes: &[u8], mode: BroadcastMode) -> ChainBridgeResult<BroadcastResponse>;

    async fn tx_info(&self, tx_hash: &str) -> ChainBridgeResult<TxInfo>;

    async fn balance(&self, address: &str, denom: &str) -> ChainBridgeResult<u128>;

    /// Latest block when `height` is `None`
    async fn block(&self, height: Option<u64>) -> ChainBridgeResult<LcdBlock>;

    /// CosmWasm smart query
    async fn contract_query(&self, contract: &str, query: &Value) -> ChainBridgeResult<Value>;
}

/// Price `ceil(gas_used * gas_adjustment)` gas with every allowed gas price
pub fn compute_fee(
    gas_used: u64,
    gas_prices: &[DecCoin],
    gas_adjustment: f64,
    fee_denoms: Option<&[String]>,
) -> ChainBridgeResult<Fee> {
    if !gas_adjustment.is_finite() || gas_adjustment <= 0.0 {
        return Err(ChainBridgeError::invalid_input(format!(
            "Invalid gas adjustment {}",
            gas_adjustment
        )));
    }
    let gas = (gas_used as f64 * gas_adjustment).ceil() as u64;

    let amount = gas_prices
        .iter()
        .filter(|price| fee_denoms.map_or(true, |denoms| denoms.contains(&price.denom)))
        .map(|price| Ok(Coin::new(price.mul_ceil(gas)?, price.denom.clone())))
        .collect::<ChainBridgeResult<Vec<_>>>()?;

    if amount.is_empty() {
        return Err(ChainBridgeError::invalid_input(
            "No gas price matches the requested fee denoms",
        ));
    }
    Ok(Fee::new(gas, amount))
}

/// Unsigned transaction used for simulation: one empty signature per signer
pub fn simulation_tx(signers: &[SignerData], request: &FeeEstimateRequest) -> Tx {
    Tx {
        body: TxBody {
            messages: request.msgs.clone(),
            memo: request.memo.clone(),
            timeout_height: 0,
        },
        auth_info: AuthInfo {
            signer_infos: signers
                .iter()
                .map(|s| SignerInfo::new(s.public_key.clone(), SignMode::Direct, s.sequence))
                .collect(),
            fee: Fee::default(),
        },
        signatures: vec![Vec::new(); signers.len()],
    }
}

/// Walk vesting / module / eth account wrappers down to the base account
pub fn parse_account(account: &Value) -> ChainBridgeResult<AccountInfo> {
    let mut base = account;
    loop {
        if let Some(inner) = base.get("base_vesting_account") {
            base = inner;
        } else if let Some(inner) = base.get("base_account") {
            base = inner;
        } else {
            break;
        }
    }

    let number = |key: &str| -> ChainBridgeResult<u64> {
        match base.get(key) {
            Some(Value::String(s)) => s
                .parse()
                .map_err(|_| ChainBridgeError::provider(format!("Invalid {} {:?}", key, s))),
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| ChainBridgeError::provider(format!("Invalid {}", key))),
            _ => Ok(0),
        }
    };

    let public_key = match base.get("pub_key") {
        None | Some(Value::Null) => None,
        Some(pk) => Some(AccountPublicKey::from_json(pk)?),
    };

    Ok(AccountInfo {
        address: base
            .get("address")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        account_number: number("account_number")?,
        sequence: number("sequence")?,
        public_key,
    })
}

// =============================================================================
// LCD responses
// =============================================================================

#[derive(Deserialize)]
struct AccountResponse {
    account: Value,
}

#[derive(Deserialize)]
struct SimulateResponse {
    gas_info: GasInfo,
}

#[derive(Deserialize)]
struct GasInfo {
    #[serde(deserialize_with = "de_u64")]
    gas_used: u64,
}

#[derive(Serialize)]
struct BroadcastRequest<'a> {
    tx_bytes: String,
    mode: &'a str,
}

#[derive(Deserialize)]
struct BroadcastTxResponse {
    tx_response: LcdTxResponse,
}

#[derive(Deserialize, Default)]
struct LcdTxResponse {
    txhash: String,
    #[serde(default)]
    code: u32,
    #[serde(default, deserialize_with = "de_u64")]
    height: u64,
    #[serde(default)]
    raw_log: String,
    #[serde(default, deserialize_with = "de_u64")]
    gas_wanted: u64,
    #[serde(default, deserialize_with = "de_u64")]
    gas_used: u64,
    #[serde(default)]
    logs: Vec<CosmosTxLog>,
}

#[derive(Deserialize)]
struct GetTxResponse {
    tx: LcdTx,
    tx_response: LcdTxResponse,
}

#[derive(Deserialize)]
struct LcdTx {
    body: LcdTxBody,
    auth_info: LcdAuthInfo,
}

#[derive(Deserialize)]
struct LcdTxBody {
    #[serde(default)]
    messages: Vec<Value>,
    #[serde(default)]
    memo: String,
    #[serde(default, deserialize_with = "de_u64")]
    timeout_height: u64,
}

#[derive(Deserialize)]
struct LcdAuthInfo {
    fee: LcdFee,
}

#[derive(Deserialize)]
struct LcdFee {
    #[serde(default)]
    amount: Vec<Coin>,
}

#[derive(Deserialize)]
struct BalanceResponse {
    balance: Coin,
}

#[derive(Deserialize)]
struct SmartQueryResponse {
    data: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LcdBlock {
    pub block_id: LcdBlockId,
    pub block: LcdBlockBody,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LcdBlockId {
    /// base64
    pub hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LcdBlockBody {
    pub header: LcdHeader,
    #[serde(default)]
    pub data: LcdBlockData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LcdHeader {
    #[serde(deserialize_with = "de_u64")]
    pub height: u64,
    /// RFC 3339
    pub time: String,
    /// base64
    pub proposer_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LcdBlockData {
    /// base64 encoded transactions
    #[serde(default)]
    pub txs: Vec<String>,
}

// =============================================================================
// HTTP implementation
// =============================================================================

pub struct LcdProvider {
    client: reqwest::Client,
    base_url: Url,
}

impl LcdProvider {
    pub fn new(options: &CosmosConnectionOptions) -> ChainBridgeResult<Self> {
        let base_url = Url::parse(&options.node_url).map_err(|e| {
            ChainBridgeError::invalid_input(format!("Invalid node URL {}: {}", options.node_url, e))
        })?;
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout())
            .build()?;
        Ok(Self { client, base_url })
    }

    /// Append path segments, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> ChainBridgeResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ChainBridgeError::invalid_input("Node URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> ChainBridgeResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(ChainBridgeError::provider(format!("LCD returned {}", status)).with_details(message));
        }
        Ok(response.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> ChainBridgeResult<T> {
        Self::read(self.client.get(url).send().await?).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(&self, url: Url, body: &B) -> ChainBridgeResult<T> {
        Self::read(self.client.post(url).json(body).send().await?).await
    }
}

#[async_trait]
impl CosmosProvider for LcdProvider {
    async fn account_info(&self, address: &str) -> ChainBridgeResult<AccountInfo> {
        let url = self.endpoint(&["cosmos", "auth", "v1beta1", "accounts", address])?;
        let response: AccountResponse = self.get(url).await?;
        parse_account(&response.account)
    }

    async fn estimate_fee(
        &self,
        signers: &[SignerData],
        request: &FeeEstimateRequest,
    ) -> ChainBridgeResult<Fee> {
        let tx = simulation_tx(signers, request);
        let url = self.endpoint(&["cosmos", "tx", "v1beta1", "simulate"])?;
        let response: SimulateResponse = self
            .post(url, &json!({ "tx_bytes": tx.to_base64()? }))
            .await?;

        compute_fee(
            response.gas_info.gas_used,
            &request.gas_prices,
            request.gas_adjustment,
            request.fee_denoms.as_deref(),
        )
    }

    async fn broadcast(&self, tx_bytes: &[u8], mode: BroadcastMode) -> ChainBridgeResult<BroadcastResponse> {
        let url = self.endpoint(&["cosmos", "tx", "v1beta1", "txs"])?;
        let request = BroadcastRequest {
            tx_bytes: STANDARD.encode(tx_bytes),
            mode: mode.as_str(),
        };
        let response: BroadcastTxResponse = self.post(url, &request).await?;
        let tx = response.tx_response;
        Ok(BroadcastResponse {
            txhash: tx.txhash,
            code: tx.code,
            height: tx.height,
            raw_log: tx.raw_log,
        })
    }

    async fn tx_info(&self, tx_hash: &str) -> ChainBridgeResult<TxInfo> {
        let url = self.endpoint(&["cosmos", "tx", "v1beta1", "txs", tx_hash])?;
        let response: GetTxResponse = self.get(url).await?;
        let (tx, info) = (response.tx, response.tx_response);
        Ok(TxInfo {
            txhash: info.txhash,
            height: info.height,
            code: info.code,
            raw_log: info.raw_log,
            gas_wanted: info.gas_wanted,
            gas_used: info.gas_used,
            messages: tx.body.messages,
            memo: tx.body.memo,
            timeout_height: tx.body.timeout_height,
            fee: tx.auth_info.fee.amount,
            logs: info.logs,
        })
    }

    async fn balance(&self, address: &str, denom: &str) -> ChainBridgeResult<u128> {
        let mut url = self.endpoint(&["cosmos", "bank", "v1beta1", "balances", address, "by_denom"])?;
        url.query_pairs_mut().append_pair("denom", denom);
        let response: BalanceResponse = self.get(url).await?;
        Ok(response.balance.amount)
    }

    async fn block(&self, height: Option<u64>) -> ChainBridgeResult<LcdBlock> {
        let height = height.map_or_else(|| "latest".to_string(), |h| h.to_string());
        let url = self.endpoint(&["cosmos", "base", "tendermint", "v1beta1", "blocks", &height])?;
        self.get(url).await
    }

    async fn contract_query(&self, contract: &str, query: &Value) -> ChainBridgeResult<Value> {
        let encoded = STANDARD.encode(serde_json::to_vec(query)?);
        let url = self.endpoint(&["cosmwasm", "wasm", "v1", "contract", contract, "smart", &encoded])?;
        let response: SmartQueryResponse = self.get(url).await?;
        Ok(response.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_fee() {
        let prices = vec![DecCoin::new("0.015", "uluna"), DecCoin::new("0.2", "uusd")];
        let fee = compute_fee(100_000, &prices, 1.5, None).unwrap();
        assert_eq!(fee.gas_limit, 150_000);
        assert_eq!(fee.amount, vec![Coin::new(2250, "uluna"), Coin::new(30_000, "uusd")]);

        let denoms = vec!["uluna".to_string()];
        let fee = compute_fee(100_000, &prices, 1.5, Some(denoms.as_slice())).unwrap();
        assert_eq!(fee.amount, vec![Coin::new(2250, "uluna")]);

        assert!(compute_fee(1, &prices, 0.0, None).is_err());
        let other = vec!["axpla".to_string()];
        assert!(compute_fee(1, &prices, 1.5, Some(other.as_slice())).is_err());
    }

    #[test]
    fn test_parse_nested_account() {
        let account = json!({
            "@type": "/cosmos.vesting.v1beta1.ContinuousVestingAccount",
            "base_vesting_account": {
                "base_account": {
                    "address": "terra1abc",
                    "pub_key": null,
                    "account_number": "42",
                    "sequence": "7"
                }
            }
        });
        let info = parse_account(&account).unwrap();
        assert_eq!(info.address, "terra1abc");
        assert_eq!(info.account_number, 42);
        assert_eq!(info.sequence, 7);
        assert_eq!(info.public_key, None);
    }

    #[test]
    fn test_parse_account_with_key() {
        let key = STANDARD.encode([0x02; 33]);
        let account = json!({
            "@type": "/cosmos.auth.v1beta1.BaseAccount",
            "address": "terra1abc",
            "pub_key": {"@type": "/cosmos.crypto.secp256k1.PubKey", "key": key},
            "account_number": "1",
            "sequence": "0"
        });
        let info = parse_account(&account).unwrap();
        assert_eq!(info.public_key, Some(AccountPublicKey::Secp256k1(vec![0x02; 33])));
    }

    #[test]
    fn test_simulation_tx_has_one_empty_signature_per_signer() {
        let signers = vec![
            SignerData { address: "a".into(), sequence: 1, public_key: None },
            SignerData { address: "b".into(), sequence: 2, public_key: None },
        ];
        let request = FeeEstimateRequest {
            msgs: vec![],
            memo: "m".into(),
            gas_prices: vec![],
            gas_adjustment: 1.5,
            fee_denoms: None,
        };
        let tx = simulation_tx(&signers, &request);
        assert_eq!(tx.signatures, vec![Vec::<u8>::new(), Vec::new()]);
        assert_eq!(tx.auth_info.signer_infos[1].sequence, 2);
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let provider = LcdProvider::new(&CosmosConnectionOptions::new("https://lcd.example.com/", "c")).unwrap();
        let url = provider.endpoint(&["cosmwasm", "smart", "a/b+c="]).unwrap();
        assert_eq!(url.as_str(), "https://lcd.example.com/cosmwasm/smart/a%2Fb+c=");
    }
}
