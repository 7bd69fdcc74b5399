//! Cosmos request, response and normalized record types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChainBridgeError, ChainBridgeResult};
use crate::utils::quantity::{de_u128, ser_u128_str};

use super::msgs::Msg;
use super::pubkey::AccountPublicKey;

/// Largest fractional precision accepted for decimal amounts
const MAX_DECIMAL_PLACES: usize = 18;

// =============================================================================
// Coins
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(serialize_with = "ser_u128_str", deserialize_with = "de_u128")]
    pub amount: u128,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Decimal coin, used for gas prices (`0.015uluna`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecCoin {
    pub denom: String,
    pub amount: String,
}

impl DecCoin {
    pub fn new(amount: impl Into<String>, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }

    pub fn validate(&self) -> ChainBridgeResult<()> {
        validate_denom(&self.denom)?;
        parse_decimal(&self.amount)?;
        Ok(())
    }

    /// `ceil(amount * gas)` without going through floating point
    pub fn mul_ceil(&self, gas: u64) -> ChainBridgeResult<u128> {
        let (mantissa, scale) = parse_decimal(&self.amount)?;
        let product = mantissa.checked_mul(gas as u128).ok_or_else(|| {
            ChainBridgeError::invalid_input(format!("Fee overflow for gas price {}", self))
        })?;
        Ok(product.div_ceil(10u128.pow(scale)))
    }
}

impl fmt::Display for DecCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for DecCoin {
    type Err = ChainBridgeError;

    /// Parses `<decimal><denom>`, e.g. `850000000000axpla`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_alphabetic())
            .ok_or_else(|| ChainBridgeError::invalid_input(format!("Coin {:?} has no denom", s)))?;
        let coin = DecCoin::new(&s[..split], &s[split..]);
        coin.validate()?;
        Ok(coin)
    }
}

/// Split a non-negative decimal string into `(mantissa, scale)`
fn parse_decimal(amount: &str) -> ChainBridgeResult<(u128, u32)> {
    let invalid = || ChainBridgeError::invalid_input(format!("Invalid decimal amount {:?}", amount));

    let (int, frac) = amount.split_once('.').unwrap_or((amount, ""));
    if int.is_empty() || !int.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) || frac.len() > MAX_DECIMAL_PLACES {
        return Err(invalid());
    }
    if amount.ends_with('.') {
        return Err(invalid());
    }

    let mantissa = format!("{}{}", int, frac).parse::<u128>().map_err(|_| invalid())?;
    Ok((mantissa, frac.len() as u32))
}

fn validate_denom(denom: &str) -> ChainBridgeResult<()> {
    let valid = (3..=128).contains(&denom.len())
        && denom.starts_with(|c: char| c.is_ascii_alphabetic())
        && denom
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(ChainBridgeError::invalid_input(format!("Invalid denom {:?}", denom)))
    }
}

// =============================================================================
// Fees
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas_limit: u64,
    #[serde(default)]
    pub payer: String,
    #[serde(default)]
    pub granter: String,
}

impl Fee {
    pub fn new(gas_limit: u64, amount: Vec<Coin>) -> Self {
        Self {
            amount,
            gas_limit,
            payer: String::new(),
            granter: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmosFeeConfig {
    pub gas: u64,
    pub fee: Fee,
    pub gas_adjustment: f64,
    pub gas_prices: Vec<DecCoin>,
}

/// Inputs of a simulate-based fee estimate
#[derive(Debug, Clone, PartialEq)]
pub struct FeeEstimateRequest {
    pub msgs: Vec<Msg>,
    pub memo: String,
    pub gas_prices: Vec<DecCoin>,
    pub gas_adjustment: f64,
    /// Restrict the fee to these denoms
    pub fee_denoms: Option<Vec<String>>,
}

// =============================================================================
// Transaction requests
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerOptions {
    pub address: String,
    /// Pinned sequence; reserves a signer slot at creation time
    #[serde(default)]
    pub sequence_number: Option<u64>,
    #[serde(default)]
    pub public_key: Option<AccountPublicKey>,
}

impl SignerOptions {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            sequence_number: None,
            public_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmosCreateTxData {
    pub msgs: Vec<Msg>,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub fee: Option<Fee>,
    #[serde(default)]
    pub gas_prices: Option<Vec<DecCoin>>,
    #[serde(default)]
    pub gas_adjustment: Option<f64>,
    #[serde(default)]
    pub fee_denoms: Option<Vec<String>>,
    #[serde(default)]
    pub timeout_height: u64,
    pub signers: Vec<SignerOptions>,
}

// =============================================================================
// Node records
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub address: String,
    pub account_number: u64,
    pub sequence: u64,
    /// `None` until the account has signed once
    pub public_key: Option<AccountPublicKey>,
}

/// Signer metadata needed to simulate a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerData {
    pub address: String,
    pub sequence: u64,
    pub public_key: Option<AccountPublicKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastMode {
    /// Wait for the block that includes the transaction
    Block,
    Async,
}

impl BroadcastMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "BROADCAST_MODE_BLOCK",
            Self::Async => "BROADCAST_MODE_ASYNC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastResponse {
    pub txhash: String,
    pub code: u32,
    pub height: u64,
    pub raw_log: String,
}

/// Transaction as returned by the tx query endpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxInfo {
    pub txhash: String,
    pub height: u64,
    pub code: u32,
    pub raw_log: String,
    pub gas_wanted: u64,
    pub gas_used: u64,
    pub messages: Vec<Value>,
    pub memo: String,
    pub timeout_height: u64,
    pub fee: Vec<Coin>,
    pub logs: Vec<CosmosTxLog>,
}

// =============================================================================
// Normalized records
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmosTxFee {
    pub gas_wanted: u64,
    pub gas_used: u64,
    pub amount: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmosTxData {
    pub messages: Vec<Value>,
    pub memo: String,
    pub timeout_height: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmosTxLog {
    #[serde(default)]
    pub msg_index: u32,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub events: Vec<Value>,
}

/// Partial signature for a multisig account; collected off-chain, never broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultisigSignInfo {
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    pub signer_address: String,
    /// base64 compressed public key of the signer
    pub public_key: String,
    /// base64 compact signature
    pub signature: String,
    /// Canonical Amino JSON that was signed
    pub sign_doc: String,
}
