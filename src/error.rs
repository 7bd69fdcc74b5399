//! Unified error types for ChainBridge Core
//!
//! All errors flow through this module so callers can branch on a single
//! `ErrorCode` regardless of which chain engine raised it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all ChainBridge operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBridgeError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
    /// Numeric result code reported by the chain, for execution failures
    pub chain_code: Option<u32>,
}

impl ChainBridgeError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            chain_code: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn key_format(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::KeyFormat, msg)
    }

    pub fn recovery_exhausted(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RecoveryExhausted, msg)
    }

    pub fn dependency_missing(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DependencyMissing, msg)
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Provider, msg)
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransactionDecode, msg)
    }

    pub fn unsigned(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnsignedTransaction, msg)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn crypto_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Crypto, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// Chain accepted the payload but rejected its execution.
    ///
    /// The reason is looked up in `table`; the raw log becomes the message
    /// when the code is unknown, and `"failed transaction"` when neither exists.
    pub fn chain_failure(code: u32, raw_log: Option<&str>, table: &ErrorCodeTable) -> Self {
        let raw_log = raw_log.filter(|log| !log.is_empty());
        let message = table
            .reason(code)
            .map(str::to_string)
            .or_else(|| raw_log.map(str::to_string))
            .unwrap_or_else(|| FAILED_TRANSACTION.to_string());

        Self {
            code: ErrorCode::ChainTransactionFailure,
            message,
            details: raw_log.map(str::to_string),
            chain_code: Some(code),
        }
    }

    pub fn is_validation(&self) -> bool {
        self.code.is_validation()
    }
}

impl fmt::Display for ChainBridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(code) = self.chain_code {
            write!(f, " (code {})", code)?;
        }
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for ChainBridgeError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Raised before any network call
    KeyFormat,
    TransactionDecode,
    UnsignedTransaction,
    InvalidInput,

    // Signing
    RecoveryExhausted,
    Crypto,

    // Wiring
    DependencyMissing,

    // Transport / RPC
    Provider,

    // Execution
    ChainTransactionFailure,

    Internal,
}

impl ErrorCode {
    /// Validation failures are deterministic and must not be retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ErrorCode::KeyFormat
                | ErrorCode::TransactionDecode
                | ErrorCode::UnsignedTransaction
                | ErrorCode::InvalidInput
        )
    }
}

/// Result type alias for ChainBridge operations
pub type ChainBridgeResult<T> = Result<T, ChainBridgeError>;

pub const INVALID_TRANSACTION: &str = "invalid transaction";
pub const TX_PARSE_ERROR: &str = "tx parse error";
pub const NO_SIGNATURES_SUPPLIED: &str = "no signatures supplied";
pub const FAILED_TRANSACTION: &str = "failed transaction";

// =============================================================================
// Chain Error Tables
// =============================================================================

/// Immutable mapping from a chain's numeric result codes to reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCodeTable {
    pub name: &'static str,
    entries: &'static [(u32, &'static str)],
}

impl ErrorCodeTable {
    pub const fn new(name: &'static str, entries: &'static [(u32, &'static str)]) -> Self {
        Self { name, entries }
    }

    pub fn reason(&self, code: u32) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, reason)| *reason)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Conversions from common error types

impl From<serde_json::Error> for ChainBridgeError {
    fn from(e: serde_json::Error) -> Self {
        ChainBridgeError::new(ErrorCode::InvalidInput, format!("JSON error: {}", e))
    }
}

impl From<hex::FromHexError> for ChainBridgeError {
    fn from(e: hex::FromHexError) -> Self {
        ChainBridgeError::new(ErrorCode::TransactionDecode, format!("Hex error: {}", e))
    }
}

impl From<base64::DecodeError> for ChainBridgeError {
    fn from(e: base64::DecodeError) -> Self {
        ChainBridgeError::new(ErrorCode::TransactionDecode, format!("Base64 error: {}", e))
    }
}

impl From<bech32::Error> for ChainBridgeError {
    fn from(e: bech32::Error) -> Self {
        ChainBridgeError::new(ErrorCode::InvalidInput, format!("Bech32 error: {}", e))
    }
}

impl From<std::io::Error> for ChainBridgeError {
    fn from(e: std::io::Error) -> Self {
        ChainBridgeError::new(ErrorCode::Internal, e.to_string())
    }
}

impl From<reqwest::Error> for ChainBridgeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChainBridgeError::new(ErrorCode::Provider, "Request timed out")
        } else if e.is_connect() {
            ChainBridgeError::new(ErrorCode::Provider, "Connection failed")
        } else {
            ChainBridgeError::new(ErrorCode::Provider, e.to_string())
        }
    }
}

impl From<bitcoin::bip32::Error> for ChainBridgeError {
    fn from(e: bitcoin::bip32::Error) -> Self {
        ChainBridgeError::new(ErrorCode::Crypto, format!("BIP32 error: {}", e))
    }
}

impl From<secp256k1::Error> for ChainBridgeError {
    fn from(e: secp256k1::Error) -> Self {
        ChainBridgeError::new(ErrorCode::Crypto, format!("Secp256k1 error: {}", e))
    }
}

impl From<bip39::Error> for ChainBridgeError {
    fn from(e: bip39::Error) -> Self {
        ChainBridgeError::new(ErrorCode::KeyFormat, format!("BIP39 error: {}", e))
    }
}
