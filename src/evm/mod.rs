//! EVM Engine
//!
//! Ethereum-like chains (Ethereum, Polygon):
//! - **rlp**: RLP codec
//! - **transaction**: legacy / EIP-1559 model, signing hash, wire encoding
//! - **recovery**: recovery-id search over `r || s` signatures
//! - **fee**: fee estimate arithmetic
//! - **provider**: JSON-RPC access
//! - **normalize**: RPC records to `Transaction`
//! - **client**: the engine

pub mod client;
pub mod fee;
pub mod normalize;
pub mod provider;
pub mod recovery;
pub mod rlp;
pub mod transaction;
pub mod types;

pub use client::{hash_personal_message, EvmClient, EvmTxInput, EVM_DECIMALS};
pub use provider::{EvmProvider, JsonRpcProvider};
pub use recovery::{recover_signature, RecoveredSignature};
pub use transaction::{EvmSignature, EvmTransaction};
pub use types::{EvmCreateTxData, EvmFeeConfig, EvmTxData, EvmTxFee, EvmTxLog, EvmTxType};
