//! ChainBridge Core Library
//!
//! One signing protocol over account-based EVM chains and Cosmos SDK chains.
//!
//! # Architecture
//!
//! This crate provides:
//! - **signer**: the `Signer` seam, with raw-key and mnemonic implementations
//! - **evm**: EVM engine (Ethereum, Polygon)
//! - **cosmos**: Cosmos SDK engine (XPLA, Terra), driven by chain profiles
//! - **client**: `BlockchainClient`, the chain-agnostic facade
//! - **config**: connection options, loadable from JSON
//!
//! Every engine reports through `ChainBridgeError` and normalizes what the
//! chain returns into `Transaction` / `TransactionResult`. Broadcasting an
//! unsigned payload is rejected before any network call.
//!
//! # Security
//!
//! Private keys and seeds are held in `zeroize` containers and cleared on drop.
//! Log fields that look like addresses, hashes or secrets are redacted.
//!
//! # Example
//!
//! ```rust,ignore
//! use chainbridge_core::{BlockchainClient, BlockchainClientOptions, RawKeySigner};
//!
//! let options = BlockchainClientOptions::from_file("terra.json")?;
//! let client = BlockchainClient::connect(&options)?;
//! let signer = RawKeySigner::from_encoded(&key_hex)?;
//! let unsigned = client.create_tx(create_data, false).await?;
//! let signed = client.sign_tx(unsigned, &signer).await?;
//! let result = client.send_signed_tx(signed.broadcastable()?).await?;
//! ```

// `log_*!` macros are exported at the crate root
pub mod utils;

pub mod client;
pub mod config;
pub mod cosmos;
pub mod error;
pub mod evm;
pub mod signer;
pub mod types;

pub use client::{BlockchainClient, CreateTxData, SignedTx, UnsignedTx};
pub use config::{BlockchainClientOptions, CosmosConnectionOptions, EvmConnectionOptions};
pub use cosmos::{CosmosClient, CosmosProvider, LcdProvider};
pub use error::{ChainBridgeError, ChainBridgeResult, ErrorCode, ErrorCodeTable};
pub use evm::{EvmClient, EvmProvider, JsonRpcProvider};
pub use signer::{DerivationOptions, MnemonicSigner, RawKeySigner, Signer};
pub use types::*;
