//! Cosmos SDK Engine
//!
//! Shared engine for Cosmos SDK chains (XPLA, Terra), parameterized by a
//! `CosmosChainProfile`:
//! - **proto** / **tx** / **msgs** / **pubkey**: protobuf transaction model
//! - **amino**: legacy Amino JSON sign documents
//! - **provider**: LCD access and fee arithmetic
//! - **normalize**: LCD records to `Transaction`
//! - **client**: the engine

pub mod amino;
pub mod client;
pub mod error_codes;
pub mod msgs;
pub mod normalize;
pub mod profile;
pub mod proto;
pub mod provider;
pub mod pubkey;
pub mod signer_key;
pub mod tx;
pub mod types;

pub use client::{CosmosClient, CosmosSignOutput, CosmosTxInput, DEFAULT_GAS_ADJUSTMENT};
pub use error_codes::SDK_ERROR_CODES;
pub use msgs::{Msg, MsgExecuteContract, MsgSend};
pub use profile::{CosmosChainProfile, DigestKind, KeyType, TERRA, XPLA};
pub use provider::{CosmosProvider, LcdBlock, LcdProvider};
pub use pubkey::AccountPublicKey;
pub use tx::{AuthInfo, ModeInfo, SignMode, SignerInfo, Tx, TxBody};
pub use types::{
    AccountInfo, BroadcastMode, BroadcastResponse, Coin, CosmosCreateTxData, CosmosFeeConfig,
    CosmosTxData, CosmosTxFee, CosmosTxLog, DecCoin, Fee, FeeEstimateRequest, MultisigSignInfo,
    SignerData, SignerOptions, TxInfo,
};
