//! Chain-agnostic client facade
//!
//! `BlockchainClient` wraps one engine and exposes the operations every
//! engine shares. Chain-native inputs travel in tagged unions; handing an
//! EVM payload to a Cosmos client (or the reverse) is an `InvalidInput`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::BlockchainClientOptions;
use crate::cosmos::{
    CosmosChainProfile, CosmosClient, CosmosCreateTxData, CosmosProvider, CosmosSignOutput,
    CosmosTxInput, LcdProvider,
};
use crate::error::{ChainBridgeError, ChainBridgeResult};
use crate::evm::{EvmClient, EvmCreateTxData, EvmProvider, EvmTxInput, JsonRpcProvider};
use crate::log_info;
use crate::signer::Signer;
use crate::types::{Account, AccountState, Balance, Block, ChainType, FeeConfig, Transaction, TransactionResult};

const MODULE: &str = "client";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreateTxData {
    Evm(EvmCreateTxData),
    Cosmos(CosmosCreateTxData),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsignedTx {
    Evm(EvmTxInput),
    Cosmos(CosmosTxInput),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedTx {
    /// `0x`-prefixed raw transaction
    Evm(String),
    Cosmos(CosmosSignOutput),
}

impl SignedTx {
    /// Payload for `send_signed_tx`; multisig sign info is never broadcastable
    pub fn broadcastable(&self) -> ChainBridgeResult<&str> {
        match self {
            SignedTx::Evm(raw) | SignedTx::Cosmos(CosmosSignOutput::Tx(raw)) => Ok(raw),
            SignedTx::Cosmos(CosmosSignOutput::SignInfo(_)) => Err(ChainBridgeError::decode(
                "Multisig sign info is not a transaction; combine the signatures first",
            )),
        }
    }
}

pub enum BlockchainClient<E = JsonRpcProvider, C = LcdProvider> {
    Evm(EvmClient<E>),
    Cosmos(CosmosClient<C>),
}

impl BlockchainClient<JsonRpcProvider, LcdProvider> {
    /// Build the HTTP-backed engine selected by `options`
    pub fn connect(options: &BlockchainClientOptions) -> ChainBridgeResult<Self> {
        options.validate()?;
        let chain = options.chain_type();

        let client = match options {
            BlockchainClientOptions::Ethereum(o) | BlockchainClientOptions::Polygon(o) => {
                BlockchainClient::Evm(EvmClient::new(JsonRpcProvider::new(o)?, chain, o.chain_id))
            }
            BlockchainClientOptions::Xpla(o) | BlockchainClientOptions::Terra(o) => {
                BlockchainClient::Cosmos(CosmosClient::new(
                    LcdProvider::new(o)?,
                    CosmosChainProfile::for_chain(chain)?,
                    o.chain_id.clone(),
                    o.gas_prices.clone(),
                ))
            }
        };

        log_info!(MODULE, "Client connected", chain = chain);
        Ok(client)
    }
}

impl<E: EvmProvider, C: CosmosProvider> BlockchainClient<E, C> {
    pub fn chain(&self) -> ChainType {
        match self {
            BlockchainClient::Evm(client) => client.chain(),
            BlockchainClient::Cosmos(client) => client.profile().chain,
        }
    }

    fn mismatch(&self, input: &str) -> ChainBridgeError {
        ChainBridgeError::invalid_input(format!(
            "{} input does not match the {} client",
            input,
            self.chain()
        ))
    }

    pub async fn create_tx(&self, options: CreateTxData, encoded: bool) -> ChainBridgeResult<UnsignedTx> {
        match (self, options) {
            (BlockchainClient::Evm(client), CreateTxData::Evm(options)) => {
                Ok(UnsignedTx::Evm(client.create_tx(options, encoded).await?))
            }
            (BlockchainClient::Cosmos(client), CreateTxData::Cosmos(options)) => {
                Ok(UnsignedTx::Cosmos(client.create_tx(options, encoded).await?))
            }
            (_, CreateTxData::Evm(_)) => Err(self.mismatch("EVM")),
            (_, CreateTxData::Cosmos(_)) => Err(self.mismatch("Cosmos")),
        }
    }

    pub async fn sign_tx<S>(&self, tx: UnsignedTx, signer: &S) -> ChainBridgeResult<SignedTx>
    where
        S: Signer + ?Sized,
    {
        match (self, tx) {
            (BlockchainClient::Evm(client), UnsignedTx::Evm(tx)) => {
                Ok(SignedTx::Evm(client.sign_tx(tx, signer).await?))
            }
            (BlockchainClient::Cosmos(client), UnsignedTx::Cosmos(tx)) => {
                Ok(SignedTx::Cosmos(client.sign_tx(tx, signer).await?))
            }
            (_, UnsignedTx::Evm(_)) => Err(self.mismatch("EVM")),
            (_, UnsignedTx::Cosmos(_)) => Err(self.mismatch("Cosmos")),
        }
    }

    pub async fn sign_msg<S>(&self, message: &[u8], signer: &S) -> ChainBridgeResult<String>
    where
        S: Signer + ?Sized,
    {
        match self {
            BlockchainClient::Evm(client) => client.sign_msg(message, signer).await,
            BlockchainClient::Cosmos(client) => client.sign_msg(message, signer).await,
        }
    }

    pub async fn estimate_fee(&self, options: &CreateTxData) -> ChainBridgeResult<FeeConfig> {
        match (self, options) {
            (BlockchainClient::Evm(client), CreateTxData::Evm(options)) => {
                Ok(FeeConfig::Evm(client.estimate_fee(options).await?))
            }
            (BlockchainClient::Cosmos(client), CreateTxData::Cosmos(options)) => {
                Ok(FeeConfig::Cosmos(client.estimate_fee(options).await?))
            }
            (_, CreateTxData::Evm(_)) => Err(self.mismatch("EVM")),
            (_, CreateTxData::Cosmos(_)) => Err(self.mismatch("Cosmos")),
        }
    }

    pub async fn send_signed_tx(&self, signed_tx: &str) -> ChainBridgeResult<TransactionResult> {
        match self {
            BlockchainClient::Evm(client) => client.send_signed_tx(signed_tx).await,
            BlockchainClient::Cosmos(client) => client.send_signed_tx(signed_tx).await,
        }
    }

    pub async fn send_signed_tx_async(&self, signed_tx: &str) -> ChainBridgeResult<TransactionResult> {
        match self {
            BlockchainClient::Evm(client) => client.send_signed_tx_async(signed_tx).await,
            BlockchainClient::Cosmos(client) => client.send_signed_tx_async(signed_tx).await,
        }
    }

    pub async fn get_tx(&self, tx_hash: &str) -> ChainBridgeResult<Transaction> {
        match self {
            BlockchainClient::Evm(client) => client.get_tx(tx_hash).await,
            BlockchainClient::Cosmos(client) => client.get_tx(tx_hash).await,
        }
    }

    pub async fn get_balance(&self, address: &str) -> ChainBridgeResult<Balance> {
        match self {
            BlockchainClient::Evm(client) => client.get_balance(address).await,
            BlockchainClient::Cosmos(client) => client.get_balance(address).await,
        }
    }

    pub async fn get_account_state(&self, address: &str) -> ChainBridgeResult<AccountState> {
        match self {
            BlockchainClient::Evm(client) => client.get_account_state(address).await,
            BlockchainClient::Cosmos(client) => client.get_account_state(address).await,
        }
    }

    pub async fn get_block(&self, number: Option<u64>) -> ChainBridgeResult<Block> {
        match self {
            BlockchainClient::Evm(client) => client.get_block(number).await,
            BlockchainClient::Cosmos(client) => client.get_block(number).await,
        }
    }

    /// EVM takes the hex call data as a JSON string; Cosmos takes the
    /// CosmWasm query message
    pub async fn contract_query(&self, contract: &str, query: &Value) -> ChainBridgeResult<Value> {
        match self {
            BlockchainClient::Evm(client) => {
                let data = query.as_str().ok_or_else(|| {
                    ChainBridgeError::invalid_input("EVM contract queries take hex call data")
                })?;
                client.contract_query(contract, data).await
            }
            BlockchainClient::Cosmos(client) => client.contract_query(contract, query).await,
        }
    }

    pub fn create_account(&self, mnemonic_or_key: Option<&str>) -> ChainBridgeResult<Account> {
        match self {
            BlockchainClient::Evm(client) => client.create_account(mnemonic_or_key),
            BlockchainClient::Cosmos(client) => client.create_account(mnemonic_or_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CosmosConnectionOptions, EvmConnectionOptions};
    use crate::cosmos::MultisigSignInfo;
    use crate::error::ErrorCode;

    #[test]
    fn test_connect_selects_engine() {
        let evm = BlockchainClient::connect(&BlockchainClientOptions::Polygon(
            EvmConnectionOptions::new("https://polygon-rpc.com", 137),
        ))
        .unwrap();
        assert_eq!(evm.chain(), ChainType::Polygon);
        assert!(matches!(evm, BlockchainClient::Evm(_)));

        let cosmos = BlockchainClient::connect(&BlockchainClientOptions::Terra(
            CosmosConnectionOptions::new("https://phoenix-lcd.terra.dev", "phoenix-1"),
        ))
        .unwrap();
        assert_eq!(cosmos.chain(), ChainType::Terra);
    }

    #[test]
    fn test_connect_validates_options() {
        let result = BlockchainClient::connect(&BlockchainClientOptions::Xpla(
            CosmosConnectionOptions::new("ftp://lcd", "dimension_37-1"),
        ));
        assert_eq!(result.err().map(|e| e.code), Some(ErrorCode::InvalidInput));
    }

    #[test]
    fn test_sign_info_is_not_broadcastable() {
        let info = SignedTx::Cosmos(CosmosSignOutput::SignInfo(MultisigSignInfo {
            chain_id: "dimension_37-1".into(),
            account_number: 3,
            sequence: 0,
            signer_address: "xpla1signer".into(),
            public_key: "AA==".into(),
            signature: "AA==".into(),
            sign_doc: "{}".into(),
        }));
        assert_eq!(info.broadcastable().unwrap_err().code, ErrorCode::TransactionDecode);
        assert_eq!(SignedTx::Evm("0xf8".into()).broadcastable().unwrap(), "0xf8");
    }

    #[test]
    fn test_create_tx_data_is_tagged() {
        let data: CreateTxData = serde_json::from_str(
            r#"{"evm":{"from":"0x9858EfFD232B4033E47d90003D41EC34EcaEda94","gasPrice":null}}"#,
        )
        .unwrap();
        match data {
            CreateTxData::Evm(options) => {
                assert_eq!(options.from.as_deref(), Some("0x9858EfFD232B4033E47d90003D41EC34EcaEda94"));
                assert_eq!(options.value, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
