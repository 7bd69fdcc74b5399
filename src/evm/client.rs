//! EVM signing and fee engine
//!
//! Drives transaction assembly, signing and broadcast for Ethereum-like
//! chains on top of any `EvmProvider`.

use secp256k1::{Secp256k1, SecretKey};
use serde_json::Value;

use crate::error::{ChainBridgeError, ChainBridgeResult};
use crate::signer::{RawKeySigner, Signer};
use crate::types::{Account, AccountState, Balance, Block, ChainType, Transaction, TransactionResult};
use crate::utils::crypto::{eth_address_bytes, keccak256, public_key_hash, to_checksum_address};
use crate::{log_debug, log_error, log_info, log_warn};

use super::fee::{compute_fee_config, FEE_HISTORY_BLOCKS, REWARD_PERCENTILE};
use super::normalize::{normalize_block, normalize_transaction, receipt_result};
use super::provider::EvmProvider;
use super::recovery::{recover_signature, RecoveredSignature};
use super::transaction::EvmTransaction;
use super::types::{CallRequest, EvmCreateTxData, EvmFeeConfig, EvmTxType};

const MODULE: &str = "evm";

/// Native token decimals on every supported EVM chain
pub const EVM_DECIMALS: u8 = 18;

/// Transaction accepted by `sign_tx`, and produced by `create_tx`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvmTxInput {
    Request(EvmCreateTxData),
    Transaction(EvmTransaction),
    /// `0x`-prefixed hex of the RLP encoding
    Encoded(String),
}

/// keccak256 of `"\x19Ethereum Signed Message:\n" || len || message`
pub fn hash_personal_message(message: &[u8]) -> [u8; 32] {
    let mut payload = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    payload.extend_from_slice(message);
    keccak256(&payload)
}

pub struct EvmClient<P> {
    provider: P,
    chain: ChainType,
    chain_id: u64,
}

impl<P: EvmProvider> EvmClient<P> {
    pub fn new(provider: P, chain: ChainType, chain_id: u64) -> Self {
        Self {
            provider,
            chain,
            chain_id,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn chain(&self) -> ChainType {
        self.chain
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Fill nonce, chain id, gas and fee fields.
    ///
    /// A caller-supplied `gas_price` selects a legacy transaction; otherwise
    /// the result is EIP-1559 with fee caps taken from `estimate_fee`.
    pub async fn create_tx(
        &self,
        options: EvmCreateTxData,
        encoded: bool,
    ) -> ChainBridgeResult<EvmTxInput> {
        let mut tx = options;

        if tx.nonce.is_none() {
            let from = tx.from.as_deref().ok_or_else(|| {
                ChainBridgeError::invalid_input("`from` is required when `nonce` is not set")
            })?;
            tx.nonce = Some(self.provider.get_transaction_count(from).await?);
        }
        tx.chain_id = Some(self.chain_id);

        let fee = self.estimate_fee(&tx).await?;
        tx.gas = Some(tx.gas.unwrap_or(fee.gas));

        if tx.gas_price.is_some() || tx.tx_type == Some(EvmTxType::Legacy) {
            tx.tx_type = Some(EvmTxType::Legacy);
            tx.gas_price = Some(tx.gas_price.unwrap_or(fee.gas_price));
            tx.max_fee_per_gas = None;
            tx.max_priority_fee_per_gas = None;
        } else {
            tx.tx_type = Some(EvmTxType::Eip1559);
            tx.max_fee_per_gas = Some(tx.max_fee_per_gas.unwrap_or(fee.max_fee_per_gas));
            tx.max_priority_fee_per_gas = Some(
                tx.max_priority_fee_per_gas
                    .unwrap_or(fee.max_priority_fee_per_gas),
            );
        }

        log_info!(
            MODULE,
            "Transaction created",
            chain = self.chain,
            from = tx.from.as_deref().unwrap_or("-"),
            nonce = tx.nonce.unwrap_or_default(),
            gas = tx.gas.unwrap_or_default()
        );

        if encoded {
            Ok(EvmTxInput::Encoded(EvmTransaction::from_request(&tx)?.encode_hex()))
        } else {
            Ok(EvmTxInput::Request(tx))
        }
    }

    /// Sign and return the `0x`-prefixed raw transaction
    pub async fn sign_tx<S>(&self, tx: EvmTxInput, signer: &S) -> ChainBridgeResult<String>
    where
        S: Signer + ?Sized,
    {
        let mut tx = match tx {
            EvmTxInput::Request(mut request) => {
                request.chain_id.get_or_insert(self.chain_id);
                EvmTransaction::from_request(&request)?
            }
            EvmTxInput::Transaction(tx) => tx,
            EvmTxInput::Encoded(encoded) => EvmTransaction::decode_hex(&encoded)?,
        };

        let digest = tx.signing_hash();
        let signature = self.sign_recoverable(&digest, signer).await?;
        tx.apply_signature(&signature)?;

        log_info!(MODULE, "Transaction signed", chain = self.chain, tx_hash = tx.tx_hash());
        Ok(tx.encode_hex())
    }

    /// `personal_sign` signature, `0x`-prefixed `r || s || v`
    pub async fn sign_msg<S>(&self, message: &[u8], signer: &S) -> ChainBridgeResult<String>
    where
        S: Signer + ?Sized,
    {
        let digest = hash_personal_message(message);
        let signature = self.sign_recoverable(&digest, signer).await?;
        Ok(format!("0x{}", hex::encode(signature.to_rsv_bytes())))
    }

    async fn sign_recoverable<S>(
        &self,
        digest: &[u8; 32],
        signer: &S,
    ) -> ChainBridgeResult<RecoveredSignature>
    where
        S: Signer + ?Sized,
    {
        let public_key = signer.public_key(false).await?;
        let expected_hash = public_key_hash(&public_key)?;
        let signature = signer.sign(digest).await?;
        recover_signature(digest, &expected_hash, &signature).map_err(|e| {
            log_error!(MODULE, "Recovery id search failed", chain = self.chain, reason = e.message);
            e
        })
    }

    /// Gas estimate, gas price and fee history are fetched concurrently
    pub async fn estimate_fee(&self, tx: &EvmCreateTxData) -> ChainBridgeResult<EvmFeeConfig> {
        let call = CallRequest::from(tx);
        let (gas, gas_price, history) = tokio::try_join!(
            self.provider.estimate_gas(&call),
            self.provider.gas_price(),
            self.provider
                .fee_history(FEE_HISTORY_BLOCKS, &[REWARD_PERCENTILE]),
        )?;

        let fee = compute_fee_config(gas, gas_price, &history)?;
        log_debug!(
            MODULE,
            "Fee estimated",
            gas = fee.gas,
            gas_price = fee.gas_price,
            max_fee_per_gas = fee.max_fee_per_gas,
            max_priority_fee_per_gas = fee.max_priority_fee_per_gas
        );
        Ok(fee)
    }

    /// Broadcast and wait for inclusion
    pub async fn send_signed_tx(&self, raw_tx: &str) -> ChainBridgeResult<TransactionResult> {
        ensure_signed(raw_tx)?;

        let tx_hash = self.provider.send_raw_transaction(raw_tx).await.map_err(|e| {
            log_error!(MODULE, "Broadcast failed", chain = self.chain, reason = e.message);
            e
        })?;
        let receipt = self.provider.wait_for_receipt(&tx_hash).await?;
        let result = receipt_result(&receipt);

        if receipt.succeeded() {
            log_info!(MODULE, "Transaction included", chain = self.chain, tx_hash = tx_hash);
        } else {
            log_warn!(MODULE, "Transaction reverted", chain = self.chain, tx_hash = tx_hash);
        }
        Ok(result)
    }

    /// Broadcast and return as soon as the node accepts the hash
    pub async fn send_signed_tx_async(&self, raw_tx: &str) -> ChainBridgeResult<TransactionResult> {
        ensure_signed(raw_tx)?;

        let tx_hash = self.provider.send_raw_transaction(raw_tx).await?;
        log_info!(MODULE, "Transaction submitted", chain = self.chain, tx_hash = tx_hash);
        Ok(TransactionResult::pending(tx_hash))
    }

    pub async fn get_tx(&self, tx_hash: &str) -> ChainBridgeResult<Transaction> {
        let (tx, receipt) = tokio::try_join!(
            self.provider.get_transaction(tx_hash),
            self.provider.get_transaction_receipt(tx_hash),
        )?;
        let tx = tx.ok_or_else(|| {
            ChainBridgeError::provider(format!("Transaction {} not found", tx_hash))
        })?;
        normalize_transaction(&tx, receipt.as_ref())
    }

    pub async fn get_balance(&self, address: &str) -> ChainBridgeResult<Balance> {
        Ok(Balance {
            value: self.provider.get_balance(address).await?,
            decimals: EVM_DECIMALS,
        })
    }

    pub async fn get_account_state(&self, address: &str) -> ChainBridgeResult<AccountState> {
        Ok(AccountState {
            nonce: self.provider.get_transaction_count(address).await?,
            account_number: None,
            public_key: None,
        })
    }

    pub async fn get_block(&self, number: Option<u64>) -> ChainBridgeResult<Block> {
        normalize_block(&self.provider.get_block(number).await?)
    }

    /// `eth_call` with ABI-encoded `data`; the raw hex output is returned
    pub async fn contract_query(&self, contract: &str, data: &str) -> ChainBridgeResult<Value> {
        let call = CallRequest {
            to: Some(contract.to_string()),
            data: Some(data.to_string()),
            ..Default::default()
        };
        Ok(Value::String(self.provider.call(&call).await?))
    }

    /// Random account, or the account of `private_key` (hex or base64)
    pub fn create_account(&self, private_key: Option<&str>) -> ChainBridgeResult<Account> {
        let signer = match private_key {
            Some(encoded) => RawKeySigner::from_encoded(encoded)?,
            None => {
                let secret = SecretKey::new(&mut secp256k1::rand::thread_rng());
                RawKeySigner::from_bytes(&secret.secret_bytes())?
            }
        };

        let secp = Secp256k1::signing_only();
        let public_key = signer.secret_key()?.public_key(&secp).serialize_uncompressed();
        let address = to_checksum_address(&eth_address_bytes(&public_key)?);

        log_info!(MODULE, "Account created", chain = self.chain, address = address);
        Ok(Account {
            address,
            public_key: Some(format!("0x{}", hex::encode(public_key))),
            private_key: signer.export_hex(),
            mnemonic: None,
        })
    }
}

/// Reject anything that is not a signed transaction, before any network call
fn ensure_signed(raw_tx: &str) -> ChainBridgeResult<EvmTransaction> {
    let tx = EvmTransaction::decode_hex(raw_tx)?;
    if !tx.is_signed() {
        return Err(ChainBridgeError::unsigned(
            "Transaction has no signature; sign it before broadcasting",
        ));
    }
    Ok(tx)
}
