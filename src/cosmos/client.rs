//! Cosmos SDK signing and fee engine
//!
//! Chain-agnostic: everything chain specific comes from the
//! `CosmosChainProfile` the client is built with. Transactions are signed in
//! legacy Amino JSON mode; when the signer acts for a multisig account the
//! engine returns a `MultisigSignInfo` instead of a transaction.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::try_join_all;
use secp256k1::Secp256k1;
use serde_json::Value;

use crate::error::{ChainBridgeError, ChainBridgeResult};
use crate::signer::{generate_mnemonic, DerivationOptions, MnemonicSigner, RawKeySigner, Signer};
use crate::types::{Account, AccountState, Balance, Block, Transaction, TransactionResult};
use crate::{log_debug, log_error, log_info};

use super::amino::{sign_doc_bytes, SignDocParams};
use super::normalize::{broadcast_result, normalize_block, normalize_transaction};
use super::profile::CosmosChainProfile;
use super::provider::CosmosProvider;
use super::pubkey::AccountPublicKey;
use super::signer_key::CosmosSignerKey;
use super::tx::{AuthInfo, SignMode, SignerInfo, Tx, TxBody};
use super::types::{
    BroadcastMode, CosmosCreateTxData, CosmosFeeConfig, DecCoin, FeeEstimateRequest,
    MultisigSignInfo, SignerData, SignerOptions,
};

const MODULE: &str = "cosmos";

pub const DEFAULT_GAS_ADJUSTMENT: f64 = 1.5;

/// Transaction accepted by `sign_tx`, and produced by `create_tx`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CosmosTxInput {
    Tx(Tx),
    /// base64 of the protobuf encoding
    Encoded(String),
}

impl CosmosTxInput {
    pub fn into_tx(self) -> ChainBridgeResult<Tx> {
        match self {
            CosmosTxInput::Tx(tx) => Ok(tx),
            CosmosTxInput::Encoded(encoded) => Tx::from_base64(&encoded),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CosmosSignOutput {
    /// base64 transaction, ready for `send_signed_tx` once fully signed
    Tx(String),
    /// Partial signature for a multisig account; not broadcastable
    SignInfo(MultisigSignInfo),
}

pub struct CosmosClient<P> {
    provider: P,
    profile: &'static CosmosChainProfile,
    chain_id: String,
    gas_prices: Option<Vec<DecCoin>>,
}

impl<P: CosmosProvider> CosmosClient<P> {
    pub fn new(
        provider: P,
        profile: &'static CosmosChainProfile,
        chain_id: impl Into<String>,
        gas_prices: Option<Vec<DecCoin>>,
    ) -> Self {
        Self {
            provider,
            profile,
            chain_id: chain_id.into(),
            gas_prices,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn profile(&self) -> &'static CosmosChainProfile {
        self.profile
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Unsigned transaction; signers with a pinned sequence get a placeholder slot
    pub async fn create_tx(
        &self,
        options: CosmosCreateTxData,
        encoded: bool,
    ) -> ChainBridgeResult<CosmosTxInput> {
        if options.msgs.is_empty() {
            return Err(ChainBridgeError::invalid_input(
                "A transaction needs at least one message",
            ));
        }

        let fee = match options.fee.clone() {
            Some(fee) => fee,
            None => self.estimate_fee(&options).await?.fee,
        };

        let signer_infos = options
            .signers
            .iter()
            .filter_map(|signer| {
                signer.sequence_number.map(|sequence| {
                    SignerInfo::new(signer.public_key.clone(), SignMode::Direct, sequence)
                })
            })
            .collect::<Vec<_>>();

        log_info!(
            MODULE,
            "Transaction created",
            chain = self.profile.chain,
            messages = options.msgs.len(),
            gas = fee.gas_limit,
            placeholders = signer_infos.len()
        );

        let tx = Tx {
            body: TxBody {
                messages: options.msgs,
                memo: options.memo,
                timeout_height: options.timeout_height,
            },
            auth_info: AuthInfo { signer_infos, fee },
            signatures: Vec::new(),
        };

        if encoded {
            Ok(CosmosTxInput::Encoded(tx.to_base64()?))
        } else {
            Ok(CosmosTxInput::Tx(tx))
        }
    }

    /// Sign in Amino JSON mode.
    ///
    /// When no message is sent by the signer and the sending account holds a
    /// multisig key, the result is a `MultisigSignInfo` for that account.
    pub async fn sign_tx<S>(&self, tx: CosmosTxInput, signer: &S) -> ChainBridgeResult<CosmosSignOutput>
    where
        S: Signer + ?Sized,
    {
        let mut tx = tx.into_tx()?;
        let key = CosmosSignerKey::new(signer, self.profile);
        let compressed = key.compressed_public_key().await?;
        let public_key = self.profile.public_key(&compressed);
        let address = self.profile.address(&compressed)?;

        let pinned_sequence = take_placeholder(&mut tx, &public_key);

        let senders = tx
            .body
            .messages
            .iter()
            .filter_map(|msg| msg.signer_address())
            .collect::<Vec<_>>();

        if !senders.contains(&address.as_str()) {
            if let Some(target) = senders.first().map(|s| s.to_string()) {
                let account = self.provider.account_info(&target).await?;
                let is_multisig = account
                    .public_key
                    .as_ref()
                    .map_or(false, |pk| !pk.is_simple());

                if is_multisig {
                    let params = SignDocParams {
                        chain_id: &self.chain_id,
                        account_number: account.account_number,
                        sequence: pinned_sequence.unwrap_or(account.sequence),
                    };
                    let sign_doc = sign_doc_bytes(&tx, &params)?;
                    let signature = key.sign(&sign_doc).await?;

                    log_info!(
                        MODULE,
                        "Multisig signature produced",
                        chain = self.profile.chain,
                        address = address,
                        multisig_address = target
                    );
                    return Ok(CosmosSignOutput::SignInfo(MultisigSignInfo {
                        chain_id: self.chain_id.clone(),
                        account_number: params.account_number,
                        sequence: params.sequence,
                        signer_address: address,
                        public_key: STANDARD.encode(&compressed),
                        signature: STANDARD.encode(signature),
                        sign_doc: String::from_utf8(sign_doc).map_err(|e| {
                            ChainBridgeError::internal(format!("Sign doc is not UTF-8: {}", e))
                        })?,
                    }));
                }
            }
        }

        let account = self.provider.account_info(&address).await?;
        let sequence = pinned_sequence.unwrap_or(account.sequence);
        let params = SignDocParams {
            chain_id: &self.chain_id,
            account_number: account.account_number,
            sequence,
        };
        let signature = key.sign(&sign_doc_bytes(&tx, &params)?).await?;

        let slot = tx.signatures.len();
        tx.auth_info.signer_infos.insert(
            slot,
            SignerInfo::new(Some(public_key), SignMode::LegacyAminoJson, sequence),
        );
        tx.signatures.push(signature.to_vec());

        log_info!(
            MODULE,
            "Transaction signed",
            chain = self.profile.chain,
            address = address,
            sequence = sequence,
            signatures = tx.signatures.len()
        );
        Ok(CosmosSignOutput::Tx(tx.to_base64()?))
    }

    /// base64 signature over the chain digest of `message`
    pub async fn sign_msg<S>(&self, message: &[u8], signer: &S) -> ChainBridgeResult<String>
    where
        S: Signer + ?Sized,
    {
        let signature = CosmosSignerKey::new(signer, self.profile).sign(message).await?;
        Ok(STANDARD.encode(signature))
    }

    /// Simulate the transaction and price `gas_used * gas_adjustment`
    pub async fn estimate_fee(&self, options: &CosmosCreateTxData) -> ChainBridgeResult<CosmosFeeConfig> {
        if options.signers.is_empty() {
            return Err(ChainBridgeError::invalid_input(
                "Fee estimation needs at least one signer",
            ));
        }

        let signers = try_join_all(options.signers.iter().map(|s| self.signer_data(s))).await?;

        let gas_prices = options
            .gas_prices
            .clone()
            .or_else(|| self.gas_prices.clone())
            .unwrap_or_else(|| self.profile.default_gas_prices());
        for price in &gas_prices {
            price.validate()?;
        }
        let gas_adjustment = options.gas_adjustment.unwrap_or(DEFAULT_GAS_ADJUSTMENT);

        let request = FeeEstimateRequest {
            msgs: options.msgs.clone(),
            memo: options.memo.clone(),
            gas_prices: gas_prices.clone(),
            gas_adjustment,
            fee_denoms: options.fee_denoms.clone(),
        };
        let fee = self.provider.estimate_fee(&signers, &request).await?;

        log_debug!(
            MODULE,
            "Fee estimated",
            chain = self.profile.chain,
            gas = fee.gas_limit,
            gas_adjustment = gas_adjustment
        );
        Ok(CosmosFeeConfig {
            gas: fee.gas_limit,
            fee,
            gas_adjustment,
            gas_prices,
        })
    }

    async fn signer_data(&self, signer: &SignerOptions) -> ChainBridgeResult<SignerData> {
        if let (Some(sequence), Some(public_key)) = (signer.sequence_number, &signer.public_key) {
            return Ok(SignerData {
                address: signer.address.clone(),
                sequence,
                public_key: Some(public_key.clone()),
            });
        }

        let account = self.provider.account_info(&signer.address).await?;
        Ok(SignerData {
            address: signer.address.clone(),
            sequence: signer.sequence_number.unwrap_or(account.sequence),
            public_key: signer.public_key.clone().or(account.public_key),
        })
    }

    /// Broadcast and wait for the block result
    pub async fn send_signed_tx(&self, signed_tx: &str) -> ChainBridgeResult<TransactionResult> {
        let tx_bytes = ensure_signed(signed_tx)?;

        let response = self.provider.broadcast(&tx_bytes, BroadcastMode::Block).await?;
        let result = broadcast_result(&response, &self.profile.error_codes);

        match &result {
            Ok(r) => log_info!(
                MODULE,
                "Transaction included",
                chain = self.profile.chain,
                tx_hash = r.txhash,
                code = response.code
            ),
            Err(e) => log_error!(
                MODULE,
                "Transaction rejected",
                chain = self.profile.chain,
                code = response.code,
                reason = e.message
            ),
        }
        result
    }

    /// Broadcast and return once the node has checked the transaction
    pub async fn send_signed_tx_async(&self, signed_tx: &str) -> ChainBridgeResult<TransactionResult> {
        let tx_bytes = ensure_signed(signed_tx)?;

        let response = self.provider.broadcast(&tx_bytes, BroadcastMode::Async).await?;
        if response.code != 0 {
            log_error!(
                MODULE,
                "Transaction rejected by mempool",
                chain = self.profile.chain,
                code = response.code
            );
            let raw_log = (!response.raw_log.is_empty()).then_some(response.raw_log.as_str());
            return Err(ChainBridgeError::chain_failure(
                response.code,
                raw_log,
                &self.profile.error_codes,
            ));
        }

        log_info!(MODULE, "Transaction submitted", chain = self.profile.chain, tx_hash = response.txhash);
        Ok(TransactionResult::pending(response.txhash))
    }

    pub async fn get_tx(&self, tx_hash: &str) -> ChainBridgeResult<Transaction> {
        Ok(normalize_transaction(&self.provider.tx_info(tx_hash).await?))
    }

    /// Bank balance in the profile's fee denom
    pub async fn get_balance(&self, address: &str) -> ChainBridgeResult<Balance> {
        Ok(Balance {
            value: self.provider.balance(address, self.profile.fee_denom).await?,
            decimals: self.profile.decimals,
        })
    }

    pub async fn get_account_state(&self, address: &str) -> ChainBridgeResult<AccountState> {
        let account = self.provider.account_info(address).await?;
        Ok(AccountState {
            nonce: account.sequence,
            account_number: Some(account.account_number),
            public_key: account.public_key.as_ref().map(encode_public_key),
        })
    }

    pub async fn get_block(&self, height: Option<u64>) -> ChainBridgeResult<Block> {
        normalize_block(&self.provider.block(height).await?)
    }

    /// CosmWasm smart query
    pub async fn contract_query(&self, contract: &str, query: &Value) -> ChainBridgeResult<Value> {
        self.provider.contract_query(contract, query).await
    }

    /// New account from a fresh 24-word mnemonic, or from the given mnemonic
    /// or private key (hex or base64)
    pub fn create_account(&self, mnemonic_or_key: Option<&str>) -> ChainBridgeResult<Account> {
        let key_signer;
        let mnemonic_signer;
        let (raw, mnemonic): (&RawKeySigner, Option<String>) = match mnemonic_or_key.map(str::trim) {
            Some(key) if !key.contains(char::is_whitespace) => {
                key_signer = RawKeySigner::from_encoded(key)?;
                (&key_signer, None)
            }
            input => {
                let mnemonic = match input {
                    Some(words) => words.to_string(),
                    None => generate_mnemonic()?,
                };
                mnemonic_signer = MnemonicSigner::new(
                    &mnemonic,
                    DerivationOptions::with_coin_type(self.profile.coin_type),
                )?;
                (mnemonic_signer.raw(), Some(mnemonic))
            }
        };

        let secp = Secp256k1::signing_only();
        let compressed = raw.secret_key()?.public_key(&secp).serialize();
        let address = self.profile.address(&compressed)?;

        log_info!(MODULE, "Account created", chain = self.profile.chain, address = address);
        Ok(Account {
            address,
            public_key: Some(STANDARD.encode(compressed)),
            private_key: raw.export_hex(),
            mnemonic,
        })
    }
}

/// Remove the placeholder slot reserved for `public_key` (else the first
/// placeholder) and return its pinned sequence
fn take_placeholder(tx: &mut Tx, public_key: &AccountPublicKey) -> Option<u64> {
    let placeholders = tx.placeholder_infos();
    let offset = placeholders
        .iter()
        .position(|info| info.public_key.as_ref() == Some(public_key))
        .or_else(|| (!placeholders.is_empty()).then_some(0))?;

    let slot = tx.signatures.len() + offset;
    Some(tx.auth_info.signer_infos.remove(slot).sequence)
}

/// base64 key bytes for single keys, LCD JSON for anything else
fn encode_public_key(public_key: &AccountPublicKey) -> String {
    match public_key.key_bytes() {
        Some(bytes) => STANDARD.encode(bytes),
        None => public_key.to_json().to_string(),
    }
}

/// Decode a broadcast payload and reject it unless every slot is signed.
/// Runs before any network call.
fn ensure_signed(payload: &str) -> ChainBridgeResult<Vec<u8>> {
    if serde_json::from_str::<MultisigSignInfo>(payload).is_ok() {
        return Err(ChainBridgeError::decode(
            "Multisig sign info is not a transaction; combine the signatures first",
        ));
    }

    let tx_bytes = STANDARD.decode(payload.trim())?;
    if tx_bytes.is_empty() {
        return Err(ChainBridgeError::decode("Empty transaction payload"));
    }
    let tx = Tx::decode(&tx_bytes)?;
    if !tx.is_fully_signed() {
        return Err(ChainBridgeError::unsigned(
            "Transaction is missing signatures; sign it before broadcasting",
        ));
    }
    Ok(tx_bytes)
}
