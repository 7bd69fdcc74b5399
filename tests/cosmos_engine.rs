use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chainbridge_core::cosmos::amino::{sign_doc_bytes, SignDocParams};
use chainbridge_core::cosmos::provider::compute_fee;
use chainbridge_core::cosmos::{
    AccountInfo, AccountPublicKey, BroadcastMode, BroadcastResponse, Coin, CosmosChainProfile,
    CosmosClient, CosmosCreateTxData, CosmosProvider, CosmosSignOutput, CosmosTxInput, DecCoin,
    Fee, FeeEstimateRequest, LcdBlock, Msg, MsgSend, SignMode, SignerData, SignerOptions, Tx,
    TxInfo, ModeInfo, TERRA,
};
use chainbridge_core::error::{ChainBridgeError, ChainBridgeResult, ErrorCode};
use chainbridge_core::{RawKeySigner, Signer, TxStatus};
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1};
use serde_json::Value;

const CHAIN_ID: &str = "pisco-1";
const MULTISIG: &str = "terra1multisigaccount";

/// In-memory LCD that records every call it receives
struct MockLcd {
    calls: Mutex<Vec<&'static str>>,
    accounts: HashMap<String, AccountInfo>,
    gas_used: u64,
    estimates: Mutex<Vec<FeeEstimateRequest>>,
    broadcasts: Mutex<Vec<Vec<u8>>>,
    response: BroadcastResponse,
}

impl MockLcd {
    fn new(accounts: Vec<AccountInfo>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            accounts: accounts.into_iter().map(|a| (a.address.clone(), a)).collect(),
            gas_used: 100_000,
            estimates: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
            response: BroadcastResponse {
                txhash: "A1B2".into(),
                code: 0,
                height: 77,
                raw_log: String::new(),
            },
        }
    }

    fn record(&self, method: &'static str) {
        self.calls.lock().unwrap().push(method);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.broadcasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CosmosProvider for MockLcd {
    async fn account_info(&self, address: &str) -> ChainBridgeResult<AccountInfo> {
        self.record("account_info");
        self.accounts
            .get(address)
            .cloned()
            .ok_or_else(|| ChainBridgeError::provider(format!("account {} not found", address)))
    }

    async fn estimate_fee(&self, _signers: &[SignerData], request: &FeeEstimateRequest) -> ChainBridgeResult<Fee> {
        self.record("estimate_fee");
        self.estimates.lock().unwrap().push(request.clone());
        compute_fee(
            self.gas_used,
            &request.gas_prices,
            request.gas_adjustment,
            request.fee_denoms.as_deref(),
        )
    }

    async fn broadcast(&self, tx_bytes: &[u8], _mode: BroadcastMode) -> ChainBridgeResult<BroadcastResponse> {
        self.record("broadcast");
        self.broadcasts.lock().unwrap().push(tx_bytes.to_vec());
        Ok(self.response.clone())
    }

    async fn tx_info(&self, tx_hash: &str) -> ChainBridgeResult<TxInfo> {
        self.record("tx_info");
        Ok(TxInfo {
            txhash: tx_hash.to_string(),
            height: 77,
            code: 0,
            gas_wanted: 150_000,
            gas_used: 98_000,
            fee: vec![Coin::new(2250, "uluna")],
            ..Default::default()
        })
    }

    async fn balance(&self, _address: &str, denom: &str) -> ChainBridgeResult<u128> {
        self.record("balance");
        assert_eq!(denom, "uluna");
        Ok(1_000_000)
    }

    async fn block(&self, _height: Option<u64>) -> ChainBridgeResult<LcdBlock> {
        self.record("block");
        Ok(LcdBlock::default())
    }

    async fn contract_query(&self, _contract: &str, query: &Value) -> ChainBridgeResult<Value> {
        self.record("contract_query");
        Ok(query.clone())
    }
}

struct Fixture {
    signer: RawKeySigner,
    address: String,
    public_key: AccountPublicKey,
}

async fn fixture() -> Fixture {
    let signer = RawKeySigner::from_bytes(&[0x01; 32]).unwrap();
    let compressed = signer.public_key(true).await.unwrap();
    Fixture {
        address: TERRA.address(&compressed).unwrap(),
        public_key: TERRA.public_key(&compressed),
        signer,
    }
}

fn account(address: &str, account_number: u64, sequence: u64, public_key: Option<AccountPublicKey>) -> AccountInfo {
    AccountInfo {
        address: address.to_string(),
        account_number,
        sequence,
        public_key,
    }
}

fn send_from(from: &str) -> Msg {
    Msg::Send(MsgSend {
        from_address: from.to_string(),
        to_address: "terra1recipient".into(),
        amount: vec![Coin::new(1_000, "uluna")],
    })
}

fn client(lcd: MockLcd) -> CosmosClient<MockLcd> {
    CosmosClient::new(lcd, &TERRA, CHAIN_ID, None)
}

fn verify(profile: &CosmosChainProfile, sign_bytes: &[u8], signature: &[u8], signer: &[u8]) -> bool {
    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(profile.digest(sign_bytes));
    let signature = Signature::from_compact(signature).unwrap();
    let public_key = PublicKey::from_slice(signer).unwrap();
    secp.verify_ecdsa(&message, &signature, &public_key).is_ok()
}

#[tokio::test]
async fn estimate_fee_applies_default_gas_adjustment() {
    let f = fixture().await;
    let client = client(MockLcd::new(vec![account(&f.address, 12, 3, None)]));

    let options = CosmosCreateTxData {
        msgs: vec![send_from(&f.address)],
        signers: vec![SignerOptions::new(f.address.clone())],
        ..Default::default()
    };
    let fee = client.estimate_fee(&options).await.unwrap();

    assert_eq!(fee.gas_adjustment, 1.5);
    assert_eq!(fee.gas, 150_000);
    // 0.015uluna * 150000
    assert_eq!(fee.fee.amount, vec![Coin::new(2250, "uluna")]);

    let sent = client.provider().estimates.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].gas_adjustment, 1.5);
    assert_eq!(sent[0].gas_prices, vec![DecCoin::new("0.015", "uluna")]);
}

#[tokio::test]
async fn configured_gas_prices_override_profile_default() {
    let f = fixture().await;
    let lcd = MockLcd::new(vec![account(&f.address, 12, 3, None)]);
    let client = CosmosClient::new(lcd, &TERRA, CHAIN_ID, Some(vec![DecCoin::new("0.02", "uluna")]));

    let fee = client
        .estimate_fee(&CosmosCreateTxData {
            msgs: vec![send_from(&f.address)],
            gas_adjustment: Some(2.0),
            signers: vec![SignerOptions::new(f.address.clone())],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(fee.gas, 200_000);
    assert_eq!(fee.fee.amount, vec![Coin::new(4000, "uluna")]);
}

#[tokio::test]
async fn create_tx_reserves_slots_for_pinned_sequences() {
    let f = fixture().await;
    let client = client(MockLcd::new(Vec::new()));

    let mut pinned = SignerOptions::new(f.address.clone());
    pinned.sequence_number = Some(42);
    pinned.public_key = Some(f.public_key.clone());

    let created = client
        .create_tx(
            CosmosCreateTxData {
                msgs: vec![send_from(&f.address)],
                fee: Some(Fee::new(200_000, vec![Coin::new(3000, "uluna")])),
                signers: vec![pinned, SignerOptions::new("terra1cosigner")],
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap();

    let tx = match created {
        CosmosTxInput::Tx(tx) => tx,
        other => panic!("unexpected {:?}", other),
    };
    assert!(tx.signatures.is_empty());
    assert_eq!(tx.auth_info.signer_infos.len(), 1);
    assert_eq!(tx.auth_info.signer_infos[0].sequence, 42);
    assert_eq!(tx.placeholder_infos().len(), 1);
    // an explicit fee skips simulation
    assert!(client.provider().calls().is_empty());
}

#[tokio::test]
async fn direct_signing_produces_broadcastable_tx() {
    let f = fixture().await;
    let client = client(MockLcd::new(vec![account(&f.address, 12, 3, Some(f.public_key.clone()))]));

    let created = client
        .create_tx(
            CosmosCreateTxData {
                msgs: vec![send_from(&f.address)],
                memo: "a<b".into(),
                signers: vec![SignerOptions::new(f.address.clone())],
                ..Default::default()
            },
            true,
        )
        .await
        .unwrap();
    let unsigned = match &created {
        CosmosTxInput::Encoded(encoded) => Tx::from_base64(encoded).unwrap(),
        other => panic!("unexpected {:?}", other),
    };

    let signed = match client.sign_tx(created, &f.signer).await.unwrap() {
        CosmosSignOutput::Tx(encoded) => encoded,
        other => panic!("unexpected {:?}", other),
    };
    let tx = Tx::from_base64(&signed).unwrap();

    assert_eq!(tx.body.encode().unwrap(), unsigned.body.encode().unwrap());
    assert_eq!(tx.auth_info.fee, unsigned.auth_info.fee);
    assert_eq!(tx.signatures.len(), 1);
    assert!(tx.is_fully_signed());

    let info = &tx.auth_info.signer_infos[0];
    assert_eq!(info.mode_info, ModeInfo::Single(SignMode::LegacyAminoJson));
    assert_eq!(info.sequence, 3);
    assert_eq!(info.public_key.as_ref(), Some(&f.public_key));

    let doc = sign_doc_bytes(
        &unsigned,
        &SignDocParams {
            chain_id: CHAIN_ID,
            account_number: 12,
            sequence: 3,
        },
    )
    .unwrap();
    let key = f.public_key.key_bytes().unwrap().to_vec();
    assert!(verify(&TERRA, &doc, &tx.signatures[0], &key));

    let result = client.send_signed_tx(&signed).await.unwrap();
    assert_eq!(result.status, TxStatus::Success);
    assert_eq!(result.txhash, "A1B2");
    assert_eq!(client.provider().broadcasts(), vec![STANDARD.decode(&signed).unwrap()]);
}

#[tokio::test]
async fn pinned_sequence_replaces_placeholder() {
    let f = fixture().await;
    let client = client(MockLcd::new(vec![account(&f.address, 12, 3, None)]));

    let mut pinned = SignerOptions::new(f.address.clone());
    pinned.sequence_number = Some(42);
    pinned.public_key = Some(f.public_key.clone());

    let created = client
        .create_tx(
            CosmosCreateTxData {
                msgs: vec![send_from(&f.address)],
                fee: Some(Fee::new(200_000, vec![Coin::new(3000, "uluna")])),
                signers: vec![pinned],
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap();
    let unsigned = match &created {
        CosmosTxInput::Tx(tx) => tx.clone(),
        other => panic!("unexpected {:?}", other),
    };

    let tx = match client.sign_tx(created, &f.signer).await.unwrap() {
        CosmosSignOutput::Tx(encoded) => Tx::from_base64(&encoded).unwrap(),
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(tx.auth_info.signer_infos.len(), 1);
    assert_eq!(tx.auth_info.signer_infos[0].sequence, 42);

    let doc = sign_doc_bytes(
        &unsigned,
        &SignDocParams {
            chain_id: CHAIN_ID,
            account_number: 12,
            sequence: 42,
        },
    )
    .unwrap();
    let key = f.public_key.key_bytes().unwrap().to_vec();
    assert!(verify(&TERRA, &doc, &tx.signatures[0], &key));
}

#[tokio::test]
async fn multisig_member_gets_sign_info_and_nothing_is_broadcast() {
    let f = fixture().await;
    let multisig_key = AccountPublicKey::Multisig {
        threshold: 2,
        public_keys: vec![
            f.public_key.clone(),
            AccountPublicKey::Secp256k1(
                hex::decode("02f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9").unwrap(),
            ),
        ],
    };
    let client = client(MockLcd::new(vec![
        account(&f.address, 12, 3, Some(f.public_key.clone())),
        account(MULTISIG, 88, 5, Some(multisig_key)),
    ]));

    let created = client
        .create_tx(
            CosmosCreateTxData {
                msgs: vec![send_from(MULTISIG)],
                fee: Some(Fee::new(200_000, vec![Coin::new(3000, "uluna")])),
                ..Default::default()
            },
            true,
        )
        .await
        .unwrap();

    let info = match client.sign_tx(created, &f.signer).await.unwrap() {
        CosmosSignOutput::SignInfo(info) => info,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(info.account_number, 88);
    assert_eq!(info.sequence, 5);
    assert_eq!(info.signer_address, f.address);
    assert_eq!(info.chain_id, CHAIN_ID);

    let doc: Value = serde_json::from_str(&info.sign_doc).unwrap();
    assert_eq!(doc["account_number"], "88");
    assert_eq!(doc["msgs"][0]["type"], "cosmos-sdk/MsgSend");

    let signature = STANDARD.decode(&info.signature).unwrap();
    let key = STANDARD.decode(&info.public_key).unwrap();
    assert!(verify(&TERRA, info.sign_doc.as_bytes(), &signature, &key));

    let payload = serde_json::to_string(&info).unwrap();
    let err = client.send_signed_tx(&payload).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::TransactionDecode);
    assert!(!client.provider().calls().contains(&"broadcast"));
}

#[tokio::test]
async fn unsigned_tx_is_rejected_before_broadcast() {
    let f = fixture().await;
    let client = client(MockLcd::new(Vec::new()));

    let created = client
        .create_tx(
            CosmosCreateTxData {
                msgs: vec![send_from(&f.address)],
                fee: Some(Fee::new(200_000, vec![Coin::new(3000, "uluna")])),
                ..Default::default()
            },
            true,
        )
        .await
        .unwrap();
    let encoded = match created {
        CosmosTxInput::Encoded(encoded) => encoded,
        other => panic!("unexpected {:?}", other),
    };

    let err = client.send_signed_tx(&encoded).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::UnsignedTransaction);
    let err = client.send_signed_tx_async(&encoded).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::UnsignedTransaction);
    assert!(client.provider().calls().is_empty());
}

#[tokio::test]
async fn open_co_signer_slot_blocks_broadcast() {
    let f = fixture().await;
    let co_signer = RawKeySigner::from_bytes(&[0x02; 32]).unwrap();
    let co_compressed = co_signer.public_key(true).await.unwrap();
    let co_address = TERRA.address(&co_compressed).unwrap();
    let client = client(MockLcd::new(vec![
        account(&f.address, 12, 3, None),
        account(&co_address, 13, 8, None),
    ]));

    let mut mine = SignerOptions::new(f.address.clone());
    mine.sequence_number = Some(42);
    mine.public_key = Some(f.public_key.clone());
    let mut theirs = SignerOptions::new(co_address.clone());
    theirs.sequence_number = Some(4);
    theirs.public_key = Some(TERRA.public_key(&co_compressed));

    let created = client
        .create_tx(
            CosmosCreateTxData {
                msgs: vec![send_from(&f.address), send_from(&co_address)],
                fee: Some(Fee::new(200_000, vec![Coin::new(3000, "uluna")])),
                signers: vec![mine, theirs],
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap();

    let signed = match client.sign_tx(created, &f.signer).await.unwrap() {
        CosmosSignOutput::Tx(encoded) => encoded,
        other => panic!("unexpected {:?}", other),
    };
    let tx = Tx::from_base64(&signed).unwrap();
    assert_eq!(tx.signatures.len(), 1);
    assert_eq!(tx.placeholder_infos().len(), 1);
    assert_eq!(tx.placeholder_infos()[0].sequence, 4);
    assert!(!tx.is_fully_signed());

    let err = client.send_signed_tx(&signed).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::UnsignedTransaction);
    let err = client.send_signed_tx_async(&signed).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::UnsignedTransaction);
    assert!(!client.provider().calls().contains(&"broadcast"));
    assert!(client.provider().broadcasts().is_empty());
}

#[tokio::test]
async fn rejected_broadcast_maps_result_code() {
    let f = fixture().await;
    let mut lcd = MockLcd::new(vec![account(&f.address, 12, 3, None)]);
    lcd.response = BroadcastResponse {
        txhash: "DEAD".into(),
        code: 5,
        height: 0,
        raw_log: "spendable balance 0uluna is smaller than 1000uluna".into(),
    };
    let client = client(lcd);

    let created = client
        .create_tx(
            CosmosCreateTxData {
                msgs: vec![send_from(&f.address)],
                fee: Some(Fee::new(200_000, vec![Coin::new(3000, "uluna")])),
                ..Default::default()
            },
            true,
        )
        .await
        .unwrap();
    let signed = match client.sign_tx(created, &f.signer).await.unwrap() {
        CosmosSignOutput::Tx(encoded) => encoded,
        other => panic!("unexpected {:?}", other),
    };

    let err = client.send_signed_tx(&signed).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ChainTransactionFailure);
    assert_eq!(err.message, "insufficient funds");
    assert_eq!(err.chain_code, Some(5));

    let err = client.send_signed_tx_async(&signed).await.unwrap_err();
    assert_eq!(err.message, "insufficient funds");
}

#[tokio::test]
async fn account_queries() {
    let f = fixture().await;
    let client = client(MockLcd::new(vec![account(&f.address, 12, 3, Some(f.public_key.clone()))]));

    let balance = client.get_balance(&f.address).await.unwrap();
    assert_eq!(balance.value, 1_000_000);
    assert_eq!(balance.decimals, 6);

    let state = client.get_account_state(&f.address).await.unwrap();
    assert_eq!(state.nonce, 3);
    assert_eq!(state.account_number, Some(12));
    assert_eq!(
        state.public_key,
        Some(STANDARD.encode(f.public_key.key_bytes().unwrap()))
    );

    let tx = client.get_tx("A1B2").await.unwrap();
    assert_eq!(tx.status, TxStatus::Success);
    assert_eq!(tx.block_number, 77);

    let query = serde_json::json!({"config": {}});
    assert_eq!(client.contract_query("terra1contract", &query).await.unwrap(), query);
}

#[tokio::test]
async fn sign_msg_uses_profile_digest() {
    let f = fixture().await;
    let client = client(MockLcd::new(Vec::new()));

    let signature = STANDARD.decode(client.sign_msg(b"login nonce 7", &f.signer).await.unwrap()).unwrap();
    let key = f.public_key.key_bytes().unwrap().to_vec();
    assert!(verify(&TERRA, b"login nonce 7", &signature, &key));
}

#[test]
fn create_account_from_mnemonic_and_key() {
    let client = client(MockLcd::new(Vec::new()));

    let generated = client.create_account(None).unwrap();
    assert!(generated.address.starts_with("terra1"));
    assert_eq!(generated.mnemonic.as_deref().map(|m| m.split_whitespace().count()), Some(24));

    let restored = client
        .create_account(generated.mnemonic.as_deref())
        .unwrap();
    assert_eq!(restored.address, generated.address);
    assert_eq!(restored.private_key, generated.private_key);

    let from_key = client.create_account(Some(generated.private_key.as_str())).unwrap();
    assert_eq!(from_key.address, generated.address);
    assert_eq!(from_key.mnemonic, None);

    let profile = CosmosChainProfile::for_chain(chainbridge_core::ChainType::Terra).unwrap();
    assert_eq!(profile.coin_type, 330);
}
