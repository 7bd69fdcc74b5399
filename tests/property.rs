use chainbridge_core::cosmos::amino::canonical_json_bytes;
use chainbridge_core::cosmos::provider::compute_fee;
use chainbridge_core::cosmos::{
    AccountPublicKey, AuthInfo, Coin, DecCoin, Fee, Msg, MsgSend, SignMode, SignerInfo, Tx, TxBody,
};
use chainbridge_core::evm::types::{EvmCreateTxData, EvmTxType};
use chainbridge_core::evm::{recover_signature, EvmTransaction};
use chainbridge_core::utils::crypto::{public_key_hash, to_checksum_address};
use proptest::prelude::*;
use secp256k1::{Message, Secp256k1, SecretKey};

fn any_secret_key() -> impl Strategy<Value = SecretKey> {
    prop::array::uniform32(any::<u8>()).prop_filter_map("valid secp256k1 scalar", |bytes| {
        SecretKey::from_slice(&bytes).ok()
    })
}

fn any_request() -> impl Strategy<Value = EvmCreateTxData> {
    (
        any::<bool>(),
        any::<u64>(),
        1u64..=u32::MAX as u64,
        21_000u64..30_000_000,
        any::<u64>(),
        proptest::option::of(prop::array::uniform20(any::<u8>())),
        any::<u128>(),
        prop::collection::vec(any::<u8>(), 0..64),
    )
        .prop_map(|(legacy, nonce, chain_id, gas, price, to, value, data)| EvmCreateTxData {
            from: None,
            to: to.map(|to| to_checksum_address(&to)),
            value,
            data: (!data.is_empty()).then(|| format!("0x{}", hex::encode(&data))),
            nonce: Some(nonce),
            gas: Some(gas),
            gas_price: legacy.then_some(price as u128),
            max_fee_per_gas: (!legacy).then_some(price as u128 * 2),
            max_priority_fee_per_gas: (!legacy).then_some(price as u128 / 3),
            chain_id: Some(chain_id),
            tx_type: Some(if legacy { EvmTxType::Legacy } else { EvmTxType::Eip1559 }),
        })
}

proptest! {
    #[test]
    fn exactly_one_recovery_id_matches(secret in any_secret_key(), digest in prop::array::uniform32(any::<u8>())) {
        let secp = Secp256k1::new();
        let public = secret.public_key(&secp).serialize_uncompressed();
        let expected = public_key_hash(&public).unwrap();
        let signature = secp
            .sign_ecdsa(&Message::from_digest(digest), &secret)
            .serialize_compact();

        let recovered = recover_signature(&digest, &expected, &signature).unwrap();
        prop_assert!(recovered.v == 27 || recovered.v == 28);
        prop_assert_eq!(&recovered.r[..], &signature[..32]);
        prop_assert_eq!(&recovered.s[..], &signature[32..]);

        // a different key never matches
        let other = SecretKey::from_slice(&[0x11; 32]).unwrap();
        if other != secret {
            let other_hash = public_key_hash(&other.public_key(&secp).serialize_uncompressed()).unwrap();
            prop_assert!(recover_signature(&digest, &other_hash, &signature).is_err());
        }
    }

    #[test]
    fn evm_transactions_survive_the_wire(request in any_request(), secret in any_secret_key()) {
        let unsigned = EvmTransaction::from_request(&request).unwrap();
        prop_assert_eq!(EvmTransaction::decode(&unsigned.encode()).unwrap(), unsigned.clone());
        prop_assert!(!unsigned.is_signed());

        let secp = Secp256k1::new();
        let digest = unsigned.signing_hash();
        let expected = public_key_hash(&secret.public_key(&secp).serialize_uncompressed()).unwrap();
        let signature = secp
            .sign_ecdsa(&Message::from_digest(digest), &secret)
            .serialize_compact();
        let recovered = recover_signature(&digest, &expected, &signature).unwrap();

        let mut signed = unsigned;
        signed.apply_signature(&recovered).unwrap();
        let decoded = EvmTransaction::decode_hex(&signed.encode_hex()).unwrap();
        prop_assert!(decoded.is_signed());
        prop_assert_eq!(decoded.signing_hash(), digest);
        prop_assert_eq!(decoded, signed);
    }

    #[test]
    fn cosmos_transactions_survive_the_wire(
        memo in "[ -~]{0,40}",
        amount in any::<u128>(),
        gas in any::<u64>(),
        sequence in any::<u64>(),
        timeout_height in any::<u64>(),
        key in prop::array::uniform32(any::<u8>()),
        signatures in prop::collection::vec(prop::collection::vec(any::<u8>(), 64), 0..3),
    ) {
        let mut compressed = vec![0x02];
        compressed.extend_from_slice(&key);

        let tx = Tx {
            body: TxBody {
                messages: vec![Msg::Send(MsgSend {
                    from_address: "terra1from".into(),
                    to_address: "terra1to".into(),
                    amount: vec![Coin::new(amount, "uluna")],
                })],
                memo,
                timeout_height,
            },
            auth_info: AuthInfo {
                signer_infos: vec![SignerInfo::new(
                    Some(AccountPublicKey::Secp256k1(compressed)),
                    SignMode::LegacyAminoJson,
                    sequence,
                )],
                fee: Fee::new(gas, vec![Coin::new(amount / 2, "uluna")]),
            },
            signatures,
        };

        let decoded = Tx::from_base64(&tx.to_base64().unwrap()).unwrap();
        prop_assert_eq!(decoded, tx);
    }

    #[test]
    fn canonical_json_is_stable_and_escaped(memo in "[ -~]{0,40}", n in any::<u64>()) {
        let value = serde_json::json!({"z": n.to_string(), "memo": memo, "a": [1, 2]});
        let bytes = canonical_json_bytes(&value);
        let text = String::from_utf8(bytes.clone()).unwrap();

        prop_assert!(!text.contains('<') && !text.contains('>') && !text.contains('&'));
        prop_assert!(text.starts_with("{\"a\":"), "canonical JSON must start with the \"a\" key: {}", text);
        let reparsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        prop_assert_eq!(canonical_json_bytes(&reparsed), bytes);
    }

    #[test]
    fn adjusted_gas_never_undershoots(gas_used in 1u64..10_000_000, adjustment in 1.0f64..3.0) {
        let fee = compute_fee(gas_used, &[DecCoin::new("0.015", "uluna")], adjustment, None).unwrap();
        prop_assert!(fee.gas_limit as f64 >= gas_used as f64 * adjustment);
        prop_assert!(fee.amount[0].amount * 1000 >= fee.gas_limit as u128 * 15);
    }
}
