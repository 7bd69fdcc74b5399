//! Legacy Amino JSON sign documents
//!
//! The signed bytes are the `StdSignDoc` serialized as compact JSON with
//! sorted keys, where `<`, `>` and `&` are escaped the way Go's
//! `encoding/json` escapes them.

use serde_json::{json, Value};

use crate::error::ChainBridgeResult;

use super::msgs::coins_to_amino;
use super::tx::Tx;

pub struct SignDocParams<'a> {
    pub chain_id: &'a str,
    pub account_number: u64,
    pub sequence: u64,
}

/// Build the `StdSignDoc` for `tx`; every message must have an Amino form
pub fn std_sign_doc(tx: &Tx, params: &SignDocParams<'_>) -> ChainBridgeResult<Value> {
    let fee = &tx.auth_info.fee;
    let mut amino_fee = json!({
        "amount": coins_to_amino(&fee.amount),
        "gas": fee.gas_limit.to_string(),
    });
    if !fee.payer.is_empty() {
        amino_fee["payer"] = Value::String(fee.payer.clone());
    }
    if !fee.granter.is_empty() {
        amino_fee["granter"] = Value::String(fee.granter.clone());
    }

    let msgs = tx
        .body
        .messages
        .iter()
        .map(|msg| msg.to_amino_json())
        .collect::<ChainBridgeResult<Vec<_>>>()?;

    let mut doc = json!({
        "account_number": params.account_number.to_string(),
        "chain_id": params.chain_id,
        "fee": amino_fee,
        "memo": tx.body.memo,
        "msgs": msgs,
        "sequence": params.sequence.to_string(),
    });
    if tx.body.timeout_height > 0 {
        doc["timeout_height"] = Value::String(tx.body.timeout_height.to_string());
    }
    Ok(doc)
}

pub fn sign_doc_bytes(tx: &Tx, params: &SignDocParams<'_>) -> ChainBridgeResult<Vec<u8>> {
    Ok(canonical_json_bytes(&std_sign_doc(tx, params)?))
}

/// Serialize JSON canonically (sorted keys, no whitespace)
pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    serialize_canonical(value, &mut out);
    out
}

fn serialize_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            '<' => out.extend_from_slice(b"\\u003c"),
            '>' => out.extend_from_slice(b"\\u003e"),
            '&' => out.extend_from_slice(b"\\u0026"),
            c if c.is_control() => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

fn serialize_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => serialize_string(s, out),
        Value::Array(arr) => {
            out.push(b'[');
            for (i, v) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serialize_canonical(v, out);
            }
            out.push(b']');
        }
        Value::Object(obj) => {
            out.push(b'{');
            let mut keys: Vec<_> = obj.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serialize_string(key, out);
                out.push(b':');
                serialize_canonical(&obj[*key], out);
            }
            out.push(b'}');
        }
    }
}
