//! Transaction messages
//!
//! `MsgSend` and `MsgExecuteContract` are understood natively (protobuf,
//! Amino JSON and proto-JSON). Anything else is carried as an opaque `Any`:
//! it can be broadcast with direct signing but not Amino-signed.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::{ChainBridgeError, ChainBridgeResult};

use super::proto::{Any, ProtoReader, ProtoWriter};
use super::types::Coin;

pub const MSG_SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";
pub const MSG_EXECUTE_CONTRACT_TYPE_URL: &str = "/cosmwasm.wasm.v1.MsgExecuteContract";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSend {
    pub from_address: String,
    pub to_address: String,
    pub amount: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgExecuteContract {
    pub sender: String,
    pub contract: String,
    /// Contract message as JSON
    pub msg: Value,
    #[serde(default)]
    pub funds: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    Send(MsgSend),
    ExecuteContract(MsgExecuteContract),
    Other(Any),
}

fn encode_coin(coin: &Coin) -> Vec<u8> {
    ProtoWriter::new()
        .string(1, &coin.denom)
        .string(2, &coin.amount.to_string())
        .finish()
}

fn decode_coin(bytes: &[u8]) -> ChainBridgeResult<Coin> {
    let mut coin = Coin::new(0, "");
    let mut reader = ProtoReader::new(bytes);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => coin.denom = value.as_string(field)?,
            2 => {
                let amount = value.as_string(field)?;
                coin.amount = amount
                    .parse()
                    .map_err(|_| ChainBridgeError::decode(format!("Invalid coin amount {:?}", amount)))?;
            }
            _ => {}
        }
    }
    Ok(coin)
}

pub(crate) fn encode_coins(writer: &mut ProtoWriter, field: u32, coins: &[Coin]) {
    for coin in coins {
        writer.len_delimited(field, &encode_coin(coin));
    }
}

pub(crate) fn decode_coin_field(value: &[u8], coins: &mut Vec<Coin>) -> ChainBridgeResult<()> {
    coins.push(decode_coin(value)?);
    Ok(())
}

/// Amino JSON coins: `[{"amount": "1", "denom": "uluna"}]`
pub(crate) fn coins_to_amino(coins: &[Coin]) -> Value {
    Value::Array(
        coins
            .iter()
            .map(|c| json!({"amount": c.amount.to_string(), "denom": c.denom}))
            .collect(),
    )
}

impl Msg {
    pub fn type_url(&self) -> &str {
        match self {
            Self::Send(_) => MSG_SEND_TYPE_URL,
            Self::ExecuteContract(_) => MSG_EXECUTE_CONTRACT_TYPE_URL,
            Self::Other(any) => &any.type_url,
        }
    }

    /// Addresses that must sign this message, when known
    pub fn signer_address(&self) -> Option<&str> {
        match self {
            Self::Send(msg) => Some(&msg.from_address),
            Self::ExecuteContract(msg) => Some(&msg.sender),
            Self::Other(_) => None,
        }
    }

    pub fn to_any(&self) -> ChainBridgeResult<Any> {
        let value = match self {
            Self::Send(msg) => {
                let mut writer = ProtoWriter::new();
                writer.string(1, &msg.from_address).string(2, &msg.to_address);
                encode_coins(&mut writer, 3, &msg.amount);
                writer.finish()
            }
            Self::ExecuteContract(msg) => {
                let mut writer = ProtoWriter::new();
                writer
                    .string(1, &msg.sender)
                    .string(2, &msg.contract)
                    .bytes(3, &serde_json::to_vec(&msg.msg)?);
                encode_coins(&mut writer, 5, &msg.funds);
                writer.finish()
            }
            Self::Other(any) => return Ok(any.clone()),
        };
        Ok(Any::new(self.type_url(), value))
    }

    pub fn from_any(any: &Any) -> ChainBridgeResult<Self> {
        let mut reader = ProtoReader::new(&any.value);
        match any.type_url.as_str() {
            MSG_SEND_TYPE_URL => {
                let mut msg = MsgSend {
                    from_address: String::new(),
                    to_address: String::new(),
                    amount: Vec::new(),
                };
                while let Some((field, value)) = reader.next_field()? {
                    match field {
                        1 => msg.from_address = value.as_string(field)?,
                        2 => msg.to_address = value.as_string(field)?,
                        3 => decode_coin_field(value.as_bytes(field)?, &mut msg.amount)?,
                        _ => {}
                    }
                }
                Ok(Self::Send(msg))
            }
            MSG_EXECUTE_CONTRACT_TYPE_URL => {
                let mut msg = MsgExecuteContract {
                    sender: String::new(),
                    contract: String::new(),
                    msg: Value::Null,
                    funds: Vec::new(),
                };
                while let Some((field, value)) = reader.next_field()? {
                    match field {
                        1 => msg.sender = value.as_string(field)?,
                        2 => msg.contract = value.as_string(field)?,
                        3 => {
                            msg.msg = serde_json::from_slice(value.as_bytes(field)?).map_err(|e| {
                                ChainBridgeError::decode(format!("Contract message is not JSON: {}", e))
                            })?
                        }
                        5 => decode_coin_field(value.as_bytes(field)?, &mut msg.funds)?,
                        _ => {}
                    }
                }
                Ok(Self::ExecuteContract(msg))
            }
            _ => Ok(Self::Other(any.clone())),
        }
    }

    /// `{"type", "value"}` entry of an Amino sign document
    pub fn to_amino_json(&self) -> ChainBridgeResult<Value> {
        match self {
            Self::Send(msg) => Ok(json!({
                "type": "cosmos-sdk/MsgSend",
                "value": {
                    "from_address": msg.from_address,
                    "to_address": msg.to_address,
                    "amount": coins_to_amino(&msg.amount),
                },
            })),
            Self::ExecuteContract(msg) => Ok(json!({
                "type": "wasm/MsgExecuteContract",
                "value": {
                    "sender": msg.sender,
                    "contract": msg.contract,
                    "msg": msg.msg,
                    "funds": coins_to_amino(&msg.funds),
                },
            })),
            Self::Other(any) => Err(ChainBridgeError::decode(format!(
                "Message {} has no Amino encoding",
                any.type_url
            ))),
        }
    }

    /// Proto-JSON with an `@type` discriminant
    pub fn to_json(&self) -> ChainBridgeResult<Value> {
        let mut value = match self {
            Self::Send(msg) => serde_json::to_value(msg)?,
            Self::ExecuteContract(msg) => serde_json::to_value(msg)?,
            Self::Other(any) => json!({"value": STANDARD.encode(&any.value)}),
        };
        if let Value::Object(map) = &mut value {
            map.insert("@type".to_string(), Value::String(self.type_url().to_string()));
        }
        Ok(value)
    }

    pub fn from_json(value: &Value) -> ChainBridgeResult<Self> {
        let type_url = value
            .get("@type")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainBridgeError::invalid_input("Message without @type"))?;

        match type_url {
            MSG_SEND_TYPE_URL => Ok(Self::Send(serde_json::from_value(value.clone())?)),
            MSG_EXECUTE_CONTRACT_TYPE_URL => {
                Ok(Self::ExecuteContract(serde_json::from_value(value.clone())?))
            }
            other => {
                let raw = value
                    .get("value")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ChainBridgeError::invalid_input(format!(
                            "Message {} must carry base64 protobuf `value`",
                            other
                        ))
                    })?;
                Ok(Self::Other(Any::new(other, STANDARD.decode(raw)?)))
            }
        }
    }
}

impl Serialize for Msg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Msg {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send() -> Msg {
        Msg::Send(MsgSend {
            from_address: "terra1sender".into(),
            to_address: "terra1receiver".into(),
            amount: vec![Coin::new(1_000_000, "uluna")],
        })
    }

    fn execute() -> Msg {
        Msg::ExecuteContract(MsgExecuteContract {
            sender: "xpla1sender".into(),
            contract: "xpla1contract".into(),
            msg: json!({"transfer": {"recipient": "xpla1receiver", "amount": "10"}}),
            funds: vec![],
        })
    }

    #[test]
    fn test_any_round_trip() {
        for msg in [send(), execute()] {
            assert_eq!(Msg::from_any(&msg.to_any().unwrap()).unwrap(), msg);
        }
    }

    #[test]
    fn test_json_round_trip() {
        let json = serde_json::to_value(send()).unwrap();
        assert_eq!(json["@type"], MSG_SEND_TYPE_URL);
        assert_eq!(json["amount"][0]["amount"], "1000000");
        assert_eq!(serde_json::from_value::<Msg>(json).unwrap(), send());
    }

    #[test]
    fn test_amino_json() {
        let amino = send().to_amino_json().unwrap();
        assert_eq!(amino["type"], "cosmos-sdk/MsgSend");
        assert_eq!(amino["value"]["amount"][0]["denom"], "uluna");

        let other = Msg::Other(Any::new("/ibc.applications.transfer.v1.MsgTransfer", vec![]));
        assert!(other.to_amino_json().is_err());
        assert_eq!(other.signer_address(), None);
    }
}
