//! Account public keys
//!
//! Three encodings of the same key are needed: protobuf `Any` inside
//! transactions, proto-JSON (`{"@type", "key"}`) from LCD endpoints, and
//! Amino JSON inside legacy sign documents.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::{ChainBridgeError, ChainBridgeResult};

use super::proto::{Any, ProtoReader, ProtoWriter};

pub const SECP256K1_TYPE_URL: &str = "/cosmos.crypto.secp256k1.PubKey";
pub const ETH_SECP256K1_TYPE_URL: &str = "/ethermint.crypto.v1.ethsecp256k1.PubKey";
pub const MULTISIG_TYPE_URL: &str = "/cosmos.crypto.multisig.LegacyAminoPubKey";

const SECP256K1_AMINO: &str = "tendermint/PubKeySecp256k1";
const ETH_SECP256K1_AMINO: &str = "ethermint/PubKeyEthSecp256k1";
const MULTISIG_AMINO: &str = "tendermint/PubKeyMultisigThreshold";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountPublicKey {
    /// 33-byte compressed key
    Secp256k1(Vec<u8>),
    /// 33-byte compressed key with Ethereum-style address derivation
    EthSecp256k1(Vec<u8>),
    Multisig {
        threshold: u32,
        public_keys: Vec<AccountPublicKey>,
    },
    /// Key types this crate cannot sign for
    Other(Any),
}

impl AccountPublicKey {
    /// A single key that can sign on its own
    pub fn is_simple(&self) -> bool {
        matches!(self, Self::Secp256k1(_) | Self::EthSecp256k1(_))
    }

    pub fn type_url(&self) -> &str {
        match self {
            Self::Secp256k1(_) => SECP256K1_TYPE_URL,
            Self::EthSecp256k1(_) => ETH_SECP256K1_TYPE_URL,
            Self::Multisig { .. } => MULTISIG_TYPE_URL,
            Self::Other(any) => &any.type_url,
        }
    }

    pub fn key_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Secp256k1(key) | Self::EthSecp256k1(key) => Some(key),
            _ => None,
        }
    }

    pub fn to_any(&self) -> Any {
        match self {
            Self::Secp256k1(key) | Self::EthSecp256k1(key) => {
                Any::new(self.type_url(), ProtoWriter::new().bytes(1, key).finish())
            }
            Self::Multisig {
                threshold,
                public_keys,
            } => {
                let mut writer = ProtoWriter::new();
                writer.uint64(1, *threshold as u64);
                for key in public_keys {
                    writer.len_delimited(2, &key.to_any().encode());
                }
                Any::new(MULTISIG_TYPE_URL, writer.finish())
            }
            Self::Other(any) => any.clone(),
        }
    }

    pub fn from_any(any: &Any) -> ChainBridgeResult<Self> {
        match any.type_url.as_str() {
            SECP256K1_TYPE_URL | ETH_SECP256K1_TYPE_URL => {
                let mut key = Vec::new();
                let mut reader = ProtoReader::new(&any.value);
                while let Some((field, value)) = reader.next_field()? {
                    if field == 1 {
                        key = value.as_bytes(field)?.to_vec();
                    }
                }
                Ok(if any.type_url == SECP256K1_TYPE_URL {
                    Self::Secp256k1(key)
                } else {
                    Self::EthSecp256k1(key)
                })
            }
            MULTISIG_TYPE_URL => {
                let mut threshold = 0;
                let mut public_keys = Vec::new();
                let mut reader = ProtoReader::new(&any.value);
                while let Some((field, value)) = reader.next_field()? {
                    match field {
                        1 => threshold = value.as_u64(field)? as u32,
                        2 => public_keys.push(Self::from_any(&Any::decode(value.as_bytes(field)?)?)?),
                        _ => {}
                    }
                }
                Ok(Self::Multisig {
                    threshold,
                    public_keys,
                })
            }
            _ => Ok(Self::Other(any.clone())),
        }
    }

    /// Amino JSON form used inside legacy sign documents
    pub fn to_amino_json(&self) -> ChainBridgeResult<Value> {
        match self {
            Self::Secp256k1(key) => Ok(json!({"type": SECP256K1_AMINO, "value": STANDARD.encode(key)})),
            Self::EthSecp256k1(key) => {
                Ok(json!({"type": ETH_SECP256K1_AMINO, "value": STANDARD.encode(key)}))
            }
            Self::Multisig {
                threshold,
                public_keys,
            } => {
                let pubkeys = public_keys
                    .iter()
                    .map(Self::to_amino_json)
                    .collect::<ChainBridgeResult<Vec<_>>>()?;
                Ok(json!({
                    "type": MULTISIG_AMINO,
                    "value": {"threshold": threshold.to_string(), "pubkeys": pubkeys},
                }))
            }
            Self::Other(any) => Err(ChainBridgeError::decode(format!(
                "Public key type {} has no Amino encoding",
                any.type_url
            ))),
        }
    }

    /// Proto-JSON form as served by LCD endpoints
    pub fn to_json(&self) -> Value {
        match self {
            Self::Secp256k1(key) | Self::EthSecp256k1(key) => {
                json!({"@type": self.type_url(), "key": STANDARD.encode(key)})
            }
            Self::Multisig {
                threshold,
                public_keys,
            } => json!({
                "@type": MULTISIG_TYPE_URL,
                "threshold": threshold,
                "public_keys": public_keys.iter().map(Self::to_json).collect::<Vec<_>>(),
            }),
            Self::Other(any) => json!({"@type": any.type_url, "value": STANDARD.encode(&any.value)}),
        }
    }

    pub fn from_json(value: &Value) -> ChainBridgeResult<Self> {
        let type_url = value
            .get("@type")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainBridgeError::provider("Public key without @type"))?;

        match type_url {
            SECP256K1_TYPE_URL | ETH_SECP256K1_TYPE_URL => {
                let key = value
                    .get("key")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ChainBridgeError::provider("Public key without key bytes"))?;
                let key = STANDARD.decode(key)?;
                Ok(if type_url == SECP256K1_TYPE_URL {
                    Self::Secp256k1(key)
                } else {
                    Self::EthSecp256k1(key)
                })
            }
            MULTISIG_TYPE_URL => {
                let threshold = match value.get("threshold") {
                    Some(Value::Number(n)) => n.as_u64(),
                    Some(Value::String(s)) => s.parse().ok(),
                    _ => None,
                }
                .and_then(|t| u32::try_from(t).ok())
                .ok_or_else(|| ChainBridgeError::provider("Multisig key without threshold"))?;

                let public_keys = value
                    .get("public_keys")
                    .and_then(Value::as_array)
                    .map(|keys| {
                        keys.iter()
                            .map(Self::from_json)
                            .collect::<ChainBridgeResult<Vec<_>>>()
                    })
                    .transpose()?
                    .unwrap_or_default();

                Ok(Self::Multisig {
                    threshold,
                    public_keys,
                })
            }
            other => {
                let raw = match value.get("value").and_then(Value::as_str) {
                    Some(encoded) => STANDARD.decode(encoded)?,
                    None => Vec::new(),
                };
                Ok(Self::Other(Any::new(other, raw)))
            }
        }
    }
}

impl Serialize for AccountPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AccountPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}
