//! EVM transaction model and wire codec
//!
//! Supports legacy (EIP-155) and EIP-1559 (type 2) transactions.
//!
//! Unsigned transactions keep the signed shape with empty `r`/`s`:
//! - legacy: `[nonce, gasPrice, gas, to, value, data, chainId, 0x80, 0x80]`
//!   (the EIP-155 signing form)
//! - type 2: `0x02 || [chainId, nonce, maxPriority, maxFee, gas, to, value, data, accessList, 0x80, 0x80, 0x80]`
//!
//! so an unsigned payload decodes back to the same value.

use crate::error::{ChainBridgeError, ChainBridgeResult};
use crate::utils::crypto::{keccak256, parse_eth_address, strip_hex_prefix, to_checksum_address};

use super::recovery::RecoveredSignature;
use super::rlp::{self, RlpItem};
use super::types::{EvmCreateTxData, EvmTxType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListItem {
    pub address: [u8; 20],
    pub storage_keys: Vec<[u8; 32]>,
}

/// Signature as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmSignature {
    /// EIP-155 `v` for legacy, y-parity for typed transactions
    pub v: u64,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl EvmSignature {
    fn is_empty(&self) -> bool {
        self.r == [0u8; 32] && self.s == [0u8; 32]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmTransaction {
    pub tx_type: EvmTxType,
    /// Zero only for pre-EIP-155 legacy transactions
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: Option<[u8; 20]>,
    pub value: u128,
    pub data: Vec<u8>,
    pub access_list: Vec<AccessListItem>,
    pub signature: Option<EvmSignature>,
}

impl EvmTransaction {
    /// Build from a fully populated request (see `EvmClient::create_tx`)
    pub fn from_request(req: &EvmCreateTxData) -> ChainBridgeResult<Self> {
        let missing = |field: &str| {
            ChainBridgeError::invalid_input(format!(
                "Transaction field `{}` is not set; run create_tx first",
                field
            ))
        };

        let tx_type = req.tx_type.unwrap_or(if req.gas_price.is_some() {
            EvmTxType::Legacy
        } else {
            EvmTxType::Eip1559
        });

        let (gas_price, max_fee, max_priority) = match tx_type {
            EvmTxType::Legacy => (req.gas_price.ok_or_else(|| missing("gasPrice"))?, 0, 0),
            EvmTxType::Eip1559 => (
                0,
                req.max_fee_per_gas.ok_or_else(|| missing("maxFeePerGas"))?,
                req.max_priority_fee_per_gas
                    .ok_or_else(|| missing("maxPriorityFeePerGas"))?,
            ),
        };

        let data = match req.data.as_deref() {
            Some(hex_data) => hex::decode(strip_hex_prefix(hex_data)).map_err(|e| {
                ChainBridgeError::invalid_input(format!("Invalid call data: {}", e))
            })?,
            None => Vec::new(),
        };

        Ok(Self {
            tx_type,
            chain_id: req.chain_id.ok_or_else(|| missing("chainId"))?,
            nonce: req.nonce.ok_or_else(|| missing("nonce"))?,
            gas_price,
            max_priority_fee_per_gas: max_priority,
            max_fee_per_gas: max_fee,
            gas_limit: req.gas.ok_or_else(|| missing("gas"))?,
            to: req.to.as_deref().map(parse_eth_address).transpose()?,
            value: req.value,
            data,
            access_list: Vec::new(),
            signature: None,
        })
    }

    /// Inverse of `from_request`, dropping the signature
    pub fn to_request(&self) -> EvmCreateTxData {
        let legacy = self.tx_type == EvmTxType::Legacy;
        EvmCreateTxData {
            from: None,
            to: self.to.map(|to| to_checksum_address(&to)),
            value: self.value,
            data: (!self.data.is_empty()).then(|| format!("0x{}", hex::encode(&self.data))),
            nonce: Some(self.nonce),
            gas: Some(self.gas_limit),
            gas_price: legacy.then_some(self.gas_price),
            max_fee_per_gas: (!legacy).then_some(self.max_fee_per_gas),
            max_priority_fee_per_gas: (!legacy).then_some(self.max_priority_fee_per_gas),
            chain_id: Some(self.chain_id),
            tx_type: Some(self.tx_type),
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.signature, Some(sig) if !sig.is_empty())
    }

    /// Digest the sender signs
    pub fn signing_hash(&self) -> [u8; 32] {
        match self.tx_type {
            EvmTxType::Legacy => {
                let mut fields = self.legacy_fields();
                if self.chain_id > 0 {
                    fields.push(rlp::encode_u64(self.chain_id));
                    fields.push(rlp::encode_u64(0));
                    fields.push(rlp::encode_u64(0));
                }
                keccak256(&rlp::encode_list(&fields))
            }
            EvmTxType::Eip1559 => {
                let mut payload = vec![0x02];
                payload.extend(rlp::encode_list(&self.eip1559_fields()));
                keccak256(&payload)
            }
        }
    }

    /// Attach a recovered signature, encoding `v` for this transaction type
    pub fn apply_signature(&mut self, sig: &RecoveredSignature) -> ChainBridgeResult<()> {
        let parity = u64::from(sig.v.checked_sub(27).ok_or_else(|| {
            ChainBridgeError::crypto_error(format!("Recovery id {} is not 27 or 28", sig.v))
        })?);
        let v = match self.tx_type {
            EvmTxType::Legacy if self.chain_id > 0 => self
                .chain_id
                .checked_mul(2)
                .and_then(|doubled| doubled.checked_add(35 + parity))
                .ok_or_else(|| {
                    ChainBridgeError::invalid_input(format!(
                        "Chain id {} is too large for an EIP-155 signature",
                        self.chain_id
                    ))
                })?,
            EvmTxType::Legacy => u64::from(sig.v),
            EvmTxType::Eip1559 => parity,
        };
        self.signature = Some(EvmSignature { v, r: sig.r, s: sig.s });
        Ok(())
    }

    pub fn encode(&self) -> Vec<u8> {
        match self.tx_type {
            EvmTxType::Legacy => {
                let mut fields = self.legacy_fields();
                match self.signature.filter(|sig| !sig.is_empty()) {
                    Some(sig) => fields.extend(signature_fields(&sig)),
                    None => {
                        fields.push(rlp::encode_u64(self.chain_id));
                        fields.push(rlp::encode_bytes(&[]));
                        fields.push(rlp::encode_bytes(&[]));
                    }
                }
                rlp::encode_list(&fields)
            }
            EvmTxType::Eip1559 => {
                let mut fields = self.eip1559_fields();
                match self.signature.filter(|sig| !sig.is_empty()) {
                    Some(sig) => fields.extend(signature_fields(&sig)),
                    None => fields.extend([vec![0x80], vec![0x80], vec![0x80]]),
                }
                let mut out = vec![0x02];
                out.extend(rlp::encode_list(&fields));
                out
            }
        }
    }

    pub fn encode_hex(&self) -> String {
        format!("0x{}", hex::encode(self.encode()))
    }

    /// Transaction hash as reported by nodes (only meaningful once signed)
    pub fn tx_hash(&self) -> String {
        format!("0x{}", hex::encode(keccak256(&self.encode())))
    }

    pub fn decode(bytes: &[u8]) -> ChainBridgeResult<Self> {
        match bytes.first() {
            None => Err(ChainBridgeError::decode("Empty transaction payload")),
            Some(b) if *b >= 0xc0 => Self::decode_legacy(bytes),
            Some(0x02) => Self::decode_eip1559(&bytes[1..]),
            Some(other) => Err(ChainBridgeError::decode(format!(
                "Unsupported transaction type 0x{:02x}",
                other
            ))),
        }
    }

    pub fn decode_hex(encoded: &str) -> ChainBridgeResult<Self> {
        let bytes = hex::decode(strip_hex_prefix(encoded.trim()))?;
        Self::decode(&bytes)
    }

    fn decode_legacy(bytes: &[u8]) -> ChainBridgeResult<Self> {
        let item = rlp::decode(bytes)?;
        let fields = item.as_list()?;
        if fields.len() != 6 && fields.len() != 9 {
            return Err(ChainBridgeError::decode(format!(
                "Legacy transaction must have 6 or 9 fields, found {}",
                fields.len()
            )));
        }

        let mut tx = Self {
            tx_type: EvmTxType::Legacy,
            chain_id: 0,
            nonce: fields[0].as_u64()?,
            gas_price: fields[1].as_u128()?,
            max_priority_fee_per_gas: 0,
            max_fee_per_gas: 0,
            gas_limit: fields[2].as_u64()?,
            to: fields[3].as_address()?,
            value: fields[4].as_u128()?,
            data: fields[5].as_bytes()?.to_vec(),
            access_list: Vec::new(),
            signature: None,
        };

        if fields.len() == 9 {
            let v = fields[6].as_u64()?;
            let sig = EvmSignature {
                v,
                r: fields[7].as_word()?,
                s: fields[8].as_word()?,
            };
            if sig.is_empty() {
                tx.chain_id = v;
            } else {
                tx.chain_id = match v {
                    27 | 28 => 0,
                    v if v >= 35 => (v - 35) / 2,
                    v => {
                        return Err(ChainBridgeError::decode(format!("Invalid legacy v value {}", v)))
                    }
                };
                tx.signature = Some(sig);
            }
        }

        Ok(tx)
    }

    fn decode_eip1559(bytes: &[u8]) -> ChainBridgeResult<Self> {
        let item = rlp::decode(bytes)?;
        let fields = item.as_list()?;
        if fields.len() != 9 && fields.len() != 12 {
            return Err(ChainBridgeError::decode(format!(
                "EIP-1559 transaction must have 9 or 12 fields, found {}",
                fields.len()
            )));
        }

        let signature = if fields.len() == 12 {
            let sig = EvmSignature {
                v: fields[9].as_u64()?,
                r: fields[10].as_word()?,
                s: fields[11].as_word()?,
            };
            if sig.v > 1 {
                return Err(ChainBridgeError::decode(format!("Invalid y-parity {}", sig.v)));
            }
            (!sig.is_empty()).then_some(sig)
        } else {
            None
        };

        Ok(Self {
            tx_type: EvmTxType::Eip1559,
            chain_id: fields[0].as_u64()?,
            nonce: fields[1].as_u64()?,
            gas_price: 0,
            max_priority_fee_per_gas: fields[2].as_u128()?,
            max_fee_per_gas: fields[3].as_u128()?,
            gas_limit: fields[4].as_u64()?,
            to: fields[5].as_address()?,
            value: fields[6].as_u128()?,
            data: fields[7].as_bytes()?.to_vec(),
            access_list: decode_access_list(&fields[8])?,
            signature,
        })
    }

    fn legacy_fields(&self) -> Vec<Vec<u8>> {
        vec![
            rlp::encode_u64(self.nonce),
            rlp::encode_u128(self.gas_price),
            rlp::encode_u64(self.gas_limit),
            rlp::encode_address(self.to.as_ref()),
            rlp::encode_u128(self.value),
            rlp::encode_bytes(&self.data),
        ]
    }

    fn eip1559_fields(&self) -> Vec<Vec<u8>> {
        vec![
            rlp::encode_u64(self.chain_id),
            rlp::encode_u64(self.nonce),
            rlp::encode_u128(self.max_priority_fee_per_gas),
            rlp::encode_u128(self.max_fee_per_gas),
            rlp::encode_u64(self.gas_limit),
            rlp::encode_address(self.to.as_ref()),
            rlp::encode_u128(self.value),
            rlp::encode_bytes(&self.data),
            encode_access_list(&self.access_list),
        ]
    }
}

fn signature_fields(sig: &EvmSignature) -> [Vec<u8>; 3] {
    [
        rlp::encode_u64(sig.v),
        rlp::encode_bytes(trim_leading_zeros(&sig.r)),
        rlp::encode_bytes(trim_leading_zeros(&sig.s)),
    ]
}

fn trim_leading_zeros(word: &[u8; 32]) -> &[u8] {
    let start = word.iter().take_while(|&&b| b == 0).count();
    &word[start..]
}

fn encode_access_list(list: &[AccessListItem]) -> Vec<u8> {
    let items: Vec<Vec<u8>> = list
        .iter()
        .map(|entry| {
            let keys: Vec<Vec<u8>> = entry.storage_keys.iter().map(|k| rlp::encode_bytes(k)).collect();
            rlp::encode_list(&[rlp::encode_bytes(&entry.address), rlp::encode_list(&keys)])
        })
        .collect();
    rlp::encode_list(&items)
}

fn decode_access_list(item: &RlpItem) -> ChainBridgeResult<Vec<AccessListItem>> {
    item.as_list()?
        .iter()
        .map(|entry| {
            let pair = entry.as_list()?;
            if pair.len() != 2 {
                return Err(ChainBridgeError::decode("Access list entry must have 2 fields"));
            }
            let address = pair[0]
                .as_address()?
                .ok_or_else(|| ChainBridgeError::decode("Access list entry without address"))?;
            let storage_keys = pair[1]
                .as_list()?
                .iter()
                .map(|key| key.as_word().map_err(ChainBridgeError::from))
                .collect::<ChainBridgeResult<Vec<_>>>()?;
            Ok(AccessListItem { address, storage_keys })
        })
        .collect()
}
