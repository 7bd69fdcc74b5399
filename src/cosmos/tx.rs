//! Cosmos SDK transaction model and `TxRaw`-compatible encoding
//!
//! The encoded transaction is `Tx { body, auth_info, signatures }` with body
//! and auth info written as embedded messages, which is byte-identical to
//! `TxRaw` for canonically encoded bodies.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{ChainBridgeError, ChainBridgeResult};
use crate::utils::crypto::sha256;

use super::msgs::{decode_coin_field, encode_coins, Msg};
use super::proto::{Any, ProtoReader, ProtoWriter};
use super::pubkey::AccountPublicKey;
use super::types::Fee;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMode {
    Direct,
    LegacyAminoJson,
    Other(u64),
}

impl SignMode {
    pub fn as_u64(&self) -> u64 {
        match self {
            Self::Direct => 1,
            Self::LegacyAminoJson => 127,
            Self::Other(mode) => *mode,
        }
    }

    pub fn from_u64(mode: u64) -> Self {
        match mode {
            1 => Self::Direct,
            127 => Self::LegacyAminoJson,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeInfo {
    Single(SignMode),
    /// Multisig mode info, kept encoded
    Multi(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerInfo {
    pub public_key: Option<AccountPublicKey>,
    pub mode_info: ModeInfo,
    pub sequence: u64,
}

impl SignerInfo {
    pub fn new(public_key: Option<AccountPublicKey>, mode: SignMode, sequence: u64) -> Self {
        Self {
            public_key,
            mode_info: ModeInfo::Single(mode),
            sequence,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mode_info = match &self.mode_info {
            ModeInfo::Single(mode) => {
                let single = ProtoWriter::new().uint64(1, mode.as_u64()).finish();
                ProtoWriter::new().len_delimited(1, &single).finish()
            }
            ModeInfo::Multi(raw) => ProtoWriter::new().len_delimited(2, raw).finish(),
        };

        let mut writer = ProtoWriter::new();
        if let Some(public_key) = &self.public_key {
            writer.len_delimited(1, &public_key.to_any().encode());
        }
        writer.len_delimited(2, &mode_info).uint64(3, self.sequence);
        writer.finish()
    }

    fn decode(bytes: &[u8]) -> ChainBridgeResult<Self> {
        let mut info = SignerInfo::new(None, SignMode::Other(0), 0);
        let mut reader = ProtoReader::new(bytes);
        while let Some((field, value)) = reader.next_field()? {
            match field {
                1 => {
                    let any = Any::decode(value.as_bytes(field)?)?;
                    info.public_key = Some(AccountPublicKey::from_any(&any)?);
                }
                2 => info.mode_info = decode_mode_info(value.as_bytes(field)?)?,
                3 => info.sequence = value.as_u64(field)?,
                _ => {}
            }
        }
        Ok(info)
    }
}

fn decode_mode_info(bytes: &[u8]) -> ChainBridgeResult<ModeInfo> {
    let mut mode_info = ModeInfo::Single(SignMode::Other(0));
    let mut reader = ProtoReader::new(bytes);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => {
                let mut single = ProtoReader::new(value.as_bytes(field)?);
                let mut mode = 0;
                while let Some((f, v)) = single.next_field()? {
                    if f == 1 {
                        mode = v.as_u64(f)?;
                    }
                }
                mode_info = ModeInfo::Single(SignMode::from_u64(mode));
            }
            2 => mode_info = ModeInfo::Multi(value.as_bytes(field)?.to_vec()),
            _ => {}
        }
    }
    Ok(mode_info)
}

fn encode_fee(fee: &Fee) -> Vec<u8> {
    let mut writer = ProtoWriter::new();
    encode_coins(&mut writer, 1, &fee.amount);
    writer
        .uint64(2, fee.gas_limit)
        .string(3, &fee.payer)
        .string(4, &fee.granter);
    writer.finish()
}

fn decode_fee(bytes: &[u8]) -> ChainBridgeResult<Fee> {
    let mut fee = Fee::default();
    let mut reader = ProtoReader::new(bytes);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => decode_coin_field(value.as_bytes(field)?, &mut fee.amount)?,
            2 => fee.gas_limit = value.as_u64(field)?,
            3 => fee.payer = value.as_string(field)?,
            4 => fee.granter = value.as_string(field)?,
            _ => {}
        }
    }
    Ok(fee)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxBody {
    pub messages: Vec<Msg>,
    pub memo: String,
    pub timeout_height: u64,
}

impl TxBody {
    pub fn encode(&self) -> ChainBridgeResult<Vec<u8>> {
        let mut writer = ProtoWriter::new();
        for msg in &self.messages {
            writer.len_delimited(1, &msg.to_any()?.encode());
        }
        writer.string(2, &self.memo).uint64(3, self.timeout_height);
        Ok(writer.finish())
    }

    pub fn decode(bytes: &[u8]) -> ChainBridgeResult<Self> {
        let mut body = TxBody::default();
        let mut reader = ProtoReader::new(bytes);
        while let Some((field, value)) = reader.next_field()? {
            match field {
                1 => body.messages.push(Msg::from_any(&Any::decode(value.as_bytes(field)?)?)?),
                2 => body.memo = value.as_string(field)?,
                3 => body.timeout_height = value.as_u64(field)?,
                _ => {}
            }
        }
        Ok(body)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthInfo {
    pub signer_infos: Vec<SignerInfo>,
    pub fee: Fee,
}

impl AuthInfo {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = ProtoWriter::new();
        for info in &self.signer_infos {
            writer.len_delimited(1, &info.encode());
        }
        writer.len_delimited(2, &encode_fee(&self.fee));
        writer.finish()
    }

    pub fn decode(bytes: &[u8]) -> ChainBridgeResult<Self> {
        let mut auth_info = AuthInfo::default();
        let mut reader = ProtoReader::new(bytes);
        while let Some((field, value)) = reader.next_field()? {
            match field {
                1 => auth_info.signer_infos.push(SignerInfo::decode(value.as_bytes(field)?)?),
                2 => auth_info.fee = decode_fee(value.as_bytes(field)?)?,
                _ => {}
            }
        }
        Ok(auth_info)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tx {
    pub body: TxBody,
    pub auth_info: AuthInfo,
    pub signatures: Vec<Vec<u8>>,
}

impl Tx {
    pub fn encode(&self) -> ChainBridgeResult<Vec<u8>> {
        let mut writer = ProtoWriter::new();
        writer
            .len_delimited(1, &self.body.encode()?)
            .len_delimited(2, &self.auth_info.encode());
        for signature in &self.signatures {
            writer.len_delimited(3, signature);
        }
        Ok(writer.finish())
    }

    pub fn decode(bytes: &[u8]) -> ChainBridgeResult<Self> {
        let mut tx = Tx::default();
        let mut reader = ProtoReader::new(bytes);
        while let Some((field, value)) = reader.next_field()? {
            match field {
                1 => tx.body = TxBody::decode(value.as_bytes(field)?)?,
                2 => tx.auth_info = AuthInfo::decode(value.as_bytes(field)?)?,
                3 => tx.signatures.push(value.as_bytes(field)?.to_vec()),
                _ => {}
            }
        }
        Ok(tx)
    }

    pub fn to_base64(&self) -> ChainBridgeResult<String> {
        Ok(STANDARD.encode(self.encode()?))
    }

    pub fn from_base64(encoded: &str) -> ChainBridgeResult<Self> {
        let bytes = STANDARD.decode(encoded.trim())?;
        if bytes.is_empty() {
            return Err(ChainBridgeError::decode("Empty transaction payload"));
        }
        Self::decode(&bytes)
    }

    /// Signed slots precede placeholder slots
    pub fn placeholder_infos(&self) -> &[SignerInfo] {
        self.auth_info
            .signer_infos
            .get(self.signatures.len()..)
            .unwrap_or(&[])
    }

    /// True when every signer slot carries a non-empty signature
    pub fn is_fully_signed(&self) -> bool {
        !self.signatures.is_empty()
            && self.signatures.iter().all(|sig| !sig.is_empty())
            && self.placeholder_infos().is_empty()
    }

    /// Upper-case hex SHA-256 of the encoded transaction
    pub fn hash(&self) -> ChainBridgeResult<String> {
        Ok(hex::encode_upper(sha256(&self.encode()?)))
    }
}
