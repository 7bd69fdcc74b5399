//! Minimal protobuf wire codec
//!
//! Enough of the protobuf encoding to write and read the Cosmos SDK
//! transaction messages field by field. Fields are written in ascending
//! field-number order, which is what the SDK's canonical encoding uses.

use thiserror::Error;

use crate::error::ChainBridgeError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtoError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("varint longer than 10 bytes")]
    VarintOverflow,
    #[error("unsupported wire type {0}")]
    UnsupportedWireType(u8),
    #[error("field {field} has wire type {found}, expected {expected}")]
    WrongWireType { field: u32, expected: &'static str, found: &'static str },
    #[error("field {0} is not valid UTF-8")]
    InvalidUtf8(u32),
    #[error("missing required field {0}")]
    MissingField(&'static str),
}

pub type ProtoResult<T> = Result<T, ProtoError>;

impl From<ProtoError> for ChainBridgeError {
    fn from(e: ProtoError) -> Self {
        ChainBridgeError::decode(format!("Protobuf decode failed: {}", e))
    }
}

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

/// Encode varint (protobuf base 128 varint)
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn encode_key(field: u32, wire_type: u8, buf: &mut Vec<u8>) {
    encode_varint(((field as u64) << 3) | wire_type as u64, buf);
}

#[derive(Debug, Default)]
pub struct ProtoWriter {
    buf: Vec<u8>,
}

impl ProtoWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scalar field, omitted when zero (proto3 default)
    pub fn uint64(&mut self, field: u32, value: u64) -> &mut Self {
        if value != 0 {
            encode_key(field, WIRE_VARINT, &mut self.buf);
            encode_varint(value, &mut self.buf);
        }
        self
    }

    /// Singular bytes field, omitted when empty
    pub fn bytes(&mut self, field: u32, value: &[u8]) -> &mut Self {
        if !value.is_empty() {
            self.len_delimited(field, value);
        }
        self
    }

    pub fn string(&mut self, field: u32, value: &str) -> &mut Self {
        self.bytes(field, value.as_bytes())
    }

    /// Embedded message or repeated element, always written
    pub fn len_delimited(&mut self, field: u32, value: &[u8]) -> &mut Self {
        encode_key(field, WIRE_LEN, &mut self.buf);
        encode_varint(value.len() as u64, &mut self.buf);
        self.buf.extend_from_slice(value);
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Varint(u64),
    Fixed64(u64),
    Bytes(&'a [u8]),
    Fixed32(u32),
}

impl<'a> FieldValue<'a> {
    fn wire_name(&self) -> &'static str {
        match self {
            Self::Varint(_) => "varint",
            Self::Fixed64(_) => "fixed64",
            Self::Bytes(_) => "length-delimited",
            Self::Fixed32(_) => "fixed32",
        }
    }

    pub fn as_u64(&self, field: u32) -> ProtoResult<u64> {
        match self {
            Self::Varint(v) => Ok(*v),
            other => Err(ProtoError::WrongWireType {
                field,
                expected: "varint",
                found: other.wire_name(),
            }),
        }
    }

    pub fn as_bytes(&self, field: u32) -> ProtoResult<&'a [u8]> {
        match self {
            Self::Bytes(b) => Ok(b),
            other => Err(ProtoError::WrongWireType {
                field,
                expected: "length-delimited",
                found: other.wire_name(),
            }),
        }
    }

    pub fn as_string(&self, field: u32) -> ProtoResult<String> {
        let bytes = self.as_bytes(field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtoError::InvalidUtf8(field))
    }
}

/// Iterates `(field_number, value)` pairs of one message
pub struct ProtoReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ProtoReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_varint(&mut self) -> ProtoResult<u64> {
        let mut value = 0u64;
        for shift in (0..70).step_by(7) {
            let byte = *self.data.get(self.pos).ok_or(ProtoError::UnexpectedEnd)?;
            self.pos += 1;
            if shift == 63 && byte > 1 {
                return Err(ProtoError::VarintOverflow);
            }
            value |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ProtoError::VarintOverflow)
    }

    fn take(&mut self, len: usize) -> ProtoResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(ProtoError::UnexpectedEnd)?;
        let slice = self.data.get(self.pos..end).ok_or(ProtoError::UnexpectedEnd)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn next_field(&mut self) -> ProtoResult<Option<(u32, FieldValue<'a>)>> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }

        let key = self.read_varint()?;
        let field = (key >> 3) as u32;
        let value = match (key & 0x07) as u8 {
            WIRE_VARINT => FieldValue::Varint(self.read_varint()?),
            WIRE_FIXED64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(self.take(8)?);
                FieldValue::Fixed64(u64::from_le_bytes(raw))
            }
            WIRE_LEN => {
                let len = self.read_varint()? as usize;
                FieldValue::Bytes(self.take(len)?)
            }
            WIRE_FIXED32 => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(self.take(4)?);
                FieldValue::Fixed32(u32::from_le_bytes(raw))
            }
            other => return Err(ProtoError::UnsupportedWireType(other)),
        };
        Ok(Some((field, value)))
    }
}

/// `google.protobuf.Any`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Any {
    pub type_url: String,
    pub value: Vec<u8>,
}

impl Any {
    pub fn new(type_url: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        ProtoWriter::new()
            .string(1, &self.type_url)
            .bytes(2, &self.value)
            .finish()
    }

    pub fn decode(bytes: &[u8]) -> ProtoResult<Self> {
        let mut any = Any::new(String::new(), Vec::new());
        let mut reader = ProtoReader::new(bytes);
        while let Some((field, value)) = reader.next_field()? {
            match field {
                1 => any.type_url = value.as_string(field)?,
                2 => any.value = value.as_bytes(field)?.to_vec(),
                _ => {}
            }
        }
        if any.type_url.is_empty() {
            return Err(ProtoError::MissingField("Any.type_url"));
        }
        Ok(any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_encoding() {
        let mut buf = Vec::new();
        encode_varint(300, &mut buf);
        assert_eq!(buf, vec![0xac, 0x02]);

        let mut buf = Vec::new();
        encode_varint(0, &mut buf);
        assert_eq!(buf, vec![0x00]);
    }

    #[test]
    fn test_writer_reader_round_trip() {
        let bytes = ProtoWriter::new()
            .uint64(1, 127)
            .string(2, "uluna")
            .uint64(3, 0)
            .len_delimited(4, &[])
            .uint64(5, u64::MAX)
            .finish();

        let mut reader = ProtoReader::new(&bytes);
        assert_eq!(reader.next_field().unwrap(), Some((1, FieldValue::Varint(127))));
        assert_eq!(reader.next_field().unwrap(), Some((2, FieldValue::Bytes(b"uluna"))));
        assert_eq!(reader.next_field().unwrap(), Some((4, FieldValue::Bytes(&[]))));
        assert_eq!(reader.next_field().unwrap(), Some((5, FieldValue::Varint(u64::MAX))));
        assert_eq!(reader.next_field().unwrap(), None);
    }

    #[test]
    fn test_truncated_input() {
        let mut reader = ProtoReader::new(&[0x12, 0x05, b'a']);
        assert_eq!(reader.next_field().unwrap_err(), ProtoError::UnexpectedEnd);

        let mut reader = ProtoReader::new(&[0x08, 0xff]);
        assert_eq!(reader.next_field().unwrap_err(), ProtoError::UnexpectedEnd);
    }

    #[test]
    fn test_any_round_trip() {
        let any = Any::new("/cosmos.crypto.secp256k1.PubKey", vec![0x0a, 0x01, 0x02]);
        assert_eq!(Any::decode(&any.encode()).unwrap(), any);
        assert_eq!(
            Any::decode(&[]).unwrap_err(),
            ProtoError::MissingField("Any.type_url")
        );
    }

    #[test]
    fn test_wrong_wire_type() {
        let value = FieldValue::Varint(1);
        assert!(matches!(
            value.as_bytes(1),
            Err(ProtoError::WrongWireType { field: 1, .. })
        ));
    }
}
