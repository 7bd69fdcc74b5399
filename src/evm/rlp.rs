//! Recursive Length Prefix codec
//!
//! Encoding helpers write canonical RLP; the decoder rejects non-canonical
//! length prefixes and integers with leading zero bytes.

use thiserror::Error;

use crate::error::ChainBridgeError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RlpError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("{0} trailing bytes after item")]
    TrailingBytes(usize),
    #[error("non-canonical encoding: {0}")]
    NonCanonical(&'static str),
    #[error("expected {expected}, found {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },
    #[error("integer does not fit in {0} bits")]
    Overflow(u32),
}

pub type RlpResult<T> = Result<T, RlpError>;

impl From<RlpError> for ChainBridgeError {
    fn from(e: RlpError) -> Self {
        ChainBridgeError::decode(format!("RLP decode failed: {}", e))
    }
}

// =============================================================================
// Encoding
// =============================================================================

pub fn encode_u64(val: u64) -> Vec<u8> {
    encode_u128(val as u128)
}

pub fn encode_u128(val: u128) -> Vec<u8> {
    if val == 0 {
        return vec![0x80];
    }
    let bytes = val.to_be_bytes();
    let leading_zeros = bytes.iter().take_while(|&&b| b == 0).count();
    encode_bytes(&bytes[leading_zeros..])
}

pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        return data.to_vec();
    }

    let mut result = encode_header(0x80, data.len());
    result.extend_from_slice(data);
    result
}

pub fn encode_address(addr: Option<&[u8; 20]>) -> Vec<u8> {
    match addr {
        Some(a) => encode_bytes(a),
        // contract creation
        None => vec![0x80],
    }
}

pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload_len: usize = items.iter().map(Vec::len).sum();
    let mut result = encode_header(0xc0, payload_len);
    for item in items {
        result.extend_from_slice(item);
    }
    result
}

fn encode_header(offset: u8, len: usize) -> Vec<u8> {
    if len < 56 {
        vec![offset + len as u8]
    } else {
        let len_bytes = encode_length(len);
        let mut header = vec![offset + 55 + len_bytes.len() as u8];
        header.extend_from_slice(&len_bytes);
        header
    }
}

fn encode_length(len: usize) -> Vec<u8> {
    let bytes = len.to_be_bytes();
    let leading_zeros = bytes.iter().take_while(|&&b| b == 0).count();
    bytes[leading_zeros..].to_vec()
}

// =============================================================================
// Decoding
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    fn kind(&self) -> &'static str {
        match self {
            RlpItem::Bytes(_) => "bytes",
            RlpItem::List(_) => "list",
        }
    }

    pub fn as_bytes(&self) -> RlpResult<&[u8]> {
        match self {
            RlpItem::Bytes(b) => Ok(b),
            other => Err(RlpError::UnexpectedShape {
                expected: "bytes",
                found: other.kind(),
            }),
        }
    }

    pub fn as_list(&self) -> RlpResult<&[RlpItem]> {
        match self {
            RlpItem::List(items) => Ok(items),
            other => Err(RlpError::UnexpectedShape {
                expected: "list",
                found: other.kind(),
            }),
        }
    }

    pub fn as_u128(&self) -> RlpResult<u128> {
        let bytes = self.as_bytes()?;
        if bytes.first() == Some(&0) {
            return Err(RlpError::NonCanonical("integer with leading zero"));
        }
        if bytes.len() > 16 {
            return Err(RlpError::Overflow(128));
        }
        Ok(bytes.iter().fold(0u128, |acc, b| (acc << 8) | *b as u128))
    }

    pub fn as_u64(&self) -> RlpResult<u64> {
        u64::try_from(self.as_u128()?).map_err(|_| RlpError::Overflow(64))
    }

    /// Empty string decodes to `None` (contract creation)
    pub fn as_address(&self) -> RlpResult<Option<[u8; 20]>> {
        let bytes = self.as_bytes()?;
        if bytes.is_empty() {
            return Ok(None);
        }
        bytes
            .try_into()
            .map(Some)
            .map_err(|_| RlpError::UnexpectedShape {
                expected: "20-byte address",
                found: "bytes",
            })
    }

    /// Big-endian 32-byte word, left padded
    pub fn as_word(&self) -> RlpResult<[u8; 32]> {
        let bytes = self.as_bytes()?;
        if bytes.len() > 32 {
            return Err(RlpError::Overflow(256));
        }
        let mut word = [0u8; 32];
        word[32 - bytes.len()..].copy_from_slice(bytes);
        Ok(word)
    }
}

/// Decode exactly one item spanning all of `data`
pub fn decode(data: &[u8]) -> RlpResult<RlpItem> {
    let (item, consumed) = decode_item(data)?;
    if consumed != data.len() {
        return Err(RlpError::TrailingBytes(data.len() - consumed));
    }
    Ok(item)
}

fn decode_item(data: &[u8]) -> RlpResult<(RlpItem, usize)> {
    let prefix = *data.first().ok_or(RlpError::UnexpectedEnd)?;

    match prefix {
        0x00..=0x7f => Ok((RlpItem::Bytes(vec![prefix]), 1)),
        0x80..=0xbf => {
            let (offset, len) = decode_header(data, 0x80)?;
            let payload = slice(data, offset, len)?;
            if len == 1 && payload[0] < 0x80 {
                return Err(RlpError::NonCanonical("single byte wrapped in string header"));
            }
            Ok((RlpItem::Bytes(payload.to_vec()), offset + len))
        }
        0xc0..=0xff => {
            let (offset, len) = decode_header(data, 0xc0)?;
            let mut payload = slice(data, offset, len)?;
            let mut items = Vec::new();
            while !payload.is_empty() {
                let (item, consumed) = decode_item(payload)?;
                items.push(item);
                payload = &payload[consumed..];
            }
            Ok((RlpItem::List(items), offset + len))
        }
    }
}

/// Returns (header length, payload length)
fn decode_header(data: &[u8], offset: u8) -> RlpResult<(usize, usize)> {
    let short = data[0] - offset;
    if short < 56 {
        return Ok((1, short as usize));
    }

    let len_of_len = (short - 55) as usize;
    let len_bytes = slice(data, 1, len_of_len)?;
    if len_bytes[0] == 0 {
        return Err(RlpError::NonCanonical("length with leading zero"));
    }
    if len_of_len > std::mem::size_of::<usize>() {
        return Err(RlpError::Overflow(usize::BITS));
    }
    let len = len_bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
    if len < 56 {
        return Err(RlpError::NonCanonical("long header for short payload"));
    }
    Ok((1 + len_of_len, len))
}

fn slice(data: &[u8], start: usize, len: usize) -> RlpResult<&[u8]> {
    let end = start.checked_add(len).ok_or(RlpError::UnexpectedEnd)?;
    data.get(start..end).ok_or(RlpError::UnexpectedEnd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_integers() {
        assert_eq!(encode_u64(0), vec![0x80]);
        assert_eq!(encode_u64(15), vec![0x0f]);
        assert_eq!(encode_u64(1024), vec![0x82, 0x04, 0x00]);
        assert_eq!(encode_u128(1_000_000_000_000_000_000), hex::decode("880de0b6b3a7640000").unwrap());
    }

    #[test]
    fn test_encode_strings_and_lists() {
        assert_eq!(encode_bytes(b"dog"), vec![0x83, b'd', b'o', b'g']);
        assert_eq!(encode_bytes(&[]), vec![0x80]);
        assert_eq!(encode_list(&[]), vec![0xc0]);
        assert_eq!(
            encode_list(&[encode_bytes(b"cat"), encode_bytes(b"dog")]),
            vec![0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );

        let long = vec![0x61u8; 56];
        let encoded = encode_bytes(&long);
        assert_eq!(&encoded[..2], &[0xb8, 56]);
    }

    #[test]
    fn test_decode_nested() {
        let encoded = encode_list(&[encode_u64(1024), encode_list(&[encode_bytes(b"dog")])]);
        let item = decode(&encoded).unwrap();
        let list = item.as_list().unwrap();
        assert_eq!(list[0].as_u64().unwrap(), 1024);
        assert_eq!(list[1].as_list().unwrap()[0].as_bytes().unwrap(), b"dog");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_eq!(decode(&[]), Err(RlpError::UnexpectedEnd));
        assert_eq!(decode(&[0x83, b'd', b'o']), Err(RlpError::UnexpectedEnd));
        assert_eq!(decode(&[0x01, 0x02]), Err(RlpError::TrailingBytes(1)));
        assert!(matches!(decode(&[0x81, 0x05]), Err(RlpError::NonCanonical(_))));
        assert!(matches!(
            decode(&[0x82, 0x00, 0x01]).unwrap().as_u64(),
            Err(RlpError::NonCanonical(_))
        ));
    }
}
