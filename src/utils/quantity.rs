//! Numeric coercion for chain responses.
//!
//! JSON-RPC nodes return `0x`-prefixed hex quantities, LCD endpoints return
//! decimal strings. Both become plain integers before leaving the crate.

use crate::error::{ChainBridgeError, ChainBridgeResult};
use serde::de::{self, Deserializer, Visitor};
use serde::Serializer;
use std::fmt;

pub fn parse_hex_u64(value: &str) -> ChainBridgeResult<u64> {
    let parsed = parse_hex_u128(value)?;
    u64::try_from(parsed)
        .map_err(|_| ChainBridgeError::provider(format!("Quantity {} overflows u64", value)))
}

pub fn parse_hex_u128(value: &str) -> ChainBridgeResult<u128> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| ChainBridgeError::provider(format!("Quantity {} is not 0x-prefixed", value)))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| ChainBridgeError::provider(format!("Invalid hex quantity {}: {}", value, e)))
}

pub fn to_hex_quantity(value: u128) -> String {
    format!("{:#x}", value)
}

/// Accepts a decimal string, a `0x` hex string, or a JSON number
fn coerce_u128(value: &str) -> Result<u128, String> {
    if value.starts_with("0x") || value.starts_with("0X") {
        parse_hex_u128(value).map_err(|e| e.message)
    } else {
        value.parse::<u128>().map_err(|e| format!("invalid integer {:?}: {}", value, e))
    }
}

struct NumberOrStringVisitor;

impl<'de> Visitor<'de> for NumberOrStringVisitor {
    type Value = u128;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an unsigned integer or a numeric string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
        Ok(v as u128)
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
        u128::try_from(v).map_err(|_| E::custom(format!("negative quantity {}", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
        coerce_u128(v).map_err(E::custom)
    }
}

pub fn de_u128<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    deserializer.deserialize_any(NumberOrStringVisitor)
}

pub fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = deserializer.deserialize_any(NumberOrStringVisitor)?;
    u64::try_from(value).map_err(|_| de::Error::custom(format!("{} overflows u64", value)))
}

pub fn de_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = deserializer.deserialize_any(NumberOrStringVisitor)?;
    u32::try_from(value).map_err(|_| de::Error::custom(format!("{} overflows u32", value)))
}

pub fn de_opt_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    #[derive(serde::Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "de_u64")] u64);

    let wrapped: Option<Wrapper> = serde::Deserialize::deserialize(deserializer)?;
    Ok(wrapped.map(|Wrapper(v)| v))
}

/// Cosmos JSON carries integer amounts as decimal strings
pub fn ser_u128_str<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
