//! Helpers for quantities that upstream APIs send either as JSON numbers or as strings.
//!
//! Strings may be decimal or `0x`-prefixed hex. `null` and a missing field deserialize to `None`.

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer, Serializer, de::Error};
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum Quantity {
    Number(u64),
    String(String),
}

/// Serializes the quantity as a decimal string.
pub fn serialize<S>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(value) => serializer.serialize_str(&value.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Deserializes a quantity from a number, a decimal string or a hex string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Quantity>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Quantity::Number(n)) => Ok(Some(U256::from(n))),
        Some(Quantity::String(s)) if s.is_empty() => Ok(None),
        Some(Quantity::String(s)) => U256::from_str(&s).map(Some).map_err(D::Error::custom),
    }
}
