//! Decoded event records handed to handlers.

use crate::utils::error::{IndexerError, Result};
use alloy::dyn_abi::DynSolValue;
use alloy::hex;
use alloy::primitives::{Address, B256, U256};
use serde_json::Value;

/// Canonical text form of an address: lowercase, `0x`-prefixed.
#[must_use]
pub fn format_address(address: &Address) -> String {
    hex::encode_prefixed(address.as_slice())
}

/// Canonical text form of a 32-byte hash: lowercase, `0x`-prefixed.
#[must_use]
pub fn format_hash(hash: &B256) -> String {
    hex::encode_prefixed(hash.as_slice())
}

/// Decodes an on-chain fixed-byte string.
///
/// Trailing zero bytes are trimmed and the rest is read as UTF-8 (lossy).
/// An all-zero word yields an empty string.
#[must_use]
pub fn decode_fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |pos| pos + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Narrows a chain word to `u64`, failing instead of truncating.
pub fn u256_to_u64(value: U256, field: &str) -> Result<u64> {
    let limbs = value.as_limbs();
    if limbs[1..].iter().any(|limb| *limb != 0) {
        return Err(IndexerError::DecodingError(format!(
            "'{field}' value {value} does not fit in u64"
        )));
    }
    Ok(limbs[0])
}

/// Reads an address value.
#[must_use]
pub fn value_as_address(value: &DynSolValue) -> Option<Address> {
    match value {
        DynSolValue::Address(address) => Some(*address),
        _ => None,
    }
}

/// Reads an unsigned integer of any width.
#[must_use]
pub fn value_as_uint(value: &DynSolValue) -> Option<U256> {
    match value {
        DynSolValue::Uint(v, _) => Some(*v),
        _ => None,
    }
}

/// Reads a dynamic `string` or a `bytesN` fixed string.
#[must_use]
pub fn value_as_string(value: &DynSolValue) -> Option<String> {
    match value {
        DynSolValue::String(s) => Some(s.clone()),
        DynSolValue::FixedBytes(word, size) => Some(decode_fixed_string(&word[..*size])),
        _ => None,
    }
}

/// Reads an array of strings or fixed strings.
#[must_use]
pub fn value_as_string_list(value: &DynSolValue) -> Option<Vec<String>> {
    match value {
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            items.iter().map(value_as_string).collect()
        }
        _ => None,
    }
}

/// Reads a boolean.
#[must_use]
pub fn value_as_bool(value: &DynSolValue) -> Option<bool> {
    match value {
        DynSolValue::Bool(b) => Some(*b),
        _ => None,
    }
}

/// Converts an ABI value into JSON.
///
/// Integers become decimal strings so 256-bit words survive the trip.
#[must_use]
pub fn value_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Int(v, _) => Value::String(v.to_string()),
        DynSolValue::Uint(v, _) => Value::String(v.to_string()),
        DynSolValue::FixedBytes(word, size) => Value::String(hex::encode_prefixed(&word[..*size])),
        DynSolValue::Address(address) => Value::String(format_address(address)),
        DynSolValue::Bytes(bytes) => Value::String(hex::encode_prefixed(bytes)),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(value_to_json).collect())
        }
        _ => Value::Null,
    }
}

/// Block and transaction provenance of a decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    pub address: Address,
    pub block_number: u64,
    pub block_hash: B256,
    pub block_timestamp: u64,
    pub transaction_hash: B256,
    pub log_index: u64,
}

impl EventMeta {
    /// Deterministic identifier `"{tx hash}-{log index}"`.
    #[must_use]
    pub fn log_id(&self) -> String {
        format!("{}-{}", format_hash(&self.transaction_hash), self.log_index)
    }
}

/// Named event arguments in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventArgs {
    values: Vec<(String, DynSolValue)>,
}

impl EventArgs {
    #[must_use]
    pub fn new(values: Vec<(String, DynSolValue)>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DynSolValue> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DynSolValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, name: &str) -> Result<&DynSolValue> {
        self.get(name)
            .ok_or_else(|| IndexerError::DecodingError(format!("missing argument '{name}'")))
    }

    fn mismatch(name: &str, expected: &str) -> IndexerError {
        IndexerError::DecodingError(format!("argument '{name}' is not {expected}"))
    }

    pub fn address(&self, name: &str) -> Result<Address> {
        value_as_address(self.require(name)?).ok_or_else(|| Self::mismatch(name, "an address"))
    }

    pub fn uint(&self, name: &str) -> Result<U256> {
        value_as_uint(self.require(name)?).ok_or_else(|| Self::mismatch(name, "an unsigned integer"))
    }

    /// Range-checked narrowing; use only for counts, ids and timestamps.
    pub fn u64(&self, name: &str) -> Result<u64> {
        u256_to_u64(self.uint(name)?, name)
    }

    /// Range-checked narrowing for small enums and bounded scores.
    pub fn u8(&self, name: &str) -> Result<u8> {
        let value = self.u64(name)?;
        u8::try_from(value).map_err(|_| {
            IndexerError::DecodingError(format!("'{name}' value {value} does not fit in u8"))
        })
    }

    /// A dynamic `string` argument.
    pub fn string(&self, name: &str) -> Result<String> {
        match self.require(name)? {
            DynSolValue::String(s) => Ok(s.clone()),
            _ => Err(Self::mismatch(name, "a string")),
        }
    }

    /// A `bytesN` argument holding zero-padded text.
    pub fn fixed_string(&self, name: &str) -> Result<String> {
        match self.require(name)? {
            DynSolValue::FixedBytes(word, size) => Ok(decode_fixed_string(&word[..*size])),
            _ => Err(Self::mismatch(name, "a fixed-size byte string")),
        }
    }

    /// A `bytesN[]` or `string[]` argument.
    pub fn string_list(&self, name: &str) -> Result<Vec<String>> {
        value_as_string_list(self.require(name)?).ok_or_else(|| Self::mismatch(name, "a string list"))
    }

    pub fn boolean(&self, name: &str) -> Result<bool> {
        value_as_bool(self.require(name)?).ok_or_else(|| Self::mismatch(name, "a boolean"))
    }

    /// Argument bag as a JSON object, used for the audit log.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let map = self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value_to_json(value)))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(map)
    }
}

/// A log decoded against its contract's ABI.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    /// Configured contract name (e.g. `"IdeaRegistry"`).
    pub contract: String,
    /// Event name as declared in the ABI.
    pub name: String,
    pub args: EventArgs,
    pub meta: EventMeta,
}
