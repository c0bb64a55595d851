//! Hex and quantity encodings used by fixture documents
//!
//! Fixture corpora are inconsistent about number formats: the same field can be
//! a `0x`-prefixed hex string, a decimal string or a bare JSON number. All
//! wrappers here accept every form and reject values wider than their target
//! type instead of truncating.

use primitive_types::{H160, H256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Account address
pub type Address = H160;

/// Strip an optional `0x`/`0X` prefix
fn strip_hex_prefix(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

/// Parse a quantity from hex (`0x` prefix) or decimal text
pub fn parse_quantity(s: &str) -> Result<U256, String> {
    let s = s.trim();
    match strip_hex_prefix(s) {
        Some(digits) => {
            let digits = digits.trim_start_matches('0');
            if digits.is_empty() {
                return Ok(U256::zero());
            }
            if digits.len() > 64 {
                return Err(format!("quantity exceeds 256 bits: 0x{}", digits));
            }
            U256::from_str_radix(digits, 16).map_err(|e| format!("invalid hex quantity {}: {:?}", s, e))
        }
        None if s.is_empty() => Ok(U256::zero()),
        None => U256::from_dec_str(s).map_err(|e| format!("invalid decimal quantity {}: {:?}", s, e)),
    }
}

/// Parse a 20-byte address, with or without `0x`
pub fn parse_address(s: &str) -> Result<Address, String> {
    let s = s.trim();
    let s = strip_hex_prefix(s).unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| format!("invalid address {}: {}", s, e))?;
    if bytes.len() != 20 {
        return Err(format!("invalid address length: {}", bytes.len()));
    }
    Ok(Address::from_slice(&bytes))
}

/// Parse a 32-byte word; shorter values are left-padded like a quantity
pub fn parse_word(s: &str) -> Result<H256, String> {
    parse_quantity(s).map(u256_to_h256)
}

/// Big-endian word of a quantity
pub fn u256_to_h256(value: U256) -> H256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    H256(bytes)
}

/// Quantity held by a big-endian word
pub fn h256_to_u256(word: &H256) -> U256 {
    U256::from_big_endian(word.as_bytes())
}

/// Lowercase `0x`-prefixed hex of raw bytes
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuantity {
    Number(u64),
    Text(String),
}

/// Hex-encoded bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        let s = strip_hex_prefix(&s).unwrap_or(&s);
        if s.is_empty() {
            return Ok(HexBytes(Vec::new()));
        }
        hex::decode(s)
            .map(HexBytes)
            .map_err(serde::de::Error::custom)
    }
}

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_hex(&self.0))
    }
}

/// Arbitrary-precision (256-bit) quantity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity(pub U256);

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawQuantity::deserialize(deserializer)? {
            RawQuantity::Number(n) => Ok(Quantity(U256::from(n))),
            RawQuantity::Text(s) => parse_quantity(&s)
                .map(Quantity)
                .map_err(serde::de::Error::custom),
        }
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#x}", self.0))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quantity that must fit in a u64 (block numbers, timestamps)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HexU64(pub u64);

impl<'de> Deserialize<'de> for HexU64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Quantity(value) = Quantity::deserialize(deserializer)?;
        if value > U256::from(u64::MAX) {
            return Err(serde::de::Error::custom(format!("value {} does not fit in u64", value)));
        }
        Ok(HexU64(value.low_u64()))
    }
}

impl Serialize for HexU64 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#x}", self.0))
    }
}

/// Hex-encoded address (20 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexAddress(pub Address);

impl<'de> Deserialize<'de> for HexAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        parse_address(&s)
            .map(HexAddress)
            .map_err(serde::de::Error::custom)
    }
}

impl Serialize for HexAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_hex(self.0.as_bytes()))
    }
}

/// Hex-encoded H256 (32 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexH256(pub H256);

impl<'de> Deserialize<'de> for HexH256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        let digits = strip_hex_prefix(&s).unwrap_or(&s);
        if digits.len() > 64 {
            return Err(serde::de::Error::custom(format!(
                "hash longer than 32 bytes: {}",
                s
            )));
        }
        parse_word(&format!("0x{}", digits))
            .map(HexH256)
            .map_err(serde::de::Error::custom)
    }
}

impl Serialize for HexH256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_hex(self.0.as_bytes()))
    }
}

/// Account as declared by a fixture (`pre`, `post`, `postState`)
///
/// Storage keys stay textual so that a malformed key surfaces during fixture
/// preparation rather than while loading the whole file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountState {
    /// Balance
    #[serde(default)]
    pub balance: Quantity,
    /// Code
    #[serde(default)]
    pub code: HexBytes,
    /// Nonce
    #[serde(default)]
    pub nonce: Quantity,
    /// Storage
    #[serde(default)]
    pub storage: BTreeMap<String, Quantity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_bytes_deserialize() {
        let json = r#""0x1234""#;
        let bytes: HexBytes = serde_json::from_str(json).unwrap();
        assert_eq!(bytes.0, vec![0x12, 0x34]);
    }

    #[test]
    fn test_empty_hex_bytes() {
        let bytes: HexBytes = serde_json::from_str(r#""0x""#).unwrap();
        assert!(bytes.0.is_empty());
        let bytes: HexBytes = serde_json::from_str(r#""""#).unwrap();
        assert!(bytes.0.is_empty());
    }

    #[test]
    fn test_quantity_accepts_every_form() {
        let hex: Quantity = serde_json::from_str(r#""0x0186a0""#).unwrap();
        let dec: Quantity = serde_json::from_str(r#""100000""#).unwrap();
        let num: Quantity = serde_json::from_str("100000").unwrap();
        assert_eq!(hex.0, U256::from(100_000u64));
        assert_eq!(hex, dec);
        assert_eq!(dec, num);
    }

    #[test]
    fn test_quantity_keeps_full_width() {
        let max = format!("\"0x{}\"", "f".repeat(64));
        let q: Quantity = serde_json::from_str(&max).unwrap();
        assert_eq!(q.0, U256::MAX);
    }

    #[test]
    fn test_quantity_rejects_overflow() {
        let too_wide = format!("\"0x1{}\"", "0".repeat(64));
        assert!(serde_json::from_str::<Quantity>(&too_wide).is_err());
        assert!(parse_quantity("1157920892373161954235709850086879078532699846656405640394575840079131296399360").is_err());
    }

    #[test]
    fn test_quantity_leading_zeros_are_not_overflow() {
        let padded = format!("0x{}01", "0".repeat(70));
        assert_eq!(parse_quantity(&padded).unwrap(), U256::one());
    }

    #[test]
    fn test_hex_u64_rejects_wide_values() {
        assert!(serde_json::from_str::<HexU64>(r#""0x10000000000000000""#).is_err());
        let v: HexU64 = serde_json::from_str(r#""0x100""#).unwrap();
        assert_eq!(v.0, 256);
    }

    #[test]
    fn test_hex_address_deserialize() {
        let json = r#""0x1234567890123456789012345678901234567890""#;
        let addr: HexAddress = serde_json::from_str(json).unwrap();
        assert_eq!(addr.0.as_bytes()[0], 0x12);
        assert_eq!(addr.0.as_bytes()[19], 0x90);

        let bare: HexAddress =
            serde_json::from_str(r#""1234567890123456789012345678901234567890""#).unwrap();
        assert_eq!(addr, bare);
    }

    #[test]
    fn test_hex_address_rejects_short() {
        assert!(serde_json::from_str::<HexAddress>(r#""0x1234""#).is_err());
    }

    #[test]
    fn test_hex_h256_left_pads() {
        let h: HexH256 = serde_json::from_str(r#""0x01""#).unwrap();
        assert_eq!(h.0, H256::from_low_u64_be(1));
    }

    #[test]
    fn test_quantity_serializes_as_hex() {
        let q = Quantity(U256::from(255u64));
        assert_eq!(serde_json::to_string(&q).unwrap(), r#""0xff""#);
    }

    #[test]
    fn test_account_state_defaults() {
        let acct: AccountState = serde_json::from_str(r#"{"balance": "100"}"#).unwrap();
        assert_eq!(acct.balance.0, U256::from(100u64));
        assert!(acct.code.0.is_empty());
        assert!(acct.storage.is_empty());
    }
}
