//! Hex parsing and formatting for addresses, words and quantities.
//!
//! All JSON-facing byte fields are 0x-prefixed lowercase hex; addresses are
//! canonicalized to lowercase on the way in.

use snapvote_core::{Address, Word};

/// Strip an optional `0x`/`0X` prefix.
pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse a 20-byte address from 0x-prefixed hex.
pub fn parse_address(s: &str) -> Option<Address> {
    let raw = hex::decode(strip_0x(s)).ok()?;
    if raw.len() != 20 {
        return None;
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&raw);
    Some(out)
}

/// Parse a 32-byte word from 0x-prefixed hex.
pub fn parse_word(s: &str) -> Option<Word> {
    let raw = hex::decode(strip_0x(s)).ok()?;
    if raw.len() != 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&raw);
    Some(out)
}

/// Parse arbitrary-length 0x-prefixed hex, tolerating odd lengths.
pub fn parse_bytes(s: &str) -> Option<Vec<u8>> {
    let stripped = strip_0x(s);
    if stripped.is_empty() {
        return Some(Vec::new());
    }
    let padded = if stripped.len() % 2 == 1 {
        format!("0{}", stripped)
    } else {
        stripped.to_string()
    };
    hex::decode(&padded).ok()
}

/// Parse a hex quantity (`"0x1a"`) as u64.
pub fn parse_quantity_u64(s: &str) -> Option<u64> {
    u64::from_str_radix(strip_0x(s), 16).ok()
}

/// Parse a hex quantity as u128. Values wider than 128 bits are rejected.
pub fn parse_quantity_u128(s: &str) -> Option<u128> {
    u128::from_str_radix(strip_0x(s), 16).ok()
}

pub fn encode_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}

pub fn encode_word(word: &Word) -> String {
    format!("0x{}", hex::encode(word))
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Serde adapter for `Address` fields as 0x-prefixed hex strings.
pub mod hex_address {
    use super::{encode_address, parse_address};
    use serde::{Deserialize, Deserializer, Serializer};
    use snapvote_core::Address;

    pub fn serialize<S: Serializer>(value: &Address, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&encode_address(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Address, D::Error> {
        let s = String::deserialize(de)?;
        parse_address(&s).ok_or_else(|| serde::de::Error::custom("expected 20-byte hex address"))
    }
}

/// Serde adapter for `Word` fields as 0x-prefixed hex strings.
pub mod hex_word {
    use super::{encode_word, parse_word};
    use serde::{Deserialize, Deserializer, Serializer};
    use snapvote_core::Word;

    pub fn serialize<S: Serializer>(value: &Word, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&encode_word(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Word, D::Error> {
        let s = String::deserialize(de)?;
        parse_word(&s).ok_or_else(|| serde::de::Error::custom("expected 32-byte hex word"))
    }
}

/// Serde adapter for `Vec<Vec<u8>>` proof-node lists as hex strings.
pub mod hex_nodes {
    use super::{encode_bytes, parse_bytes};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[Vec<u8>], ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_seq(value.iter().map(|node| encode_bytes(node)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let raw: Vec<String> = Vec::deserialize(de)?;
        raw.iter()
            .map(|s| parse_bytes(s).ok_or_else(|| serde::de::Error::custom("invalid hex node")))
            .collect()
    }
}

/// Serde adapter for optional byte payloads (`data` fields).
pub mod hex_vec {
    use super::{encode_bytes, parse_bytes};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Vec<u8>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&encode_bytes(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        parse_bytes(&s).ok_or_else(|| serde::de::Error::custom("invalid hex bytes"))
    }
}
