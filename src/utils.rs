//! Helper Functions
//!
//! Hex handling shared across the codec, the adapters, and the CLI.

/// Strips an optional `0x` / `0X` prefix.
pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Convert hex string (with or without 0x prefix) to bytes.
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(strip_0x(hex_str.trim()))
}

/// Lowercase hex with a `0x` prefix.
pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Left-pad a short hex address to `len` bytes (Move and Sui addresses drop leading zeros).
pub fn parse_padded_hex(addr: &str, len: usize) -> Option<Vec<u8>> {
    let clean = strip_0x(addr.trim());
    if clean.is_empty() || clean.len() > len * 2 {
        return None;
    }
    let padded = format!("{:0>width$}", clean, width = len * 2);
    hex::decode(padded).ok()
}

/// Serde adapter rendering `Vec<u8>` as `0x`-prefixed lowercase hex.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::hex_to_bytes(&s).map_err(serde::de::Error::custom)
    }

    /// Same rendering for fixed 32-byte values (salts, hashes).
    pub mod array {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&crate::utils::to_hex(bytes))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
            let s = String::deserialize(deserializer)?;
            let bytes = crate::utils::hex_to_bytes(&s).map_err(serde::de::Error::custom)?;
            bytes
                .try_into()
                .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
        }
    }
}
