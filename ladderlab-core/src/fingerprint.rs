//! Config fingerprinting for reproducibility.
//!
//! Two runs with the same fingerprint and the same bar data must produce
//! identical results. The hash covers the full serialized configuration.

use crate::engine::EngineConfig;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 32-byte BLAKE3 hash of the canonical (serde_json) form of a config.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigHash(pub [u8; 32]);

impl ConfigHash {
    pub fn of(config: &EngineConfig) -> Self {
        // EngineConfig serialization is infallible: plain structs, no maps
        // with non-string keys.
        let bytes = serde_json::to_vec(config).unwrap_or_default();
        Self(*blake3::hash(&bytes).as_bytes())
    }

    pub fn as_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigHash({})", &self.as_hex()[..16])
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl Serialize for ConfigHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_hex())
    }
}

impl<'de> Deserialize<'de> for ConfigHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        if hex.len() != 64 {
            return Err(serde::de::Error::custom("expected 64 hex chars"));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let high = (chunk[0] as char)
                .to_digit(16)
                .ok_or_else(|| serde::de::Error::custom("invalid hex"))?;
            let low = (chunk[1] as char)
                .to_digit(16)
                .ok_or_else(|| serde::de::Error::custom("invalid hex"))?;
            bytes[i] = (high * 16 + low) as u8;
        }
        Ok(Self(bytes))
    }
}
