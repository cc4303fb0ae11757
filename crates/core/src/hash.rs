//! Parameter digest type and hashing utilities.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 digest over a normalized parameter set, represented as 32 bytes.
///
/// The digest is the cache key for an analysis run: identical parameters
/// always hash to the same value, so a resolve for recurring parameters
/// lands on the existing fingerprint row.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamsDigest([u8; 32]);

impl ParamsDigest {
    /// Create a new ParamsDigest from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Compute SHA-256 over an already-canonical byte encoding.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();
        Self(result.into())
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != 64 {
            return Err(crate::Error::InvalidDigest(format!(
                "expected 64 hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex_str =
                std::str::from_utf8(chunk).map_err(|e| crate::Error::InvalidDigest(e.to_string()))?;
            bytes[i] = u8::from_str_radix(hex_str, 16)
                .map_err(|e| crate::Error::InvalidDigest(e.to_string()))?;
        }
        Ok(Self(bytes))
    }

    /// Encode as lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for ParamsDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParamsDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ParamsDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_hex_roundtrip() {
        let digest = ParamsDigest::compute(b"eps=0.5;min_points=5");
        let hex = digest.to_hex();
        assert_eq!(hex.len(), crate::DIGEST_HEX_LEN);
        let parsed = ParamsDigest::from_hex(&hex).unwrap();
        assert_eq!(digest, parsed);
    }

    #[test]
    fn test_digest_rejects_bad_hex() {
        assert!(ParamsDigest::from_hex("short").is_err());
        assert!(ParamsDigest::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_digest_is_deterministic() {
        let a = ParamsDigest::compute(b"payload");
        let b = ParamsDigest::compute(b"payload");
        assert_eq!(a, b);
        assert_ne!(a, ParamsDigest::compute(b"other"));
    }
}
