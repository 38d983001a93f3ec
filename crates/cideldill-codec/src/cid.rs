use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::CodecError;

/// Number of bytes in a SHA-256 digest (64 hex chars once encoded).
const CID_DIGEST_BYTES: usize = 32;

/// A content identifier: the hex encoding of a SHA-256 digest, matching the
/// `hashlib.sha256(...).hexdigest()` used throughout the source store and
/// client serialization modules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    /// Compute the CID of a byte slice.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        Cid(hex::encode(digest))
    }

    /// Parse a CID from its hex representation, validating shape.
    pub fn parse(value: impl Into<String>) -> Result<Self, CodecError> {
        let value = value.into();
        let is_valid = value.len() == CID_DIGEST_BYTES * 2
            && value.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase());
        if !is_valid {
            return Err(CodecError::InvalidCid { value });
        }
        Ok(Cid(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that `bytes` hashes to this CID.
    pub fn verify(&self, bytes: &[u8]) -> bool {
        Cid::of(bytes) == *self
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Cid {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Cid::parse(value)
    }
}

impl From<Cid> for String {
    fn from(cid: Cid) -> Self {
        cid.0
    }
}

/// Compute the CID of a byte slice. Free-function alias for [`Cid::of`].
pub fn cid(bytes: &[u8]) -> Cid {
    Cid::of(bytes)
}

/// Verify that `bytes` hashes to `cid`.
pub fn verify(bytes: &[u8], cid: &Cid) -> bool {
    cid.verify(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cid_is_64_hex_chars() {
        let c = Cid::of(b"hello world");
        assert_eq!(c.as_str().len(), 64);
        assert!(c.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn cid_is_deterministic() {
        assert_eq!(Cid::of(b"same bytes"), Cid::of(b"same bytes"));
    }

    #[test]
    fn cid_distinguishes_inputs() {
        assert_ne!(Cid::of(b"a"), Cid::of(b"b"));
    }

    #[test]
    fn verify_detects_mismatch() {
        let c = Cid::of(b"original");
        assert!(c.verify(b"original"));
        assert!(!c.verify(b"tampered"));
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(Cid::parse("abcd").is_err());
    }

    #[test]
    fn parse_rejects_uppercase() {
        let upper = "A".repeat(64);
        assert!(Cid::parse(upper).is_err());
    }
}
