//! Block content digests.
//!
//! A digest travels in the `Digest` request header as `SHA=<base64>`, where the
//! value is the standard (padded) base64 encoding of the SHA-1 of the block.
//! Two digests are equal iff their encodings are byte-identical.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha1::{Digest as _, Sha1};
use std::fmt;

/// Algorithm prefix carried by every digest encoding.
pub const DIGEST_PREFIX: &str = "SHA=";

/// Length of a raw SHA-1 digest.
pub const DIGEST_LEN: usize = 20;

/// A SHA-1 block digest in its `SHA=<base64>` encoding.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    encoded: String,
    raw: [u8; DIGEST_LEN],
}

impl Digest {
    /// Build a digest from raw SHA-1 bytes.
    pub fn from_bytes(raw: [u8; DIGEST_LEN]) -> Self {
        Self {
            encoded: format!("{DIGEST_PREFIX}{}", STANDARD.encode(raw)),
            raw,
        }
    }

    /// Digest of a complete byte sequence.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = DigestHasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Parse a `Digest` header value.
    ///
    /// The value must be `SHA=` followed by canonical standard base64 that
    /// decodes to exactly 20 bytes. Surrounding whitespace is ignored; anything
    /// else is a format error.
    pub fn parse_header(value: &str) -> crate::Result<Self> {
        let value = value.trim();
        let b64 = value.strip_prefix(DIGEST_PREFIX).ok_or_else(|| {
            crate::Error::BadDigestFormat(format!("expected {DIGEST_PREFIX} prefix"))
        })?;
        if b64.is_empty() || b64.chars().any(char::is_whitespace) {
            return Err(crate::Error::BadDigestFormat(
                "digest value must be a single base64 token".to_string(),
            ));
        }
        let bytes = STANDARD
            .decode(b64)
            .map_err(|e| crate::Error::BadDigestFormat(e.to_string()))?;
        let raw: [u8; DIGEST_LEN] = bytes.as_slice().try_into().map_err(|_| {
            crate::Error::BadDigestFormat(format!(
                "expected {DIGEST_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self {
            encoded: value.to_string(),
            raw,
        })
    }

    /// The full `SHA=<base64>` encoding.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.raw
    }

    /// Byte-exact comparison of the encodings.
    pub fn matches(&self, other: &Digest) -> bool {
        self.encoded.as_bytes() == other.encoded.as_bytes()
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.encoded)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Incremental SHA-1 accumulator.
#[derive(Clone, Default)]
pub struct DigestHasher(Sha1);

impl DigestHasher {
    /// Create an empty hasher.
    pub fn new() -> Self {
        Self(Sha1::new())
    }

    /// Feed more block bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> Digest {
        Digest::from_bytes(self.0.finalize().into())
    }
}
