//! Block identifiers.

use crate::hash::Digest;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque block identifier: one or more `/`-separated segments of
/// `[A-Za-z0-9_-]+`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockId(String);

impl BlockId {
    /// Parse a block id.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidBlockId("empty block id".to_string()));
        }
        for segment in s.split('/') {
            if segment.is_empty() {
                return Err(crate::Error::InvalidBlockId(format!(
                    "empty path segment in {s:?}"
                )));
            }
            if !segment.bytes().all(is_id_byte) {
                return Err(crate::Error::InvalidBlockId(format!(
                    "invalid character in {s:?}"
                )));
            }
        }
        Ok(Self(s.to_string()))
    }

    /// Parse a request path of the form `/seg(/seg)*`.
    pub fn from_path(path: &str) -> crate::Result<Self> {
        let id = path.strip_prefix('/').ok_or_else(|| {
            crate::Error::InvalidBlockId(format!("path must start with '/': {path:?}"))
        })?;
        Self::parse(id)
    }

    /// Content address of a block with the given digest.
    ///
    /// URL-safe unpadded base64 only produces `[A-Za-z0-9_-]`, so the result is
    /// always a single valid segment.
    pub fn for_digest(digest: &Digest) -> Self {
        Self(URL_SAFE_NO_PAD.encode(digest.as_bytes()))
    }

    /// Get the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_id_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

impl TryFrom<String> for BlockId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<BlockId> for String {
    fn from(id: BlockId) -> Self {
        id.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
