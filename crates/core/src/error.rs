//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid block id: {0}")]
    InvalidBlockId(String),

    #[error("bad digest: {0}")]
    BadDigestFormat(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
