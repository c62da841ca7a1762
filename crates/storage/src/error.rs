//! Storage error types.

use thiserror::Error;

/// Block store operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("block not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
