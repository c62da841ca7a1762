//! Block store abstraction and backends for blockd.
//!
//! The block store is the seam between the verified ingestion path and
//! persistence. This crate provides:
//! - The `BlockStore` trait with streaming reads and staged streaming writes
//! - Backends: local filesystem and in-memory

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, memory::MemoryBackend};
pub use error::{StorageError, StorageResult};
pub use traits::{BlockMeta, BlockStore, ByteStream, StreamingUpload};

use blockd_core::config::StorageConfig;
use std::sync::Arc;

/// Create a block store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn BlockStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::Memory => Ok(Arc::new(MemoryBackend::new())),
    }
}
