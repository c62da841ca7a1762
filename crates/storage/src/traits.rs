//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Block store abstraction.
///
/// Keys are block ids (`seg(/seg)*`). The node never interprets stored bytes;
/// integrity is established before a staged upload is finished.
#[async_trait]
pub trait BlockStore: Send + Sync + 'static {
    /// Check if a block exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get a block's size without fetching content.
    async fn head(&self, key: &str) -> StorageResult<BlockMeta>;

    /// Get a block as a byte stream.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Start a staged streaming write.
    ///
    /// Nothing becomes visible under `key` until the upload is finished;
    /// an aborted upload leaves no trace.
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>>;

    /// Delete a block.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Get the name of this storage backend.
    ///
    /// Returns a static string identifier for the backend type (e.g., "memory", "filesystem").
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend availability.
    ///
    /// Called during startup before the node accepts requests.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Metadata about a stored block.
#[derive(Clone, Debug)]
pub struct BlockMeta {
    /// Block size in bytes.
    pub size: u64,
}

/// Trait for streaming uploads.
#[async_trait]
pub trait StreamingUpload: Send {
    /// Write a chunk of data.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Finish the upload and return the total bytes written.
    async fn finish(self: Box<Self>) -> StorageResult<u64>;

    /// Abort the upload.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}
