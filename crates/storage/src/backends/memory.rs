//! In-process block store.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BlockMeta, BlockStore, ByteStream, StreamingUpload};
use async_trait::async_trait;
use blockd_core::BlockId;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Blocks = Arc<RwLock<HashMap<String, Bytes>>>;

/// Volatile block store keyed by block id.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    blocks: Blocks,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blocks.
    pub async fn len(&self) -> usize {
        self.blocks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blocks.read().await.is_empty()
    }

    fn check_key(key: &str) -> StorageResult<()> {
        BlockId::parse(key)
            .map(|_| ())
            .map_err(|e| StorageError::InvalidKey(e.to_string()))
    }
}

#[async_trait]
impl BlockStore for MemoryBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Self::check_key(key)?;
        Ok(self.blocks.read().await.contains_key(key))
    }

    async fn head(&self, key: &str) -> StorageResult<BlockMeta> {
        Self::check_key(key)?;
        self.blocks
            .read()
            .await
            .get(key)
            .map(|data| BlockMeta {
                size: data.len() as u64,
            })
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        Self::check_key(key)?;
        let data = self
            .blocks
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }

    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        Self::check_key(key)?;
        Ok(Box::new(MemoryUpload {
            key: key.to_string(),
            buffer: BytesMut::new(),
            blocks: Arc::clone(&self.blocks),
        }))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        Self::check_key(key)?;
        self.blocks
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryUpload {
    key: String,
    buffer: BytesMut,
    blocks: Blocks,
}

#[async_trait]
impl StreamingUpload for MemoryUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.buffer.extend_from_slice(&data);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        let MemoryUpload { key, buffer, blocks } = *self;
        let size = buffer.len() as u64;
        blocks.write().await.insert(key, buffer.freeze());
        Ok(size)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}
