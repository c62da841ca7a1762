//! Block service: the seam between HTTP handlers, verified ingestion and the
//! block store.

use crate::ingest::{IngestError, Ingestor, StoreSink};
use crate::metrics;
use blockd_core::config::ServerConfig;
use blockd_core::{BlockId, Digest};
use blockd_storage::{BlockStore, ByteStream, StorageResult};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncRead;
use tracing::instrument;

/// A block accepted by [`BlockService::create`].
#[derive(Clone, Debug)]
pub struct CreatedBlock {
    pub id: BlockId,
    pub digest: Digest,
    pub length: u64,
}

/// A block opened for reading.
pub struct StoredBlock {
    pub size: u64,
    pub stream: ByteStream,
}

pub struct BlockService {
    store: Arc<dyn BlockStore>,
    ingestor: Ingestor,
    max_block_size: u64,
}

impl BlockService {
    pub fn new(store: Arc<dyn BlockStore>, ingestor: Ingestor, max_block_size: u64) -> Self {
        Self {
            store,
            ingestor,
            max_block_size,
        }
    }

    pub fn from_config(store: Arc<dyn BlockStore>, config: &ServerConfig) -> Self {
        Self::new(store, Ingestor::new(config.chunk_size), config.max_block_size)
    }

    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    /// Verify a block body and store it under its content address.
    ///
    /// The body is streamed into a staged upload while it is hashed; the
    /// upload is published only after length and digest both check out, and
    /// discarded otherwise.
    #[instrument(skip(self, source, expected), fields(expected = %expected))]
    pub async fn create<R>(
        &self,
        source: &mut R,
        declared: u64,
        expected: &Digest,
    ) -> Result<CreatedBlock, IngestError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        if declared > self.max_block_size {
            metrics::record_ingest_failure(IngestError::TooLarge.reason());
            return Err(IngestError::TooLarge);
        }

        let started = Instant::now();
        let id = BlockId::for_digest(expected);
        let upload = self.store.put_stream(id.as_str()).await?;
        let mut sink = StoreSink::new(upload);

        let digest = match self
            .ingestor
            .ingest(source, declared, expected, &mut sink)
            .await
        {
            Ok(digest) => digest,
            Err(e) => {
                if let Err(abort_err) = sink.abort().await {
                    tracing::warn!(block_id = %id, error = %abort_err, "Failed to discard staged block");
                }
                tracing::debug!(block_id = %id, reason = e.reason(), "Block rejected");
                metrics::record_ingest_failure(e.reason());
                return Err(e);
            }
        };

        let length = match sink.finish().await {
            Ok(length) => length,
            Err(e) => {
                metrics::record_ingest_failure("storage");
                return Err(e.into());
            }
        };

        metrics::BLOCKS_CREATED.inc();
        metrics::BYTES_INGESTED.inc_by(length);
        metrics::INGEST_DURATION.observe(started.elapsed().as_secs_f64());
        tracing::info!(block_id = %id, length, "Block stored");

        Ok(CreatedBlock { id, digest, length })
    }

    /// Open a block for reading.
    #[instrument(skip_all, fields(block_id = %id))]
    pub async fn get(&self, id: &BlockId) -> StorageResult<StoredBlock> {
        let meta = self.store.head(id.as_str()).await?;
        let stream = self.store.get_stream(id.as_str()).await?;
        Ok(StoredBlock {
            size: meta.size,
            stream,
        })
    }

    #[instrument(skip_all, fields(block_id = %id))]
    pub async fn delete(&self, id: &BlockId) -> StorageResult<()> {
        self.store.delete(id.as_str()).await?;
        metrics::BLOCKS_DELETED.inc();
        tracing::info!(block_id = %id, "Block deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockd_storage::{MemoryBackend, StorageError};
    use futures::TryStreamExt;

    fn service(store: &MemoryBackend) -> BlockService {
        BlockService::new(Arc::new(store.clone()), Ingestor::new(4), 1024)
    }

    #[tokio::test]
    async fn test_create_stores_under_content_address() {
        let store = MemoryBackend::new();
        let blocks = service(&store);
        let expected = Digest::compute(b"hello");

        let created = blocks
            .create(&mut &b"hello"[..], 5, &expected)
            .await
            .unwrap();
        assert_eq!(created.length, 5);
        assert_eq!(created.id, BlockId::for_digest(&expected));

        let block = blocks.get(&created.id).await.unwrap();
        assert_eq!(block.size, 5);
        let chunks: Vec<bytes::Bytes> = block.stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"hello");
    }

    #[tokio::test]
    async fn test_rejected_block_is_not_stored() {
        let store = MemoryBackend::new();
        let blocks = service(&store);
        let expected = Digest::compute(b"hello");

        for body in [&b"hell"[..], &b"hello!"[..], &b"jello"[..]] {
            let mut source = body;
            assert!(blocks.create(&mut source, 5, &expected).await.is_err());
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_declared_length_above_limit() {
        let store = MemoryBackend::new();
        let blocks = service(&store);
        let expected = Digest::compute(b"");

        let result = blocks.create(&mut &b""[..], 4096, &expected).await;
        assert!(matches!(result, Err(IngestError::TooLarge)));
    }

    #[tokio::test]
    async fn test_delete_and_get_missing() {
        let store = MemoryBackend::new();
        let blocks = service(&store);
        let id = BlockId::parse("missing").unwrap();

        assert!(matches!(blocks.get(&id).await, Err(StorageError::NotFound(_))));
        assert!(matches!(blocks.delete(&id).await, Err(StorageError::NotFound(_))));
    }
}
