//! Verified block ingestion.
//!
//! A block body is read in fixed-size chunks. Every chunk is handed to two
//! sinks at once (a checksum accumulator and a store or discard sink) and both
//! writes must complete before the next read starts, so each sink observes the
//! block in source order. The declared length is authoritative in both
//! directions: a body that ends early is `UnexpectedEof`, and the first read
//! that crosses the declared length is `TooLarge`.

use async_trait::async_trait;
use blockd_core::{Digest, DigestHasher, MAX_CHUNK_SIZE};
use blockd_storage::{StorageError, StreamingUpload};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Errors returned by a [`BlockSink`].
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("storage sink: {0}")]
    Storage(#[from] StorageError),

    #[error("sink I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Ingestion failures.
///
/// The display strings of the length and digest variants are the exact
/// messages returned to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("post body too large")]
    TooLarge,

    #[error("unexpected end of block")]
    UnexpectedEof,

    #[error("digest did not match content")]
    DigestMismatch { expected: Digest, actual: Digest },

    #[error("reading block body: {0}")]
    Read(#[source] std::io::Error),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IngestError {
    /// Short label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::TooLarge => "too_large",
            Self::UnexpectedEof => "unexpected_eof",
            Self::DigestMismatch { .. } => "digest_mismatch",
            Self::Read(_) => "read",
            Self::Sink(_) => "sink",
            Self::Storage(_) => "storage",
        }
    }
}

/// Destination for the chunks of one block.
#[async_trait]
pub trait BlockSink: Send {
    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError>;
}

/// Accumulates the block digest.
#[derive(Default)]
pub struct ChecksumSink {
    hasher: DigestHasher,
}

impl ChecksumSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finalize(self) -> Digest {
        self.hasher.finalize()
    }
}

#[async_trait]
impl BlockSink for ChecksumSink {
    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        self.hasher.update(&chunk);
        Ok(())
    }
}

/// Drops everything, counting bytes. Used for verify-only ingestion.
#[derive(Default)]
pub struct DiscardSink {
    written: u64,
}

impl DiscardSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

#[async_trait]
impl BlockSink for DiscardSink {
    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        self.written += chunk.len() as u64;
        Ok(())
    }
}

/// Feeds a staged block store upload.
///
/// The block only becomes visible once [`StoreSink::finish`] succeeds.
pub struct StoreSink {
    upload: Box<dyn StreamingUpload>,
}

impl StoreSink {
    pub fn new(upload: Box<dyn StreamingUpload>) -> Self {
        Self { upload }
    }

    /// Publish the staged block, returning its size.
    pub async fn finish(self) -> Result<u64, StorageError> {
        self.upload.finish().await
    }

    /// Discard the staged block.
    pub async fn abort(self) -> Result<(), StorageError> {
        self.upload.abort().await
    }
}

#[async_trait]
impl BlockSink for StoreSink {
    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        self.upload.write(chunk).await?;
        Ok(())
    }
}

/// Read buffer size for one copy.
///
/// When `declared` is an exact multiple of `base` the buffer grows by one byte,
/// so the last in-bounds read can never fill the buffer and one more read is
/// always needed to observe end of stream.
pub fn chunk_size_for(declared: u64, base: usize) -> usize {
    let base = base.clamp(1, MAX_CHUNK_SIZE);
    if declared % base as u64 == 0 {
        base + 1
    } else {
        base
    }
}

/// Copy exactly `declared` bytes from `source` into both sinks.
///
/// Returns the number of bytes committed. Sinks never receive bytes beyond
/// `declared`. If both sinks fail on the same chunk, `sink_a`'s error is
/// returned.
pub async fn copy_exact<R, A, B>(
    source: &mut R,
    sink_a: &mut A,
    sink_b: &mut B,
    declared: u64,
    chunk_size: usize,
) -> Result<u64, IngestError>
where
    R: AsyncRead + Unpin + ?Sized,
    A: BlockSink + ?Sized,
    B: BlockSink + ?Sized,
{
    let mut buf = vec![0u8; chunk_size_for(declared, chunk_size)];
    let mut total: u64 = 0;

    loop {
        let n = match source.read(&mut buf).await {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(IngestError::UnexpectedEof);
            }
            Err(e) => return Err(IngestError::Read(e)),
        };
        if n == 0 {
            break;
        }

        let in_bounds = (n as u64).min(declared - total) as usize;
        if in_bounds > 0 {
            let chunk = Bytes::copy_from_slice(&buf[..in_bounds]);
            let (a, b) = tokio::join!(sink_a.write(chunk.clone()), sink_b.write(chunk));
            a?;
            b?;
        }

        if in_bounds < n {
            return Err(IngestError::TooLarge);
        }
        total += n as u64;
    }

    if total < declared {
        return Err(IngestError::UnexpectedEof);
    }
    Ok(total)
}

/// Runs [`copy_exact`] with a checksum sink and verifies the result.
#[derive(Clone, Copy, Debug)]
pub struct Ingestor {
    chunk_size: usize,
}

impl Ingestor {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// Ingest a block into `sink`, returning the verified digest.
    ///
    /// Length failures are returned before any digest is computed.
    pub async fn ingest<R, S>(
        &self,
        source: &mut R,
        declared: u64,
        expected: &Digest,
        sink: &mut S,
    ) -> Result<Digest, IngestError>
    where
        R: AsyncRead + Unpin + ?Sized,
        S: BlockSink + ?Sized,
    {
        let mut checksum = ChecksumSink::new();
        copy_exact(source, &mut checksum, sink, declared, self.chunk_size).await?;

        let actual = checksum.finalize();
        if !actual.matches(expected) {
            return Err(IngestError::DigestMismatch {
                expected: expected.clone(),
                actual,
            });
        }
        Ok(actual)
    }

    /// Verify a block without storing it.
    pub async fn verify<R>(
        &self,
        source: &mut R,
        declared: u64,
        expected: &Digest,
    ) -> Result<Digest, IngestError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.ingest(source, declared, expected, &mut DiscardSink::new())
            .await
    }
}
