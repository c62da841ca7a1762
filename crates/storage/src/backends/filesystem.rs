//! Local filesystem block store.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BlockMeta, BlockStore, ByteStream, StreamingUpload};
use async_trait::async_trait;
use blockd_core::BlockId;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Filesystem block store. Each block is one file under `root`.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend, creating the root if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Resolve a key to its path, off the async runtime.
    async fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || Self::key_path_sync(&root, &key))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    /// Map a key to a path that cannot leave the storage root.
    ///
    /// The key must be a valid block id, and the nearest existing ancestor of
    /// the target (or the target itself) must canonicalize inside the root, so a
    /// symlink planted in the tree cannot redirect reads or writes.
    fn key_path_sync(root: &Path, key: &str) -> StorageResult<PathBuf> {
        BlockId::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()))?;

        let root_canonical = root.canonicalize().map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to canonicalize root: {e}"),
            ))
        })?;

        let path = root.join(key);
        let mut probe = path.as_path();
        loop {
            match std::fs::symlink_metadata(probe) {
                Ok(meta) => {
                    let canonical = probe.canonicalize().map_err(|e| {
                        if meta.file_type().is_symlink() {
                            StorageError::InvalidKey(format!("dangling symlink in path: {key}"))
                        } else {
                            StorageError::Io(e)
                        }
                    })?;
                    if !canonical.starts_with(&root_canonical) {
                        return Err(StorageError::InvalidKey(format!(
                            "resolved path escapes storage root: {key}"
                        )));
                    }
                    return Ok(path);
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(StorageError::Io(err)),
            }
            match probe.parent() {
                Some(parent) => probe = parent,
                None => return Ok(path),
            }
        }
    }

    fn not_found_or_io(key: &str, e: std::io::Error) -> StorageError {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

#[async_trait]
impl BlockStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_path(key).await?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn head(&self, key: &str) -> StorageResult<BlockMeta> {
        let path = self.key_path(key).await?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| Self::not_found_or_io(key, e))?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(BlockMeta {
            size: metadata.len(),
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        use tokio::io::AsyncReadExt;

        let path = self.key_path(key).await?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| Self::not_found_or_io(key, e))?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        let path = self.key_path(key).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Concurrent uploads of one key each get their own staging file
        let temp_path = path.with_file_name(format!(
            "{}.tmp.{}",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Uuid::new_v4()
        ));
        let file = fs::File::create(&temp_path).await?;

        Ok(Box::new(FilesystemUpload {
            file,
            temp_path,
            final_path: path,
            bytes_written: 0,
        }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key).await?;
        fs::remove_file(&path)
            .await
            .map_err(|e| Self::not_found_or_io(key, e))
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}

/// Staged upload: bytes go to a temp file that is renamed into place on finish.
struct FilesystemUpload {
    file: fs::File,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
}

#[async_trait]
impl StreamingUpload for FilesystemUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.file.write_all(&data).await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> StorageResult<u64> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        let FilesystemUpload {
            file,
            temp_path,
            final_path,
            bytes_written,
        } = *self;
        drop(file);
        fs::rename(&temp_path, &final_path).await?;
        Ok(bytes_written)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        let FilesystemUpload {
            file, temp_path, ..
        } = *self;
        drop(file);
        match fs::remove_file(&temp_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
