use blockd_storage::{BlockStore, FilesystemBackend, MemoryBackend};
use bytes::Bytes;
use futures::TryStreamExt;
use std::sync::Arc;
use tempfile::TempDir;

/// Generate deterministic test data using a seeded pseudo-random generator
/// Same seed produces same output (reproducible tests)
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// One instance of every backend. The temp dir must outlive the filesystem store.
pub async fn backends() -> (TempDir, Vec<Arc<dyn BlockStore>>) {
    let dir = TempDir::new().unwrap();
    let fs = FilesystemBackend::new(dir.path().join("blocks")).await.unwrap();
    (dir, vec![Arc::new(fs), Arc::new(MemoryBackend::new())])
}

/// Write a block in fixed-size pieces and finish the upload.
pub async fn write_block(store: &dyn BlockStore, key: &str, data: &Bytes, piece: usize) -> u64 {
    let mut upload = store.put_stream(key).await.unwrap();
    for chunk in data.chunks(piece) {
        upload.write(Bytes::copy_from_slice(chunk)).await.unwrap();
    }
    upload.finish().await.unwrap()
}

pub async fn read_all(store: &dyn BlockStore, key: &str) -> Vec<u8> {
    let chunks: Vec<Bytes> = store
        .get_stream(key)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    chunks.concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_bytes_deterministic() {
        let data1 = seeded_bytes(42, 1000);
        let data2 = seeded_bytes(42, 1000);
        assert_eq!(data1, data2);
    }

    #[test]
    fn test_seeded_bytes_different_seeds() {
        let data1 = seeded_bytes(42, 1000);
        let data2 = seeded_bytes(43, 1000);
        assert_ne!(data1, data2);
    }
}
