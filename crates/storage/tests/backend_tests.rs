// Behaviour every block store backend must share.

mod common;

use blockd_storage::StorageError;
use bytes::Bytes;
use common::{backends, read_all, seeded_bytes, write_block};

#[tokio::test]
async fn test_large_block_roundtrip() {
    let (_dir, stores) = backends().await;
    let data = seeded_bytes(7, 300 * 1024 + 17);

    for store in stores {
        let written = write_block(store.as_ref(), "big/block", &data, 32 * 1024 + 1).await;
        assert_eq!(written, data.len() as u64, "{}", store.backend_name());
        assert_eq!(store.head("big/block").await.unwrap().size, data.len() as u64);
        assert_eq!(read_all(store.as_ref(), "big/block").await, data.as_ref());
    }
}

#[tokio::test]
async fn test_empty_block() {
    let (_dir, stores) = backends().await;

    for store in stores {
        assert_eq!(write_block(store.as_ref(), "empty", &Bytes::new(), 1).await, 0);
        assert!(store.exists("empty").await.unwrap());
        assert!(read_all(store.as_ref(), "empty").await.is_empty());
    }
}

#[tokio::test]
async fn test_overwrite_replaces_content() {
    let (_dir, stores) = backends().await;

    for store in stores {
        write_block(store.as_ref(), "k", &Bytes::from_static(b"first"), 2).await;
        write_block(store.as_ref(), "k", &Bytes::from_static(b"second"), 2).await;
        assert_eq!(read_all(store.as_ref(), "k").await, b"second");
    }
}

#[tokio::test]
async fn test_aborted_upload_keeps_previous_content() {
    let (_dir, stores) = backends().await;

    for store in stores {
        write_block(store.as_ref(), "k", &Bytes::from_static(b"kept"), 4).await;

        let mut upload = store.put_stream("k").await.unwrap();
        upload.write(Bytes::from_static(b"discarded")).await.unwrap();
        upload.abort().await.unwrap();

        assert_eq!(read_all(store.as_ref(), "k").await, b"kept");
    }
}

#[tokio::test]
async fn test_concurrent_uploads_same_key() {
    let (_dir, stores) = backends().await;

    for store in stores {
        let a = seeded_bytes(1, 64 * 1024);
        let b = seeded_bytes(2, 64 * 1024);

        let (ra, rb) = tokio::join!(
            write_block(store.as_ref(), "race", &a, 4096),
            write_block(store.as_ref(), "race", &b, 4096),
        );
        assert_eq!(ra, a.len() as u64);
        assert_eq!(rb, b.len() as u64);

        // Last finisher wins; content is never a mix of the two.
        let stored = read_all(store.as_ref(), "race").await;
        assert!(stored == a.as_ref() || stored == b.as_ref());
    }
}

#[tokio::test]
async fn test_missing_block_errors() {
    let (_dir, stores) = backends().await;

    for store in stores {
        assert!(!store.exists("absent").await.unwrap());
        assert!(matches!(store.head("absent").await, Err(StorageError::NotFound(_))));
        assert!(matches!(store.get_stream("absent").await, Err(StorageError::NotFound(_))));
        assert!(matches!(store.delete("absent").await, Err(StorageError::NotFound(_))));
    }
}

#[tokio::test]
async fn test_invalid_keys_rejected() {
    let (_dir, stores) = backends().await;

    for store in stores {
        for key in ["", "../up", "a//b", "dot.ted", "trailing/"] {
            assert!(
                matches!(store.put_stream(key).await, Err(StorageError::InvalidKey(_))),
                "{} accepted {key:?}",
                store.backend_name()
            );
        }
    }
}

#[tokio::test]
async fn test_health_check() {
    let (_dir, stores) = backends().await;
    for store in stores {
        store.health_check().await.unwrap();
    }
}
