//! Server test utilities.

use blockd_core::config::{AppConfig, StorageConfig};
use blockd_server::auth::hash_token;
use blockd_server::{AppState, create_router};
use blockd_storage::{BlockStore, FilesystemBackend};
use std::sync::Arc;
use tempfile::TempDir;

/// Bearer token accepted by [`TestServer::with_token`].
#[allow(dead_code)]
pub const TEST_TOKEN: &str = "test-token";

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub storage: Arc<dyn BlockStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with open writes and temporary storage.
    pub async fn new() -> Self {
        Self::with_config(AppConfig::for_testing()).await
    }

    /// Create a test server whose writes require [`TEST_TOKEN`].
    pub async fn with_token() -> Self {
        let mut config = AppConfig::for_testing();
        config.auth.token_hash = Some(hash_token(TEST_TOKEN));
        Self::with_config(config).await
    }

    /// Create a test server from a config, backed by a temporary filesystem store.
    pub async fn with_config(mut config: AppConfig) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let storage_path = temp_dir.path().join("blocks");
        config.storage = StorageConfig::Filesystem {
            path: storage_path.clone(),
        };

        let storage: Arc<dyn BlockStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let state = AppState::new(&config, storage.clone());
        let router = create_router(state.clone());

        Self {
            router,
            state,
            storage,
            _temp_dir: temp_dir,
        }
    }
}
