//! Application state shared across handlers.

use crate::auth::AuthPolicy;
use crate::blocks::BlockService;
use blockd_core::config::AppConfig;
use blockd_storage::BlockStore;
use std::sync::Arc;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Block service facade.
    pub blocks: Arc<BlockService>,
    /// Write authorization.
    pub auth: Arc<AuthPolicy>,
}

impl AppState {
    /// Create application state from configuration and a block store.
    pub fn new(config: &AppConfig, store: Arc<dyn BlockStore>) -> Self {
        Self {
            blocks: Arc::new(BlockService::from_config(store, &config.server)),
            auth: Arc::new(AuthPolicy::from_config(&config.auth)),
        }
    }
}
