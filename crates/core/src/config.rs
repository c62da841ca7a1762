//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Block HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Nominal bytes per ingest chunk.
    /// When a declared length is an exact multiple, one extra byte is added for that request.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Largest declared Content-Length accepted by `POST /`.
    #[serde(default = "default_max_block_size")]
    pub max_block_size: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_chunk_size() -> usize {
    crate::DEFAULT_CHUNK_SIZE
}

fn default_max_block_size() -> u64 {
    crate::DEFAULT_MAX_BLOCK_SIZE
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            chunk_size: default_chunk_size(),
            max_block_size: default_max_block_size(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("server.chunk_size must be greater than zero".to_string());
        }
        if self.chunk_size > crate::MAX_CHUNK_SIZE {
            return Err(format!(
                "server.chunk_size must be at most {} bytes",
                crate::MAX_CHUNK_SIZE
            ));
        }
        if self.max_block_size == 0 {
            return Err("server.max_block_size must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Block store backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for blocks.
        path: PathBuf,
    },
    /// Volatile in-process storage. Blocks are lost on restart.
    Memory,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/blocks"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("filesystem storage requires a non-empty path".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Runtime statistics sampler configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Run the sampler at all.
    #[serde(default = "default_stats_enabled")]
    pub enabled: bool,
    /// Seconds between samples. Zero falls back to one minute.
    #[serde(default = "default_stats_interval_secs")]
    pub interval_secs: u64,
}

fn default_stats_enabled() -> bool {
    true
}

fn default_stats_interval_secs() -> u64 {
    30
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: default_stats_enabled(),
            interval_secs: default_stats_interval_secs(),
        }
    }
}

impl StatsConfig {
    /// Sampling interval.
    pub fn interval(&self) -> Duration {
        match self.interval_secs {
            0 => Duration::from_secs(60),
            secs => Duration::from_secs(secs),
        }
    }
}

/// Prometheus listener configuration.
///
/// The exposition endpoint runs on its own listener so it cannot shadow a
/// block id on the block port.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Bind address for `GET /metrics`. No listener is started when unset.
    #[serde(default)]
    pub bind: Option<String>,
}

/// Write authorization configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// SHA-256 hex of the bearer token required for POST and DELETE.
    /// Generate with: `echo -n "your-secret-token" | sha256sum`
    /// When unset every write is allowed.
    #[serde(default)]
    pub token_hash: Option<String>,
}

impl AuthConfig {
    /// Validate the token hash shape.
    pub fn validate(&self) -> Result<(), String> {
        match &self.token_hash {
            Some(hash) if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) => {
                Err("auth.token_hash must be 64 hex characters".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Complete node configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Block HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Block store backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Runtime statistics sampler configuration.
    #[serde(default)]
    pub stats: StatsConfig,
    /// Prometheus listener configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Write authorization configuration.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Validate every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.storage.validate()?;
        self.auth.validate()
    }

    /// Create a test configuration.
    ///
    /// **For testing only.** Uses in-memory storage, an ephemeral port and no sampler.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
                ..ServerConfig::default()
            },
            storage: StorageConfig::Memory,
            stats: StatsConfig {
                enabled: false,
                ..StatsConfig::default()
            },
            metrics: MetricsConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}
