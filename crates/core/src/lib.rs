//! Core domain types shared by the blockd crates.
//!
//! This crate defines the data model used by storage and the HTTP node:
//! - Block identifiers and their path syntax
//! - Content digests (`SHA=<base64>`) and incremental hashing
//! - Node configuration

pub mod block;
pub mod config;
pub mod error;
pub mod hash;

pub use block::BlockId;
pub use error::{Error, Result};
pub use hash::{Digest, DigestHasher};

/// Default copy chunk size: 32 KiB
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Largest configurable copy chunk size: 16 MiB
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Default maximum declared block length: 64 MiB
pub const DEFAULT_MAX_BLOCK_SIZE: u64 = 64 * 1024 * 1024;
