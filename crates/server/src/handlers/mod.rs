//! HTTP handlers.

pub mod blocks;
pub mod common;

pub use blocks::{block_fallback, create_block, delete_block, get_block, not_found};
