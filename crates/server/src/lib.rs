//! HTTP block node.
//!
//! This crate provides:
//! - Verified ingestion (`copy_exact`, sinks, `Ingestor`)
//! - The block service facade over a `BlockStore`
//! - A request-scoped HTTP server with fault isolation and graceful close
//! - The service stack that starts and stops long-lived units
//! - A runtime stats sampler and Prometheus metrics

pub mod auth;
pub mod blocks;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod stack;
pub mod state;
pub mod stats;

pub use error::ApiError;
pub use routes::create_router;
pub use server::{Fault, HttpServer, HttpService};
pub use stack::{Service, Stack};
pub use state::AppState;
