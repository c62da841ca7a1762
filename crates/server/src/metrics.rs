//! Prometheus metrics for the blockd node.
//!
//! Exposes ingestion outcomes, request fault counts, in-flight requests per
//! server, and the runtime samples taken by the stats sampler.
//!
//! The exposition endpoint is unauthenticated and is served on its own
//! listener (`metrics.bind`), never on the block port, so it cannot shadow a
//! block id. Restrict that listener to your scrapers at the network level.

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Ingestion metrics
pub static BLOCKS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "blockd_blocks_created_total",
        "Total number of blocks verified and stored",
    )
    .expect("metric creation failed")
});

pub static BYTES_INGESTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "blockd_bytes_ingested_total",
        "Total bytes of verified blocks stored",
    )
    .expect("metric creation failed")
});

pub static INGEST_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "blockd_ingest_failures_total",
            "Total failed block ingestions by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

pub static INGEST_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "blockd_ingest_duration_seconds",
            "Time taken to receive, verify and store a block",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .expect("metric creation failed")
});

pub static BLOCKS_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("blockd_blocks_deleted_total", "Total number of blocks deleted")
        .expect("metric creation failed")
});

// Server metrics
pub static HTTP_ACTIVE_REQUESTS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "blockd_http_active_requests",
            "Requests whose handlers are currently running",
        ),
        &["server"],
    )
    .expect("metric creation failed")
});

pub static REQUEST_FAULTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "blockd_request_faults_total",
        "Total number of request handlers that panicked",
    )
    .expect("metric creation failed")
});

pub static ACCEPT_FAULTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "blockd_accept_faults_total",
        "Total number of fatal accept loop errors",
    )
    .expect("metric creation failed")
});

// Runtime samples
pub static RUNTIME_WORKERS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("blockd_runtime_workers", "Tokio runtime worker threads")
        .expect("metric creation failed")
});

pub static RUNTIME_ALIVE_TASKS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("blockd_runtime_alive_tasks", "Tokio tasks currently alive")
        .expect("metric creation failed")
});

pub static PROCESS_RESIDENT_BYTES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "blockd_process_resident_memory_bytes",
        "Resident set size of the process",
    )
    .expect("metric creation failed")
});

pub static PROCESS_UPTIME_SECONDS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "blockd_process_uptime_seconds",
        "Seconds since the stats sampler started",
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Safe to call more than once.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(BLOCKS_CREATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_INGESTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(INGEST_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(INGEST_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BLOCKS_DELETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(HTTP_ACTIVE_REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(REQUEST_FAULTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ACCEPT_FAULTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RUNTIME_WORKERS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RUNTIME_ALIVE_TASKS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PROCESS_RESIDENT_BYTES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PROCESS_UPTIME_SECONDS.clone()))
            .expect("metric registration failed");
    });
}

/// Handler for `GET /metrics`.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Router for the metrics listener.
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Record a failed ingestion.
pub fn record_ingest_failure(reason: &str) {
    INGEST_FAILURES.with_label_values(&[reason]).inc();
}
