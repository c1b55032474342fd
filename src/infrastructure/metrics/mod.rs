//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts by method, route, and status
//! - HTTP request latency histograms
//! - Active WebSocket connection gauges
//! - Background job outcomes and queue depth

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

use crate::application::jobs::QueueDepth;

const NAMESPACE: &str = "task_server";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, route, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Active WebSocket connections gauge
pub static WEBSOCKET_CONNECTIONS_ACTIVE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new(
            "websocket_connections_active",
            "Number of active WebSocket connections",
        )
        .namespace(NAMESPACE),
        &["state"], // "connected", "identified"
    )
    .expect("Failed to create WEBSOCKET_CONNECTIONS_ACTIVE metric")
});

/// Jobs processed, by kind and outcome ("completed", "retried", "dead")
pub static JOBS_PROCESSED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("jobs_processed_total", "Background jobs processed").namespace(NAMESPACE),
        &["kind", "outcome"],
    )
    .expect("Failed to create JOBS_PROCESSED_TOTAL metric")
});

/// Queue depth by list
pub static JOB_QUEUE_DEPTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("job_queue_depth", "Jobs waiting in each queue list").namespace(NAMESPACE),
        &["list"], // "ready", "in_flight", "delayed", "dead"
    )
    .expect("Failed to create JOB_QUEUE_DEPTH metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(WEBSOCKET_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(JOBS_PROCESSED_TOTAL.clone()))
        .expect("Failed to register JOBS_PROCESSED_TOTAL");
    registry
        .register(Box::new(JOB_QUEUE_DEPTH.clone()))
        .expect("Failed to register JOB_QUEUE_DEPTH");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

/// Helper to update WebSocket connection count
pub fn set_websocket_connections(connected: i64, identified: i64) {
    WEBSOCKET_CONNECTIONS_ACTIVE
        .with_label_values(&["connected"])
        .set(connected as f64);
    WEBSOCKET_CONNECTIONS_ACTIVE
        .with_label_values(&["identified"])
        .set(identified as f64);
}

/// Helper to count one processed job
pub fn record_job(kind: &str, outcome: &str) {
    JOBS_PROCESSED_TOTAL.with_label_values(&[kind, outcome]).inc();
}

/// Helper to publish the current queue depth
pub fn set_queue_depth(depth: &QueueDepth) {
    for (list, value) in [
        ("ready", depth.ready),
        ("in_flight", depth.in_flight),
        ("delayed", depth.delayed),
        ("dead", depth.dead),
    ] {
        JOB_QUEUE_DEPTH.with_label_values(&[list]).set(value as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Force lazy initialization
        let _ = &*REGISTRY;
        let _ = &*HTTP_REQUESTS_TOTAL;
        let _ = &*JOBS_PROCESSED_TOTAL;
    }

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, 0.001);
        let metrics = gather_metrics();
        assert!(metrics.contains("task_server_http_requests_total"));
    }

    #[test]
    fn test_record_job_and_depth() {
        record_job("cleanup", "completed");
        set_queue_depth(&QueueDepth {
            ready: 3,
            ..Default::default()
        });
        let metrics = gather_metrics();
        assert!(metrics.contains("task_server_jobs_processed_total"));
        assert!(metrics.contains("task_server_job_queue_depth{list=\"ready\"} 3"));
    }
}
