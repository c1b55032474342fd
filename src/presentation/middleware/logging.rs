//! Request Tracing and Metrics
//!
//! A `TraceLayer` that opens one span per request and a middleware that
//! records Prometheus counters keyed by the matched route template, so
//! `/api/tasks/{id}` is one series no matter how many ids are requested.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    http,
    middleware::Next,
    response::Response,
};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::{Level, Span};

use crate::infrastructure::metrics;

fn route_of<B>(request: &http::Request<B>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

fn make_span(request: &http::Request<Body>) -> Span {
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        route = %route_of(request),
        uri = %request.uri().path(),
    )
}

/// Per-request span with response status and latency at INFO, 5xx at ERROR.
pub fn trace_layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    fn(&http::Request<Body>) -> Span,
> {
    TraceLayer::new_for_http()
        .make_span_with(make_span as fn(&http::Request<Body>) -> Span)
        .on_response(DefaultOnResponse::new().level(Level::INFO))
        .on_failure(DefaultOnFailure::new().level(Level::ERROR))
}

/// Record request count and latency.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let route = route_of(&request);

    let response = next.run(request).await;

    metrics::record_http_request(
        &method,
        &route,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}
