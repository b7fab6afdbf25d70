//! Metrics collection and exposition.
//!
//! # Metrics
//! - `api_requests_total` (counter): requests by method, status
//! - `api_request_duration_seconds` (histogram): latency distribution
//! - `api_rate_limited_total` (counter): requests rejected by the limiter
//! - `api_auth_rejected_total` (counter): gate rejections by reason
//! - `api_rate_buckets` (gauge): live rate limit buckets after each sweep
//!
//! Without an installed recorder every call here is a no-op.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("api_requests_total", "Total HTTP requests by method and status");
    describe_histogram!("api_request_duration_seconds", "HTTP request latency");
    describe_counter!("api_rate_limited_total", "Requests rejected by the rate limiter");
    describe_counter!("api_auth_rejected_total", "Requests rejected by the access control gate");
    describe_gauge!("api_rate_buckets", "Rate limit buckets currently tracked");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "api_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("api_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("api_rate_limited_total").increment(1);
}

pub fn record_auth_rejected(reason: &'static str) {
    counter!("api_auth_rejected_total", "reason" => reason).increment(1);
}

pub fn record_rate_buckets(count: usize) {
    gauge!("api_rate_buckets").set(count as f64);
}

/// Middleware recording count and latency of every request.
pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    let response = next.run(request).await;

    record_request(&method, response.status().as_u16(), start);
    response
}
