// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Without an installed recorder every call is a
//! no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Tollgate metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("tollgate_requests_total", "Upstream requests by model and outcome");
    describe_counter!("tollgate_errors_total", "Failed upstream requests by category");
    describe_counter!("tollgate_tokens_total", "Tokens consumed by model and direction");
    describe_counter!(
        "tollgate_cache_hits_total",
        "Queries answered from the response cache"
    );
    describe_counter!(
        "tollgate_admission_denied_total",
        "Queries rejected before dispatch, by gate"
    );
    describe_counter!("tollgate_alerts_total", "Alerts raised by severity");
    describe_gauge!("tollgate_cost_usd_total", "Accumulated spend in USD by model");
    describe_gauge!(
        "tollgate_budget_usage_percent",
        "Last budget usage percentage reported by the authority"
    );
    describe_histogram!(
        "tollgate_request_latency_seconds",
        "Upstream request latency in seconds"
    );
}

/// Record a successful upstream request.
pub fn record_success(model: &str, latency_ms: u64, input: u32, output: u32) {
    metrics::counter!("tollgate_requests_total", "model" => model.to_string(), "outcome" => "success")
        .increment(1);
    metrics::histogram!("tollgate_request_latency_seconds", "model" => model.to_string())
        .record(latency_ms as f64 / 1000.0);
    record_tokens(model, input, output);
}

/// Record a failed upstream request.
pub fn record_failure(model: &str, category: &str) {
    metrics::counter!("tollgate_requests_total", "model" => model.to_string(), "outcome" => "failure")
        .increment(1);
    metrics::counter!("tollgate_errors_total", "category" => category.to_string()).increment(1);
}

/// Record token consumption.
pub fn record_tokens(model: &str, input: u32, output: u32) {
    metrics::counter!("tollgate_tokens_total", "model" => model.to_string(), "type" => "input")
        .increment(input as u64);
    metrics::counter!("tollgate_tokens_total", "model" => model.to_string(), "type" => "output")
        .increment(output as u64);
}

/// Add spend for a model.
pub fn record_cost(model: &str, usd: f64) {
    metrics::gauge!("tollgate_cost_usd_total", "model" => model.to_string()).increment(usd);
}

pub fn record_cache_hit() {
    metrics::counter!("tollgate_cache_hits_total").increment(1);
}

/// Record a query rejected by `gate` (`budget` or `circuit_breaker`).
pub fn record_admission_denied(gate: &'static str) {
    metrics::counter!("tollgate_admission_denied_total", "gate" => gate).increment(1);
}

pub fn record_alert(severity: &str) {
    metrics::counter!("tollgate_alerts_total", "severity" => severity.to_string()).increment(1);
}

/// Set the last observed budget usage.
pub fn set_budget_usage(percent: f64) {
    metrics::gauge!("tollgate_budget_usage_percent").set(percent);
}
