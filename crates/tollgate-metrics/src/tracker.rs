// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-request metrics with bounded latency history.
//!
//! Counters, sums, min and max cover every request ever recorded. Percentiles
//! are computed over the most recent `latency_sample_capacity` latencies;
//! older samples are dropped first.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use tollgate_config::model::MetricsConfig;
use tollgate_core::ErrorKind;

use crate::recording;

/// One recorded upstream call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSample {
    pub model_id: String,
    pub latency_ms: Option<u64>,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub success: bool,
    pub error_category: Option<ErrorKind>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelRequestCounts {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelTokenCounts {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestCounts {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub by_model: BTreeMap<String, ModelRequestCounts>,
}

/// Latency statistics in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub avg: f64,
    pub min: u64,
    pub max: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TokenCounts {
    pub input: u64,
    pub output: u64,
    pub total: u64,
    pub by_model: BTreeMap<String, ModelTokenCounts>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorCounts {
    pub total: u64,
    pub by_category: BTreeMap<String, u64>,
}

/// Aggregated view returned by [`MetricsTracker::snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: RequestCounts,
    pub latency: LatencyStats,
    pub tokens: TokenCounts,
    pub errors: ErrorCounts,
    /// Failed requests as a percentage of all requests.
    pub error_rate: f64,
}

#[derive(Debug, Default)]
struct TrackerInner {
    requests: RequestCounts,
    tokens: TokenCounts,
    errors: ErrorCounts,
    latency_sum: u128,
    latency_count: u64,
    latency_min: Option<u64>,
    latency_max: u64,
    latencies: VecDeque<u64>,
    samples: VecDeque<RequestSample>,
}

/// Thread-safe request metrics.
#[derive(Debug)]
pub struct MetricsTracker {
    capacity: usize,
    inner: Mutex<TrackerInner>,
}

impl MetricsTracker {
    pub fn new(config: &MetricsConfig) -> Self {
        Self::with_capacity(config.latency_sample_capacity)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(TrackerInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a successful request.
    pub fn record(&self, model_id: &str, latency_ms: u64, tokens_in: u32, tokens_out: u32) {
        {
            let mut inner = self.lock();

            inner.requests.total += 1;
            inner.requests.successful += 1;
            let by_model = inner
                .requests
                .by_model
                .entry(model_id.to_string())
                .or_default();
            by_model.total += 1;
            by_model.successful += 1;

            inner.latency_sum += u128::from(latency_ms);
            inner.latency_count += 1;
            inner.latency_min = Some(inner.latency_min.map_or(latency_ms, |m| m.min(latency_ms)));
            inner.latency_max = inner.latency_max.max(latency_ms);
            if inner.latencies.len() == self.capacity {
                inner.latencies.pop_front();
            }
            inner.latencies.push_back(latency_ms);

            let (input, output) = (u64::from(tokens_in), u64::from(tokens_out));
            inner.tokens.input += input;
            inner.tokens.output += output;
            inner.tokens.total += input + output;
            let tokens = inner
                .tokens
                .by_model
                .entry(model_id.to_string())
                .or_default();
            tokens.input += input;
            tokens.output += output;
            tokens.total += input + output;

            self.push_sample(
                &mut inner,
                RequestSample {
                    model_id: model_id.to_string(),
                    latency_ms: Some(latency_ms),
                    tokens_in,
                    tokens_out,
                    success: true,
                    error_category: None,
                    timestamp: Utc::now(),
                },
            );
        }

        recording::record_success(model_id, latency_ms, tokens_in, tokens_out);
    }

    /// Record a failed request. Failures contribute no latency sample.
    pub fn record_error(&self, model_id: &str, category: ErrorKind) {
        {
            let mut inner = self.lock();

            inner.requests.total += 1;
            inner.requests.failed += 1;
            let by_model = inner
                .requests
                .by_model
                .entry(model_id.to_string())
                .or_default();
            by_model.total += 1;
            by_model.failed += 1;

            inner.errors.total += 1;
            *inner
                .errors
                .by_category
                .entry(category.to_string())
                .or_default() += 1;

            self.push_sample(
                &mut inner,
                RequestSample {
                    model_id: model_id.to_string(),
                    latency_ms: None,
                    tokens_in: 0,
                    tokens_out: 0,
                    success: false,
                    error_category: Some(category),
                    timestamp: Utc::now(),
                },
            );
        }

        recording::record_failure(model_id, &category.to_string());
    }

    fn push_sample(&self, inner: &mut TrackerInner, sample: RequestSample) {
        if inner.samples.len() == self.capacity {
            inner.samples.pop_front();
        }
        inner.samples.push_back(sample);
    }

    /// Nearest-rank percentile over the retained latency samples; 0 when empty.
    pub fn percentile(&self, p: f64) -> u64 {
        let inner = self.lock();
        let mut sorted: Vec<u64> = inner.latencies.iter().copied().collect();
        sorted.sort_unstable();
        nearest_rank(&sorted, p)
    }

    /// The most recent samples, oldest first.
    pub fn recent_samples(&self, limit: usize) -> Vec<RequestSample> {
        let inner = self.lock();
        let skip = inner.samples.len().saturating_sub(limit);
        inner.samples.iter().skip(skip).cloned().collect()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.lock();

        let mut sorted: Vec<u64> = inner.latencies.iter().copied().collect();
        sorted.sort_unstable();

        let avg = if inner.latency_count > 0 {
            inner.latency_sum as f64 / inner.latency_count as f64
        } else {
            0.0
        };

        let error_rate = if inner.requests.total > 0 {
            inner.errors.total as f64 / inner.requests.total as f64 * 100.0
        } else {
            0.0
        };

        MetricsSnapshot {
            requests: inner.requests.clone(),
            latency: LatencyStats {
                avg,
                min: inner.latency_min.unwrap_or(0),
                max: inner.latency_max,
                p50: nearest_rank(&sorted, 50.0),
                p95: nearest_rank(&sorted, 95.0),
                p99: nearest_rank(&sorted, 99.0),
            },
            tokens: inner.tokens.clone(),
            errors: inner.errors.clone(),
            error_rate,
        }
    }

    /// Clear all counters and history.
    pub fn reset(&self) {
        *self.lock() = TrackerInner::default();
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new(&MetricsConfig::default())
    }
}

/// `sorted[ceil(p/100 * n) - 1]`, clamped to the slice bounds.
fn nearest_rank(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as i64 - 1;
    let idx = rank.clamp(0, sorted.len() as i64 - 1) as usize;
    sorted[idx]
}
