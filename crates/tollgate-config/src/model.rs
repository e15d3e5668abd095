// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Tollgate client.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Tollgate configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to the values
/// the client was tuned for.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TollgateConfig {
    /// Upstream AI API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Circuit breaker settings.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Admission rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Budget gate and spend authority settings.
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Alert thresholds.
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// In-process metrics retention.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Per-model price table.
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream AI API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// API credential. `None` requires the `PERPLEXITY_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Chat completions endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used when the caller does not pick one.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Cheaper model substituted when budget usage crosses the downgrade threshold.
    #[serde(default = "default_economy_model")]
    pub economy_model: String,

    /// Output token cap used when the caller does not pick one.
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Sampling temperature sent with every request.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// System prompt used when the caller does not supply one.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Deadline for a single upstream dispatch, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            default_model: default_model(),
            economy_model: default_economy_model(),
            default_max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.perplexity.ai/chat/completions".to_string()
}

fn default_model() -> String {
    "sonar-pro".to_string()
}

fn default_economy_model() -> String {
    "sonar".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.2
}

fn default_system_prompt() -> String {
    "You are a helpful AI assistant providing accurate and concise information.".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Failures while closed before the breaker opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Cool-down after the last failure before a probe is admitted, in milliseconds.
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,

    /// Consecutive half-open successes required to close again.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
            success_threshold: default_success_threshold(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_reset_timeout_ms() -> u64 {
    60_000
}

fn default_success_threshold() -> u32 {
    2
}

/// Rate limiter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Admissions allowed per window.
    #[serde(default = "default_max_requests_per_window")]
    pub max_requests_per_window: u32,

    /// Window length in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Minimum spacing after each completed request, in milliseconds.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_window: default_max_requests_per_window(),
            window_ms: default_window_ms(),
            min_delay_ms: default_min_delay_ms(),
        }
    }
}

fn default_max_requests_per_window() -> u32 {
    20
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_min_delay_ms() -> u64 {
    2_000
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Entry time-to-live in milliseconds.
    #[serde(default = "default_cache_ttl_ms")]
    pub ttl_ms: u64,

    /// Maximum number of entries kept; least recently used entries are evicted.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_ms: default_cache_ttl_ms(),
            capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_ms() -> u64 {
    24 * 60 * 60 * 1000
}

fn default_cache_capacity() -> usize {
    1024
}

/// Budget gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetConfig {
    /// Command (program followed by arguments) that prints the budget report as JSON.
    #[serde(default = "default_authority_command")]
    pub authority_command: Vec<String>,

    /// Deadline for one authority query, in milliseconds.
    #[serde(default = "default_authority_timeout_ms")]
    pub authority_timeout_ms: u64,

    /// Minimum age of a snapshot before the authority is queried again, in milliseconds.
    #[serde(default = "default_min_check_interval_ms")]
    pub min_check_interval_ms: u64,

    /// Keep admitting requests when the authority cannot be reached.
    #[serde(default = "default_fail_open")]
    pub fail_open_on_authority_error: bool,

    /// Usage percentage above which requests are downgraded.
    #[serde(default = "default_downgrade_threshold_pct")]
    pub downgrade_threshold_pct: f64,

    /// Output token cap applied to downgraded requests.
    #[serde(default = "default_downgraded_max_tokens")]
    pub downgraded_max_tokens: u32,
}

impl BudgetConfig {
    pub fn authority_timeout(&self) -> Duration {
        Duration::from_millis(self.authority_timeout_ms)
    }

    pub fn min_check_interval(&self) -> Duration {
        Duration::from_millis(self.min_check_interval_ms)
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            authority_command: default_authority_command(),
            authority_timeout_ms: default_authority_timeout_ms(),
            min_check_interval_ms: default_min_check_interval_ms(),
            fail_open_on_authority_error: default_fail_open(),
            downgrade_threshold_pct: default_downgrade_threshold_pct(),
            downgraded_max_tokens: default_downgraded_max_tokens(),
        }
    }
}

fn default_authority_command() -> Vec<String> {
    vec![
        "python3".to_string(),
        "scripts/perplexity_costs.py".to_string(),
        "budget".to_string(),
    ]
}

fn default_authority_timeout_ms() -> u64 {
    10_000
}

fn default_min_check_interval_ms() -> u64 {
    60_000
}

fn default_fail_open() -> bool {
    true
}

fn default_downgrade_threshold_pct() -> f64 {
    70.0
}

fn default_downgraded_max_tokens() -> u32 {
    1000
}

/// Alert threshold configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AlertsConfig {
    /// Error rate (percent of requests) above which a high-severity alert fires.
    #[serde(default = "default_error_rate_threshold_pct")]
    pub error_rate_threshold_pct: f64,

    /// p95 latency in milliseconds above which a medium-severity alert fires.
    #[serde(default = "default_latency_p95_threshold_ms")]
    pub latency_p95_threshold_ms: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            error_rate_threshold_pct: default_error_rate_threshold_pct(),
            latency_p95_threshold_ms: default_latency_p95_threshold_ms(),
        }
    }
}

fn default_error_rate_threshold_pct() -> f64 {
    5.0
}

fn default_latency_p95_threshold_ms() -> u64 {
    5000
}

/// Metrics retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Number of most recent latency samples kept for percentile computation.
    #[serde(default = "default_latency_sample_capacity")]
    pub latency_sample_capacity: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            latency_sample_capacity: default_latency_sample_capacity(),
        }
    }
}

fn default_latency_sample_capacity() -> usize {
    10_000
}

/// Price of one model in USD per thousand tokens.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelPrice {
    pub input_per_ktok: f64,
    pub output_per_ktok: f64,
}

impl ModelPrice {
    pub const fn new(input_per_ktok: f64, output_per_ktok: f64) -> Self {
        Self {
            input_per_ktok,
            output_per_ktok,
        }
    }
}

/// Per-model price table.
///
/// Entries given in configuration are merged over the built-in table, so a
/// deployment only lists the models it wants to add or re-price.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    #[serde(default = "default_price_table")]
    pub models: BTreeMap<String, ModelPrice>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            models: default_price_table(),
        }
    }
}

fn default_price_table() -> BTreeMap<String, ModelPrice> {
    [
        ("sonar", ModelPrice::new(0.001, 0.001)),
        ("sonar-pro", ModelPrice::new(0.003, 0.015)),
        ("sonar-reasoning", ModelPrice::new(0.001, 0.005)),
        ("sonar-reasoning-pro", ModelPrice::new(0.002, 0.008)),
        ("llama-3.1-sonar-small-128k-online", ModelPrice::new(0.0002, 0.0002)),
        ("llama-3.1-sonar-huge-128k-online", ModelPrice::new(0.005, 0.005)),
        ("claude-opus-4-1", ModelPrice::new(0.015, 0.075)),
        ("claude-sonnet-4-5", ModelPrice::new(0.003, 0.015)),
        ("claude-3-5-haiku", ModelPrice::new(0.0008, 0.004)),
        ("claude-3-haiku", ModelPrice::new(0.00025, 0.00125)),
    ]
    .into_iter()
    .map(|(model, price)| (model.to_string(), price))
    .collect()
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
