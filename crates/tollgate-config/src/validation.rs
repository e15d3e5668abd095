// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: non-zero thresholds and windows, percentage ranges,
//! non-negative prices, a runnable authority command.

use crate::diagnostic::ConfigError;
use crate::model::TollgateConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns all collected validation errors (does not fail fast).
pub fn validate_config(config: &TollgateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if config.api.base_url.trim().is_empty() {
        invalid("api.base_url must not be empty".to_string());
    }

    if config.api.default_model.trim().is_empty() {
        invalid("api.default_model must not be empty".to_string());
    }

    if config.api.economy_model.trim().is_empty() {
        invalid("api.economy_model must not be empty".to_string());
    }

    if config.api.default_max_tokens == 0 {
        invalid("api.default_max_tokens must be at least 1".to_string());
    }

    if !(0.0..=2.0).contains(&config.api.temperature) {
        invalid(format!(
            "api.temperature must be between 0.0 and 2.0, got {}",
            config.api.temperature
        ));
    }

    if config.api.request_timeout_ms == 0 {
        invalid("api.request_timeout_ms must be greater than 0".to_string());
    }

    if config.circuit_breaker.failure_threshold == 0 {
        invalid("circuit_breaker.failure_threshold must be at least 1".to_string());
    }

    if config.circuit_breaker.success_threshold == 0 {
        invalid("circuit_breaker.success_threshold must be at least 1".to_string());
    }

    if config.rate_limit.max_requests_per_window == 0 {
        invalid("rate_limit.max_requests_per_window must be at least 1".to_string());
    }

    if config.rate_limit.window_ms == 0 {
        invalid("rate_limit.window_ms must be greater than 0".to_string());
    }

    if config.cache.enabled && config.cache.capacity == 0 {
        invalid("cache.capacity must be at least 1 when the cache is enabled".to_string());
    }

    if config.budget.authority_command.is_empty()
        || config.budget.authority_command[0].trim().is_empty()
    {
        invalid("budget.authority_command must name a program to run".to_string());
    }

    if !(0.0..=100.0).contains(&config.budget.downgrade_threshold_pct) {
        invalid(format!(
            "budget.downgrade_threshold_pct must be between 0 and 100, got {}",
            config.budget.downgrade_threshold_pct
        ));
    }

    if config.budget.downgraded_max_tokens == 0 {
        invalid("budget.downgraded_max_tokens must be at least 1".to_string());
    }

    if config.alerts.error_rate_threshold_pct < 0.0 {
        invalid(format!(
            "alerts.error_rate_threshold_pct must be non-negative, got {}",
            config.alerts.error_rate_threshold_pct
        ));
    }

    if config.metrics.latency_sample_capacity == 0 {
        invalid("metrics.latency_sample_capacity must be at least 1".to_string());
    }

    for (model, price) in &config.pricing.models {
        if price.input_per_ktok < 0.0 || price.output_per_ktok < 0.0 {
            invalid(format!("pricing.models.{model} must not have negative prices"));
        }
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        invalid(format!(
            "logging.level `{}` is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelPrice;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&TollgateConfig::default()).is_ok());
    }

    #[test]
    fn zero_failure_threshold_fails_validation() {
        let mut config = TollgateConfig::default();
        config.circuit_breaker.failure_threshold = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "failure_threshold"));
    }

    #[test]
    fn zero_capacity_only_matters_when_cache_enabled() {
        let mut config = TollgateConfig::default();
        config.cache.capacity = 0;
        assert!(validate_config(&config).is_err());

        config.cache.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = TollgateConfig::default();
        config.rate_limit.window_ms = 0;
        config.budget.downgrade_threshold_pct = 150.0;
        config.budget.authority_command.clear();
        config.logging.level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(has_error(&errors, "window_ms"));
        assert!(has_error(&errors, "downgrade_threshold_pct"));
        assert!(has_error(&errors, "authority_command"));
        assert!(has_error(&errors, "logging.level"));
    }

    #[test]
    fn negative_price_fails_validation() {
        let mut config = TollgateConfig::default();
        config
            .pricing
            .models
            .insert("broken".to_string(), ModelPrice::new(-1.0, 0.0));
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "pricing.models.broken"));
    }
}
