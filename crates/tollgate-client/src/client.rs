// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The admission pipeline for one metered API.
//!
//! Each call walks: CacheLookup -> BudgetCheck -> CircuitAdmit -> RateWait ->
//! Dispatch -> Record -> CacheStore. Any gate may end the call early; once a
//! call has been admitted by the circuit breaker its outcome is always
//! recorded before it is returned.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tollgate_config::model::TollgateConfig;
use tollgate_core::{
    ApiRequest, ApiResponse, ApiTransport, BudgetAuthority, QueryOptions, QueryResult,
    TollgateError,
};
use tollgate_cost::{
    adapt_request, BudgetGate, BudgetSnapshot, CommandAuthority, CostTracker, DowngradePolicy,
};
use tollgate_metrics::{Alert, AlertManager, MetricsSnapshot, MetricsTracker, Severity, recording};
use tollgate_perplexity::PerplexityClient;
use tollgate_resilience::{CircuitBreaker, CircuitState, FailureKind, SlidingWindowRateLimiter};

use crate::cache::ResponseCache;
use crate::report::{AlertSummary, ClientStats, MonitoringReport, StatsCounters};

/// Stages a single call passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStage {
    CacheLookup,
    BudgetCheck,
    CircuitAdmit,
    RateWait,
    Dispatch,
    Record,
}

impl std::fmt::Display for CallStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallStage::CacheLookup => write!(f, "cache_lookup"),
            CallStage::BudgetCheck => write!(f, "budget_check"),
            CallStage::CircuitAdmit => write!(f, "circuit_admit"),
            CallStage::RateWait => write!(f, "rate_wait"),
            CallStage::Dispatch => write!(f, "dispatch"),
            CallStage::Record => write!(f, "record"),
        }
    }
}

/// Request parameters used when the caller leaves them unset.
#[derive(Debug, Clone)]
struct RequestDefaults {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system_prompt: String,
    timeout: Duration,
}

/// Budget-aware, fault-isolating client.
///
/// Shared across tasks as `Arc<Client>`; every component guards its own state.
pub struct Client {
    defaults: RequestDefaults,
    transport: Arc<dyn ApiTransport>,
    cache: ResponseCache,
    breaker: CircuitBreaker,
    limiter: SlidingWindowRateLimiter,
    budget: BudgetGate,
    downgrade: DowngradePolicy,
    metrics: MetricsTracker,
    costs: CostTracker,
    alerts: AlertManager,
    counters: StatsCounters,
}

impl Client {
    /// Build a client with the HTTP transport and the command-backed budget
    /// authority described by `config`.
    pub fn from_config(config: &TollgateConfig) -> Result<Self, TollgateError> {
        let transport: Arc<dyn ApiTransport> = Arc::new(PerplexityClient::new(&config.api)?);
        let authority: Arc<dyn BudgetAuthority> = Arc::new(CommandAuthority::new(&config.budget)?);
        Self::with_adapters(config, transport, authority)
    }

    /// Build a client around caller-supplied collaborators.
    ///
    /// Still requires a configured API key so that a misconfigured deployment
    /// fails at construction rather than on the first call.
    pub fn with_adapters(
        config: &TollgateConfig,
        transport: Arc<dyn ApiTransport>,
        authority: Arc<dyn BudgetAuthority>,
    ) -> Result<Self, TollgateError> {
        let has_key = config
            .api
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if !has_key {
            return Err(TollgateError::Config(
                "api.api_key is required (or set PERPLEXITY_API_KEY)".into(),
            ));
        }

        info!(
            transport = transport.name(),
            authority = authority.name(),
            model = %config.api.default_model,
            "tollgate client initialized"
        );

        Ok(Self {
            defaults: RequestDefaults {
                model: config.api.default_model.clone(),
                max_tokens: config.api.default_max_tokens,
                temperature: config.api.temperature,
                system_prompt: config.api.system_prompt.clone(),
                timeout: config.api.request_timeout(),
            },
            transport,
            cache: ResponseCache::new(&config.cache),
            breaker: CircuitBreaker::new(&config.circuit_breaker),
            limiter: SlidingWindowRateLimiter::new(&config.rate_limit),
            budget: BudgetGate::new(&config.budget, authority),
            downgrade: DowngradePolicy::new(&config.api, &config.budget),
            metrics: MetricsTracker::new(&config.metrics),
            costs: CostTracker::new(&config.pricing),
            alerts: AlertManager::new(&config.alerts),
            counters: StatsCounters::default(),
        })
    }

    /// Run `text` through the admission pipeline.
    pub async fn query(
        &self,
        text: &str,
        options: QueryOptions,
    ) -> Result<QueryResult, TollgateError> {
        self.query_with_cancel(text, options, CancellationToken::new())
            .await
    }

    /// Like [`Client::query`], abandoning the call when `cancel` fires.
    ///
    /// Cancellation before admission leaves no trace. Cancellation after the
    /// circuit breaker admitted the call counts as a failed call, including
    /// when the returned future is dropped instead of polled to completion.
    pub async fn query_with_cancel(
        &self,
        text: &str,
        options: QueryOptions,
        cancel: CancellationToken,
    ) -> Result<QueryResult, TollgateError> {
        StatsCounters::bump(&self.counters.total_requests);

        let max_tokens = options.max_tokens.unwrap_or(self.defaults.max_tokens);
        let cache_key = ResponseCache::key(text, options.model.as_deref(), max_tokens);
        if let Some(hit) = self.cache.get(&cache_key) {
            StatsCounters::bump(&self.counters.cached_responses);
            recording::record_cache_hit();
            debug!(stage = %CallStage::CacheLookup, model = %hit.model, "served from cache");
            return Ok(hit);
        }

        let budget = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TollgateError::Cancelled),
            snapshot = self.budget.check() => snapshot,
        };
        if !budget.can_proceed {
            StatsCounters::bump(&self.counters.blocked_by_budget);
            recording::record_admission_denied("budget");
            warn!(
                stage = %CallStage::BudgetCheck,
                usage = budget.usage_percentage,
                state = %budget.state,
                "request refused by budget gate"
            );
            self.evaluate_alerts();
            return Err(TollgateError::BudgetExhausted {
                message: format!(
                    "budget state {} at {:.1}% usage",
                    budget.state, budget.usage_percentage
                ),
            });
        }

        if !self.breaker.admit() {
            StatsCounters::bump(&self.counters.blocked_by_circuit_breaker);
            recording::record_admission_denied("circuit_breaker");
            let retry_after = self.breaker.retry_after();
            debug!(stage = %CallStage::CircuitAdmit, ?retry_after, "request refused by circuit breaker");
            self.evaluate_alerts();
            return Err(TollgateError::CircuitOpen { retry_after });
        }

        let request = self.build_request(text, &options, max_tokens);
        let mut admitted = AdmittedCall::new(self, &request.model);

        match self.limiter.wait(&cancel).await {
            Ok(waited) if !waited.is_zero() => {
                debug!(stage = %CallStage::RateWait, waited_ms = waited.as_millis() as u64, "rate limit wait");
            }
            Ok(_) => {}
            Err(err) => {
                admitted.disarm();
                self.record_failure(&request.model, &err);
                self.evaluate_alerts();
                return Err(err);
            }
        }
        admitted.holds_rate_slot = true;

        let request = adapt_request(&self.downgrade, &budget, &request);
        admitted.model.clone_from(&request.model);
        if self.downgrade.applies_to(&budget) {
            info!(
                usage = budget.usage_percentage,
                model = %request.model,
                max_tokens = request.max_tokens,
                "budget downgrade applied"
            );
        }

        let timeout = options.timeout.unwrap_or(self.defaults.timeout);
        let outcome = self.dispatch(&request, timeout, &cancel).await;
        admitted.disarm();
        self.limiter.complete();

        let result = match outcome {
            Ok((response, latency_ms)) => {
                self.breaker.record_success();
                self.metrics.record(
                    &request.model,
                    latency_ms,
                    response.usage.input_tokens,
                    response.usage.output_tokens,
                );
                let cost = self.costs.record_cost(
                    &request.model,
                    response.usage.input_tokens,
                    response.usage.output_tokens,
                );
                let result = QueryResult::from_response(response, request.model.clone());
                self.cache.put(cache_key, result.clone());
                StatsCounters::bump(&self.counters.successful_requests);
                debug!(
                    stage = %CallStage::Record,
                    model = %result.model,
                    latency_ms,
                    tokens = result.usage.total(),
                    cost,
                    "request completed"
                );
                Ok(result)
            }
            Err(err) => {
                self.record_failure(&request.model, &err);
                Err(err)
            }
        };

        self.evaluate_alerts();
        result
    }

    fn build_request(&self, text: &str, options: &QueryOptions, max_tokens: u32) -> ApiRequest {
        ApiRequest {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.defaults.model.clone()),
            system_prompt: options
                .system_prompt
                .clone()
                .unwrap_or_else(|| self.defaults.system_prompt.clone()),
            user_message: text.to_string(),
            max_tokens,
            temperature: options.temperature.unwrap_or(self.defaults.temperature),
            return_citations: options.return_citations,
            domain_filter: options.domains.clone(),
        }
    }

    /// Send `request`, racing the transport against `timeout` and `cancel`.
    /// Returns the response with its latency in milliseconds.
    async fn dispatch(
        &self,
        request: &ApiRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(ApiResponse, u64), TollgateError> {
        debug!(stage = %CallStage::Dispatch, model = %request.model, transport = self.transport.name(), "dispatching");
        let started = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TollgateError::Cancelled),
            sent = tokio::time::timeout(timeout, self.transport.send(request)) => match sent {
                Ok(response) => response,
                Err(_) => Err(TollgateError::Timeout { duration: timeout }),
            },
        };
        let response = outcome?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok((response, latency_ms))
    }

    fn record_failure(&self, model: &str, err: &TollgateError) {
        let kind = match err {
            TollgateError::UpstreamRateLimited { .. } => FailureKind::RateLimited,
            _ => FailureKind::Fault,
        };
        self.breaker.record_failure(kind);
        self.metrics.record_error(model, err.kind());
        if matches!(err, TollgateError::UpstreamQuotaExceeded { .. }) {
            self.budget.mark_quota_exhausted();
        }
        StatsCounters::bump(&self.counters.failed_requests);
        warn!(model, kind = %err.kind(), error = %err, "request failed");
    }

    fn evaluate_alerts(&self) {
        let raised = self.alerts.evaluate(&self.metrics.snapshot());
        if !raised.is_empty() {
            debug!(count = raised.len(), "alerts raised");
        }
    }

    /// Call counters plus the current breaker and budget standing.
    pub async fn stats(&self) -> ClientStats {
        let budget = self.budget.snapshot().await;
        ClientStats::collect(
            &self.counters,
            self.budget.checks(),
            self.breaker.state(),
            budget.state,
            budget.usage_percentage,
        )
    }

    /// Metrics, spend and alert log in one serializable document.
    pub fn report(&self) -> MonitoringReport {
        MonitoringReport {
            timestamp: Utc::now(),
            metrics: self.metrics.snapshot(),
            costs: self.costs.summary(),
            alerts: AlertSummary::from_alerts(self.alerts.alerts(None)),
        }
    }

    /// Force the breaker back to `Closed`.
    pub fn reset_circuit_breaker(&self) {
        self.breaker.reset();
        info!("circuit breaker reset");
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Last known budget standing, without consulting the authority.
    pub async fn budget_snapshot(&self) -> BudgetSnapshot {
        self.budget.snapshot().await
    }

    /// Force a budget check (subject to the minimum check interval).
    pub async fn check_budget(&self) -> BudgetSnapshot {
        self.budget.check().await
    }

    pub fn alerts(&self, severity: Option<Severity>) -> Vec<Alert> {
        self.alerts.alerts(severity)
    }

    /// Update an alert threshold by name (`error_rate` or `latency_p95`).
    pub fn set_alert_threshold(&self, name: &str, value: f64) -> Result<(), TollgateError> {
        self.alerts.set_threshold(name, value)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn costs(&self) -> &CostTracker {
        &self.costs
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

/// Records an admitted call as cancelled if its future is dropped before the
/// outcome is recorded, so the breaker still sees abandoned calls.
struct AdmittedCall<'a> {
    client: &'a Client,
    model: String,
    holds_rate_slot: bool,
    armed: bool,
}

impl<'a> AdmittedCall<'a> {
    fn new(client: &'a Client, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            holds_rate_slot: false,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AdmittedCall<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!(model = %self.model, "admitted call dropped before completion");
        self.client.record_failure(&self.model, &TollgateError::Cancelled);
        if self.holds_rate_slot {
            self.client.limiter.complete();
        }
        self.client.evaluate_alerts();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_stage_display() {
        assert_eq!(CallStage::CacheLookup.to_string(), "cache_lookup");
        assert_eq!(CallStage::RateWait.to_string(), "rate_wait");
    }
}
