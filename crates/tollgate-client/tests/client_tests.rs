// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests of the admission pipeline against scripted collaborators.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use tollgate_client::{CallStage, Client};
use tollgate_config::model::TollgateConfig;
use tollgate_core::{BudgetReport, QueryOptions, TollgateError};
use tollgate_resilience::CircuitState;
use tollgate_test_utils::{MockAuthority, MockTransport};

struct Harness {
    client: Client,
    transport: Arc<MockTransport>,
    authority: Arc<MockAuthority>,
}

fn test_config() -> TollgateConfig {
    let mut config = TollgateConfig::default();
    config.api.api_key = Some("pplx-test".to_string());
    config
}

fn harness_with(
    config: TollgateConfig,
    transport: MockTransport,
    authority: MockAuthority,
) -> Harness {
    let transport = Arc::new(transport);
    let authority = Arc::new(authority);
    let client = Client::with_adapters(&config, transport.clone(), authority.clone())
        .expect("client builds");
    Harness {
        client,
        transport,
        authority,
    }
}

fn harness() -> Harness {
    harness_with(test_config(), MockTransport::new(), MockAuthority::healthy())
}

fn report(can_proceed: bool, usage_percentage: f64, state: &str) -> BudgetReport {
    BudgetReport {
        can_proceed,
        remaining_amount: 100.0 - usage_percentage,
        usage_percentage,
        state: state.to_string(),
    }
}

fn cancel_after(delay: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        trigger.cancel();
    });
    token
}

#[tokio::test(start_paused = true)]
async fn successful_query_is_recorded() {
    let h = harness();
    h.transport.push_response("Rust is a systems language.");

    let result = h
        .client
        .query("What is Rust?", QueryOptions::default())
        .await
        .unwrap();

    assert_eq!(result.content, "Rust is a systems language.");
    assert_eq!(result.model, "sonar-pro");
    assert_eq!(result.usage.total(), 30);

    let request = h.transport.last_request().unwrap();
    assert_eq!(request.user_message, "What is Rust?");
    assert_eq!(request.max_tokens, 2000);

    let stats = h.client.stats().await;
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.successful_requests, 1);
    assert_eq!(stats.failed_requests, 0);
    assert_eq!(stats.budget_checks, 1);
    assert!((stats.success_rate - 100.0).abs() < f64::EPSILON);

    let metrics = h.client.metrics();
    assert_eq!(metrics.requests.successful, 1);
    assert_eq!(metrics.tokens.total, 30);
    assert!(h.client.costs().total() > 0.0);
    assert_eq!(h.client.cache().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cache_hit_bypasses_every_gate() {
    let h = harness();
    h.transport.push_response("first answer");

    h.client
        .query("What is Rust?", QueryOptions::default())
        .await
        .unwrap();
    let cached = h
        .client
        .query("  what is rust?  ", QueryOptions::default())
        .await
        .unwrap();

    assert_eq!(cached.content, "first answer");
    assert_eq!(h.transport.calls(), 1);
    assert_eq!(h.authority.calls(), 1);

    let stats = h.client.stats().await;
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.cached_responses, 1);
    assert_eq!(stats.budget_checks, 1);
    assert_eq!(h.client.metrics().requests.total, 1);
}

#[tokio::test(start_paused = true)]
async fn different_options_miss_the_cache() {
    let h = harness();
    h.client
        .query("What is Rust?", QueryOptions::default())
        .await
        .unwrap();
    h.client
        .query("What is Rust?", QueryOptions::default().with_max_tokens(500))
        .await
        .unwrap();
    assert_eq!(h.transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn clear_cache_forces_a_new_call() {
    let h = harness();
    h.client
        .query("What is Rust?", QueryOptions::default())
        .await
        .unwrap();
    h.client.clear_cache();
    h.client
        .query("What is Rust?", QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(h.transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn budget_refusal_never_touches_the_network() {
    let h = harness_with(
        test_config(),
        MockTransport::new(),
        MockAuthority::reporting(report(false, 100.0, "WARNING")),
    );

    let err = h
        .client
        .query("anything", QueryOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, TollgateError::BudgetExhausted { .. }));
    assert_eq!(h.transport.calls(), 0);
    let stats = h.client.stats().await;
    assert_eq!(stats.blocked_by_budget, 1);
    assert_eq!(stats.failed_requests, 0);
    assert_eq!(h.client.circuit_state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn fail_closed_authority_refuses_requests() {
    let mut config = test_config();
    config.budget.fail_open_on_authority_error = false;
    let h = harness_with(config, MockTransport::new(), MockAuthority::new());

    let err = h
        .client
        .query("anything", QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TollgateError::BudgetExhausted { .. }));
    assert_eq!(h.transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn fail_open_authority_lets_requests_through() {
    let h = harness_with(test_config(), MockTransport::new(), MockAuthority::new());

    h.client
        .query("anything", QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(h.transport.calls(), 1);
    let stats = h.client.stats().await;
    assert_eq!(stats.budget_state, tollgate_core::BudgetState::Warning);
}

#[tokio::test(start_paused = true)]
async fn breaker_opens_then_recovers_through_half_open() {
    let h = harness();
    for _ in 0..3 {
        h.transport
            .push_error(TollgateError::upstream(Some(500), "internal server error"));
    }

    for i in 0..3 {
        let err = h
            .client
            .query(&format!("failing {i}"), QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TollgateError::UpstreamFault { .. }));
    }
    assert_eq!(h.client.circuit_state(), CircuitState::Open);

    let err = h
        .client
        .query("blocked", QueryOptions::default())
        .await
        .unwrap_err();
    match err {
        TollgateError::CircuitOpen { retry_after } => assert!(retry_after.is_some()),
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
    assert_eq!(h.transport.calls(), 3);
    assert_eq!(h.client.stats().await.blocked_by_circuit_breaker, 1);

    tokio::time::advance(Duration::from_secs(60)).await;

    h.client
        .query("trial one", QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(h.client.circuit_state(), CircuitState::HalfOpen);

    h.client
        .query("trial two", QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(h.client.circuit_state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn reset_circuit_breaker_closes_it() {
    let h = harness();
    for _ in 0..3 {
        h.transport.push_error(TollgateError::upstream(Some(503), "unavailable"));
    }
    for i in 0..3 {
        let _ = h
            .client
            .query(&format!("q{i}"), QueryOptions::default())
            .await;
    }
    assert_eq!(h.client.circuit_state(), CircuitState::Open);

    h.client.reset_circuit_breaker();
    assert_eq!(h.client.circuit_state(), CircuitState::Closed);
    h.client.query("after reset", QueryOptions::default()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn rate_limited_responses_do_not_trip_a_closed_breaker() {
    let h = harness();
    for _ in 0..3 {
        h.transport.push_error(TollgateError::UpstreamRateLimited {
            retry_after: Duration::from_secs(5),
        });
    }

    for i in 0..3 {
        let err = h
            .client
            .query(&format!("busy {i}"), QueryOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
    }

    assert_eq!(h.client.circuit_state(), CircuitState::Closed);
    h.client.query("calm", QueryOptions::default()).await.unwrap();
    assert_eq!(h.transport.calls(), 4);
    assert_eq!(h.client.stats().await.failed_requests, 3);
}

#[tokio::test(start_paused = true)]
async fn quota_exhaustion_latches_the_budget_gate() {
    let h = harness();
    h.transport.push_error(TollgateError::UpstreamQuotaExceeded {
        message: "quota exceeded".into(),
    });

    let err = h
        .client
        .query("first", QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TollgateError::UpstreamQuotaExceeded { .. }));

    let err = h
        .client
        .query("second", QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TollgateError::BudgetExhausted { .. }));
    assert_eq!(h.transport.calls(), 1);
    assert!(!h.client.budget_snapshot().await.can_proceed);

    // Next successful authority check lifts the latch.
    tokio::time::advance(Duration::from_secs(61)).await;
    h.client.query("third", QueryOptions::default()).await.unwrap();
    assert_eq!(h.transport.calls(), 2);
    assert_eq!(h.authority.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn high_usage_downgrades_the_request() {
    let h = harness_with(
        test_config(),
        MockTransport::new(),
        MockAuthority::reporting(report(true, 80.0, "WARNING")),
    );

    let result = h
        .client
        .query("expensive question", QueryOptions::default())
        .await
        .unwrap();

    let sent = h.transport.last_request().unwrap();
    assert_eq!(sent.model, "sonar");
    assert_eq!(sent.max_tokens, 1000);
    assert_eq!(result.model, "sonar");

    // Stored under the original request's key.
    h.client
        .query("expensive question", QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(h.transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn usage_at_threshold_keeps_the_requested_model() {
    let h = harness_with(
        test_config(),
        MockTransport::new(),
        MockAuthority::reporting(report(true, 70.0, "OK")),
    );
    h.client
        .query("question", QueryOptions::default().with_model("sonar-reasoning"))
        .await
        .unwrap();
    assert_eq!(h.transport.last_request().unwrap().model, "sonar-reasoning");
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_rate_wait_counts_as_failure() {
    let mut config = test_config();
    config.rate_limit.max_requests_per_window = 1;
    let h = harness_with(config, MockTransport::new(), MockAuthority::healthy());

    h.client.query("first", QueryOptions::default()).await.unwrap();

    let err = h
        .client
        .query_with_cancel(
            "second",
            QueryOptions::default(),
            cancel_after(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TollgateError::Cancelled));
    assert_eq!(h.transport.calls(), 1);
    assert_eq!(h.client.cache().len(), 1);
    assert_eq!(h.client.stats().await.failed_requests, 1);
    assert_eq!(
        h.client.metrics().errors.by_category.get("cancelled"),
        Some(&1)
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_dispatch_leaves_cache_untouched() {
    let h = harness_with(
        test_config(),
        MockTransport::new().with_delay(Duration::from_secs(10)),
        MockAuthority::healthy(),
    );

    let err = h
        .client
        .query_with_cancel(
            "slow question",
            QueryOptions::default(),
            cancel_after(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TollgateError::Cancelled));
    assert_eq!(h.transport.calls(), 1);
    assert!(h.client.cache().is_empty());
    let stats = h.client.stats().await;
    assert_eq!(stats.failed_requests, 1);
    assert_eq!(stats.successful_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn dropped_admitted_calls_still_trip_the_breaker() {
    let mut config = test_config();
    config.rate_limit.min_delay_ms = 0;
    let h = harness_with(
        config,
        MockTransport::new().with_delay(Duration::from_secs(20)),
        MockAuthority::healthy(),
    );

    for i in 0..3 {
        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            h.client.query(&format!("abandoned {i}"), QueryOptions::default()),
        )
        .await;
        assert!(abandoned.is_err(), "call {i} should have been dropped");
    }

    assert_eq!(h.transport.calls(), 3);
    assert_eq!(h.client.circuit_state(), CircuitState::Open);
    let stats = h.client.stats().await;
    assert_eq!(stats.failed_requests, 3);
    assert_eq!(stats.successful_requests, 0);
    assert_eq!(
        h.client.metrics().errors.by_category.get("cancelled"),
        Some(&3)
    );
    assert!(h.client.cache().is_empty());

    let err = h
        .client
        .query("after abandonment", QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TollgateError::CircuitOpen { .. }));
    assert_eq!(h.transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn refusals_still_evaluate_alerts() {
    let h = harness();
    h.client.set_alert_threshold("errorRate", 10.0).unwrap();
    for _ in 0..3 {
        h.transport.push_error(TollgateError::upstream(Some(500), "boom"));
    }
    for i in 0..3 {
        let _ = h.client.query(&format!("q{i}"), QueryOptions::default()).await;
    }
    assert_eq!(h.client.circuit_state(), CircuitState::Open);
    let before = h.client.report().alerts.total;
    assert_eq!(before, 3);

    let err = h
        .client
        .query("blocked by breaker", QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TollgateError::CircuitOpen { .. }));
    assert_eq!(h.client.report().alerts.total, before + 1);

    h.authority.push_report(report(false, 100.0, "EXCEEDED"));
    tokio::time::advance(Duration::from_secs(61)).await;
    let err = h
        .client
        .query("blocked by budget", QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TollgateError::BudgetExhausted { .. }));
    assert_eq!(h.client.report().alerts.total, before + 2);
    assert_eq!(h.transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn slow_upstream_times_out() {
    let h = harness_with(
        test_config(),
        MockTransport::new().with_delay(Duration::from_secs(10)),
        MockAuthority::healthy(),
    );

    let err = h
        .client
        .query(
            "slow question",
            QueryOptions::default().with_timeout(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();

    match err {
        TollgateError::Timeout { duration } => assert_eq!(duration, Duration::from_secs(1)),
        other => panic!("expected Timeout, got {other:?}"),
    }
    assert_eq!(
        h.client.metrics().errors.by_category.get("timeout"),
        Some(&1)
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_credential_is_returned_unchanged() {
    let h = harness();
    h.transport.push_error(TollgateError::InvalidCredential {
        message: "bad key".into(),
    });
    let err = h
        .client
        .query("q", QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TollgateError::InvalidCredential { .. }));
    assert!(!err.is_retryable());
}

#[test]
fn missing_api_key_is_a_config_error() {
    let config = TollgateConfig::default();
    let result = Client::with_adapters(
        &config,
        Arc::new(MockTransport::new()),
        Arc::new(MockAuthority::healthy()),
    );
    assert!(matches!(result, Err(TollgateError::Config(_))));
}

#[tokio::test(start_paused = true)]
async fn report_includes_raised_alerts() {
    let h = harness();
    h.client.set_alert_threshold("errorRate", 10.0).unwrap();
    assert!(h.client.set_alert_threshold("throughput", 1.0).is_err());

    h.transport.push_error(TollgateError::upstream(Some(500), "boom"));
    let _ = h.client.query("q1", QueryOptions::default()).await;

    let report = h.client.report();
    assert_eq!(report.metrics.requests.failed, 1);
    assert!(report.alerts.high >= 1);
    assert_eq!(report.alerts.total, report.alerts.items.len());
    assert_eq!(
        h.client
            .alerts(Some(tollgate_metrics::Severity::High))
            .len(),
        report.alerts.high
    );

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["timestamp"].is_string());
    assert!(json["alerts"]["items"].is_array());
    assert!(json["costs"]["total"].is_number());
}

#[tokio::test(start_paused = true)]
async fn shared_client_serves_concurrent_callers() {
    let h = harness();
    let client = Arc::new(h.client);

    let mut handles = Vec::new();
    for i in 0..5 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client
                .query(&format!("question {i}"), QueryOptions::default())
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.transport.calls(), 5);
    let stats = client.stats().await;
    assert_eq!(stats.successful_requests, 5);
    assert_eq!(stats.budget_checks, 5);
    assert_eq!(h.authority.calls(), 1);
}

#[test]
fn call_stages_render_for_logs() {
    assert_eq!(CallStage::BudgetCheck.to_string(), "budget_check");
}
