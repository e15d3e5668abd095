// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fault-isolation circuit breaker shared by every caller of one client.
//!
//! ```text
//! Closed --(failures >= threshold)--> Open --(reset timeout elapsed)--> HalfOpen
//! HalfOpen --(successes >= success_threshold)--> Closed
//! HalfOpen --(any failure)--> Open
//! ```
//!
//! All state lives behind one mutex; each public method is a single
//! critical section, so an admission decision and the transition it causes
//! are applied atomically.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::time::Instant;
use tracing::{info, warn};

use tollgate_config::model::CircuitBreakerConfig;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Requests flow normally.
    #[default]
    Closed,
    /// Requests are rejected until the reset timeout elapses.
    Open,
    /// Probing recovery; one more failure reopens the circuit.
    HalfOpen,
}

/// How a failed call should weigh on the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Any upstream fault, timeout, or cancelled admitted call.
    Fault,
    /// Upstream asked us to slow down (HTTP 429). Counted, but cannot open a
    /// closed circuit on its own.
    RateLimited,
}

/// Point-in-time view of the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub consecutive_successes: u32,
    pub last_failure_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    consecutive_successes: u32,
    last_failure_at: Option<Instant>,
}

/// Three-state circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    success_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker from configuration.
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self::with_thresholds(
            config.failure_threshold,
            config.success_threshold,
            config.reset_timeout(),
        )
    }

    pub fn with_thresholds(
        failure_threshold: u32,
        success_threshold: u32,
        reset_timeout: Duration,
    ) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            success_threshold: success_threshold.max(1),
            reset_timeout,
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether a call may be attempted now.
    ///
    /// An open breaker whose reset timeout has elapsed moves to half-open and
    /// admits the call as a probe.
    pub fn admit(&self) -> bool {
        self.admit_at(Instant::now())
    }

    fn admit_at(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure_at
                    .is_none_or(|at| now.saturating_duration_since(at) >= self.reset_timeout);
                if cooled_down {
                    info!(
                        failure_count = inner.failure_count,
                        "circuit breaker: OPEN -> HALF_OPEN"
                    );
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                }
                cooled_down
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.consecutive_successes += 1;

        if inner.state == CircuitState::HalfOpen
            && inner.consecutive_successes >= self.success_threshold
        {
            info!(
                successes = inner.consecutive_successes,
                "circuit breaker: HALF_OPEN -> CLOSED"
            );
            inner.state = CircuitState::Closed;
            inner.failure_count = 0;
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self, kind: FailureKind) {
        self.record_failure_at(kind, Instant::now());
    }

    fn record_failure_at(&self, kind: FailureKind, now: Instant) {
        let mut inner = self.lock();
        inner.failure_count += 1;
        inner.last_failure_at = Some(now);
        inner.consecutive_successes = 0;

        let trips = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => {
                kind == FailureKind::Fault && inner.failure_count >= self.failure_threshold
            }
            // Late failures from calls admitted before the trip restart the timer only.
            CircuitState::Open => false,
        };

        if trips {
            warn!(
                from = %inner.state,
                failure_count = inner.failure_count,
                ?kind,
                "circuit breaker: -> OPEN"
            );
            inner.state = CircuitState::Open;
        }
    }

    /// Current state without triggering the open -> half-open transition.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Remaining cool-down while open, `None` otherwise.
    pub fn retry_after(&self) -> Option<Duration> {
        let inner = self.lock();
        if inner.state != CircuitState::Open {
            return None;
        }
        let elapsed = inner
            .last_failure_at
            .map(|at| at.elapsed())
            .unwrap_or(self.reset_timeout);
        Some(self.reset_timeout.saturating_sub(elapsed))
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            consecutive_successes: inner.consecutive_successes,
            last_failure_at: inner.last_failure_at,
        }
    }

    /// Force the breaker closed with all counters cleared (manual recovery).
    pub fn reset(&self) {
        *self.lock() = BreakerInner::default();
        info!("circuit breaker manually reset to CLOSED");
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(&CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESET: Duration = Duration::from_secs(60);

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::with_thresholds(3, 2, RESET)
    }

    fn trip(cb: &CircuitBreaker, at: Instant) {
        for _ in 0..3 {
            cb.record_failure_at(FailureKind::Fault, at);
        }
    }

    #[test]
    fn starts_closed_and_admits() {
        let cb = breaker();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.admit());
        assert_eq!(cb.retry_after(), None);
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = breaker();
        let t0 = Instant::now();
        cb.record_failure_at(FailureKind::Fault, t0);
        cb.record_failure_at(FailureKind::Fault, t0);
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure_at(FailureKind::Fault, t0);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.admit_at(t0 + Duration::from_secs(59)));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_after_reset_timeout_then_closes_on_two_successes() {
        let cb = breaker();
        let t0 = Instant::now();
        trip(&cb, t0);

        assert!(cb.admit_at(t0 + RESET));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();

        let snap = cb.snapshot();
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.failure_count, 0);
    }

    #[test]
    fn half_open_failure_reopens_and_restarts_timer() {
        let cb = breaker();
        let t0 = Instant::now();
        trip(&cb, t0);

        let retry_at = t0 + RESET;
        assert!(cb.admit_at(retry_at));
        cb.record_failure_at(FailureKind::Fault, retry_at);
        assert_eq!(cb.state(), CircuitState::Open);

        // The cool-down counts from the half-open failure, not the original trip.
        assert!(!cb.admit_at(retry_at + Duration::from_secs(30)));
        assert!(cb.admit_at(retry_at + RESET));
    }

    #[test]
    fn failure_resets_success_streak() {
        let cb = breaker();
        cb.record_success();
        cb.record_success();
        assert_eq!(cb.snapshot().consecutive_successes, 2);
        cb.record_failure(FailureKind::Fault);
        assert_eq!(cb.snapshot().consecutive_successes, 0);
    }

    #[test]
    fn rate_limited_failures_do_not_trip_closed_breaker() {
        let cb = breaker();
        let t0 = Instant::now();
        for _ in 0..5 {
            cb.record_failure_at(FailureKind::RateLimited, t0);
        }
        let snap = cb.snapshot();
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.failure_count, 5);

        // The next genuine fault is over threshold and trips immediately.
        cb.record_failure_at(FailureKind::Fault, t0);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn rate_limited_failure_reopens_half_open_breaker() {
        let cb = breaker();
        let t0 = Instant::now();
        trip(&cb, t0);
        assert!(cb.admit_at(t0 + RESET));
        cb.record_failure_at(FailureKind::RateLimited, t0 + RESET);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn manual_reset_closes_breaker() {
        let cb = breaker();
        trip(&cb, Instant::now());
        cb.reset();
        let snap = cb.snapshot();
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.failure_count, 0);
        assert!(snap.last_failure_at.is_none());
    }

    #[test]
    fn state_display_matches_log_format() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_counts_down_while_open() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure(FailureKind::Fault);
        }
        assert_eq!(cb.retry_after(), Some(RESET));
        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(cb.retry_after(), Some(Duration::from_secs(15)));
        tokio::time::advance(Duration::from_secs(15)).await;
        assert!(cb.admit());
        assert_eq!(cb.retry_after(), None);
    }
}
