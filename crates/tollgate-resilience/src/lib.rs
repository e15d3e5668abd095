// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for the Tollgate client.
//!
//! - [`CircuitBreaker`]: stops calling an upstream that keeps failing and
//!   probes for recovery after a cool-down.
//! - [`SlidingWindowRateLimiter`]: caps admissions per window and spaces
//!   consecutive calls.

pub mod circuit_breaker;
pub mod rate_limiter;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState, FailureKind};
pub use rate_limiter::SlidingWindowRateLimiter;
