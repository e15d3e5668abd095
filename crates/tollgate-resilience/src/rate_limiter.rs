// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sliding-window admission limiter with minimum spacing between calls.
//!
//! At most `max_requests_per_window` admissions are granted per window. When
//! the window is full, the next caller waits out the remainder of the window,
//! which then restarts at the moment the wait ends. After each completed call
//! the next admission is held back by `min_delay`.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tollgate_config::model::RateLimitConfig;
use tollgate_core::TollgateError;

#[derive(Debug)]
struct RateWindow {
    window_start: Instant,
    count: u32,
    next_slot: Option<Instant>,
}

enum Admission {
    Ready,
    WaitUntil(Instant),
}

/// Admission limiter shared by all callers of one client.
#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    // Serializes waiters so admissions are granted in arrival order.
    admission: tokio::sync::Mutex<()>,
    state: Mutex<RateWindow>,
}

impl SlidingWindowRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_limits(
            config.max_requests_per_window,
            config.window(),
            config.min_delay(),
        )
    }

    pub fn with_limits(max_requests: u32, window: Duration, min_delay: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            min_delay,
            admission: tokio::sync::Mutex::new(()),
            state: Mutex::new(RateWindow {
                window_start: Instant::now(),
                count: 0,
                next_slot: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RateWindow> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until a request may be issued, then count it against the window.
    ///
    /// Returns how long the caller waited. If `cancel` fires first the window
    /// is left untouched and `TollgateError::Cancelled` is returned.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<Duration, TollgateError> {
        let started = Instant::now();

        let _turn = tokio::select! {
            guard = self.admission.lock() => guard,
            () = cancel.cancelled() => return Err(TollgateError::Cancelled),
        };

        loop {
            match self.poll_admission(Instant::now()) {
                Admission::Ready => break,
                Admission::WaitUntil(deadline) => {
                    debug!(
                        wait_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
                        "rate limiter holding request"
                    );
                    tokio::select! {
                        () = tokio::time::sleep_until(deadline) => {}
                        () = cancel.cancelled() => return Err(TollgateError::Cancelled),
                    }
                }
            }
        }

        Ok(started.elapsed())
    }

    /// Admit if possible; otherwise report when to look again.
    fn poll_admission(&self, now: Instant) -> Admission {
        let mut state = self.lock();

        if let Some(slot) = state.next_slot {
            if now < slot {
                return Admission::WaitUntil(slot);
            }
            state.next_slot = None;
        }

        let elapsed = now.saturating_duration_since(state.window_start);
        if elapsed >= self.window {
            state.window_start = now;
            state.count = 0;
        } else if state.count >= self.max_requests {
            let window_end = state.window_start + self.window;
            // Waiting out a full window restarts it from the end of the wait.
            return Admission::WaitUntil(window_end);
        }

        state.count += 1;
        Admission::Ready
    }

    /// Mark a previously admitted request as finished.
    ///
    /// The next admission will not be granted until `min_delay` has passed.
    pub fn complete(&self) {
        if self.min_delay.is_zero() {
            return;
        }
        let candidate = Instant::now() + self.min_delay;
        let mut state = self.lock();
        state.next_slot = Some(state.next_slot.map_or(candidate, |slot| slot.max(candidate)));
    }

    /// Admissions counted in the current window.
    pub fn in_window(&self) -> u32 {
        let state = self.lock();
        if state.window_start.elapsed() >= self.window {
            0
        } else {
            state.count
        }
    }
}

impl Default for SlidingWindowRateLimiter {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}
