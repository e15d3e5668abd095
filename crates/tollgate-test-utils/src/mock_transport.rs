// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock upstream transport for deterministic testing.
//!
//! `MockTransport` implements `ApiTransport` with scripted outcomes, enabling
//! fast, CI-runnable tests without network calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use tollgate_core::{ApiRequest, ApiResponse, ApiTransport, TokenUsage, TollgateError};

type Outcome = Result<ApiResponse, TollgateError>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A mock transport that returns pre-configured outcomes.
///
/// Outcomes are popped from a FIFO queue. When the queue is empty, a
/// default "mock response" answer with 10 input and 20 output tokens is
/// returned.
pub struct MockTransport {
    outcomes: Mutex<VecDeque<Outcome>>,
    requests: Mutex<Vec<ApiRequest>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Sleep this long (on the tokio clock) before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// A successful answer with the default token usage.
    pub fn response(content: &str) -> ApiResponse {
        ApiResponse {
            content: content.to_string(),
            citations: Vec::new(),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 20,
            },
        }
    }

    pub fn push_response(&self, content: &str) {
        self.push(Ok(Self::response(content)));
    }

    pub fn push_error(&self, error: TollgateError) {
        self.push(Err(error));
    }

    /// Queue an arbitrary outcome.
    pub fn push(&self, outcome: Outcome) {
        lock(&self.outcomes).push_back(outcome);
    }

    /// Number of `send` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        lock(&self.requests).last().cloned()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiTransport for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TollgateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = lock(&self.outcomes).pop_front();
        next.unwrap_or_else(|| Ok(Self::response("mock response")))
    }
}
