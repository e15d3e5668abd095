// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock budget authority with scripted reports.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use tollgate_core::{BudgetAuthority, BudgetReport, TollgateError};

type Outcome = Result<BudgetReport, TollgateError>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A budget authority that replays queued outcomes.
///
/// Once the queue is drained it keeps answering with the fallback report,
/// or with an authority error when no fallback was given.
pub struct MockAuthority {
    outcomes: Mutex<VecDeque<Outcome>>,
    fallback: Option<BudgetReport>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockAuthority {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            fallback: None,
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// An authority that always answers with `report`.
    pub fn reporting(report: BudgetReport) -> Self {
        Self {
            fallback: Some(report),
            ..Self::new()
        }
    }

    /// An authority with plenty of budget left.
    pub fn healthy() -> Self {
        Self::reporting(BudgetReport {
            can_proceed: true,
            remaining_amount: 100.0,
            usage_percentage: 10.0,
            state: "OK".to_string(),
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_report(&self, report: BudgetReport) {
        lock(&self.outcomes).push_back(Ok(report));
    }

    pub fn push_error(&self, error: TollgateError) {
        lock(&self.outcomes).push_back(Err(error));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockAuthority {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BudgetAuthority for MockAuthority {
    fn name(&self) -> &str {
        "mock-authority"
    }

    async fn fetch(&self) -> Result<BudgetReport, TollgateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = lock(&self.outcomes).pop_front();
        match next {
            Some(outcome) => outcome,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| TollgateError::authority("mock authority has no report")),
        }
    }
}
