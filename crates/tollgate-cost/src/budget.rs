// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spend gate backed by an external budget authority.
//!
//! The authority is consulted at most once per `min_check_interval`; between
//! refreshes the cached snapshot is returned unchanged. When the authority
//! cannot be reached the gate either fails open (state `WARNING`, requests
//! proceed) or fails closed (state `UNKNOWN`, requests are refused),
//! depending on `budget.fail_open_on_authority_error`.
//!
//! An upstream "quota exhausted" response latches the gate closed until the
//! next successful authority check, regardless of the fail-open setting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use tollgate_config::model::BudgetConfig;
use tollgate_core::{BudgetAuthority, BudgetReport, BudgetState};

/// Last known budget standing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSnapshot {
    pub can_proceed: bool,
    pub usage_percentage: f64,
    pub remaining_amount: f64,
    pub state: BudgetState,
    pub checked_at: Option<DateTime<Utc>>,
}

impl BudgetSnapshot {
    fn from_report(report: &BudgetReport, checked_at: DateTime<Utc>) -> Self {
        Self {
            can_proceed: report.can_proceed,
            usage_percentage: report.usage_percentage,
            remaining_amount: report.remaining_amount,
            state: BudgetState::from_authority(&report.state),
            checked_at: Some(checked_at),
        }
    }
}

impl Default for BudgetSnapshot {
    /// Snapshot before the first check: nothing is known yet.
    fn default() -> Self {
        Self {
            can_proceed: false,
            usage_percentage: 0.0,
            remaining_amount: 0.0,
            state: BudgetState::Unknown,
            checked_at: None,
        }
    }
}

#[derive(Debug, Default)]
struct GateState {
    snapshot: BudgetSnapshot,
    refreshed_at: Option<Instant>,
}

/// Rate-limited, cached view of the external budget authority.
pub struct BudgetGate {
    authority: Arc<dyn BudgetAuthority>,
    min_check_interval: Duration,
    fail_open: bool,
    // Held across the authority call so concurrent callers share one query.
    state: Mutex<GateState>,
    // Epoch of the latest upstream quota report; 0 while the latch is open.
    quota_latch: AtomicU64,
    quota_marks: AtomicU64,
    checks: AtomicU64,
}

impl BudgetGate {
    pub fn new(config: &BudgetConfig, authority: Arc<dyn BudgetAuthority>) -> Self {
        Self::with_policy(
            authority,
            config.min_check_interval(),
            config.fail_open_on_authority_error,
        )
    }

    pub fn with_policy(
        authority: Arc<dyn BudgetAuthority>,
        min_check_interval: Duration,
        fail_open: bool,
    ) -> Self {
        Self {
            authority,
            min_check_interval,
            fail_open,
            state: Mutex::new(GateState::default()),
            quota_latch: AtomicU64::new(0),
            quota_marks: AtomicU64::new(0),
            checks: AtomicU64::new(0),
        }
    }

    /// Current budget standing, refreshing from the authority when stale.
    pub async fn check(&self) -> BudgetSnapshot {
        self.checks.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock().await;
        let fresh = state
            .refreshed_at
            .is_some_and(|at| at.elapsed() < self.min_check_interval);

        if !fresh {
            self.refresh(&mut state).await;
        }

        self.with_latch(state.snapshot.clone())
    }

    async fn refresh(&self, state: &mut GateState) {
        let now = Utc::now();
        let latch_seen = self.quota_latch.load(Ordering::SeqCst);
        match self.authority.fetch().await {
            Ok(report) => {
                // Only a report that started after the latest quota mark may clear it.
                if self
                    .quota_latch
                    .compare_exchange(latch_seen, 0, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    debug!("upstream quota exhausted during refresh; latch kept");
                }
                state.snapshot = BudgetSnapshot::from_report(&report, now);
                info!(
                    authority = self.authority.name(),
                    can_proceed = state.snapshot.can_proceed,
                    usage_pct = state.snapshot.usage_percentage,
                    state = %state.snapshot.state,
                    "budget refreshed"
                );
            }
            Err(e) => {
                let snapshot = &mut state.snapshot;
                snapshot.checked_at = Some(now);
                if self.fail_open {
                    snapshot.state = BudgetState::Warning;
                    snapshot.can_proceed = true;
                    warn!(error = %e, "budget check failed; proceeding with caution");
                } else {
                    snapshot.state = BudgetState::Unknown;
                    snapshot.can_proceed = false;
                    warn!(error = %e, "budget check failed; refusing requests until it recovers");
                }
            }
        }
        state.refreshed_at = Some(Instant::now());
        tollgate_metrics::recording::set_budget_usage(state.snapshot.usage_percentage);
    }

    fn with_latch(&self, mut snapshot: BudgetSnapshot) -> BudgetSnapshot {
        if self.quota_latched() {
            snapshot.can_proceed = false;
        }
        snapshot
    }

    /// The upstream reported an exhausted quota; refuse until the authority
    /// next reports success.
    pub fn mark_quota_exhausted(&self) {
        let epoch = self.quota_marks.fetch_add(1, Ordering::SeqCst) + 1;
        if self.quota_latch.swap(epoch, Ordering::SeqCst) == 0 {
            warn!("upstream quota exhausted; budget gate closed until next successful check");
        }
    }

    pub fn quota_latched(&self) -> bool {
        self.quota_latch.load(Ordering::SeqCst) != 0
    }

    /// Last snapshot without consulting the authority.
    pub async fn snapshot(&self) -> BudgetSnapshot {
        let state = self.state.lock().await;
        self.with_latch(state.snapshot.clone())
    }

    /// Number of `check` calls so far.
    pub fn checks(&self) -> u64 {
        self.checks.load(Ordering::Relaxed)
    }
}
