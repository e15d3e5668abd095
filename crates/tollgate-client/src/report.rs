// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client statistics and monitoring reports.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use tollgate_core::BudgetState;
use tollgate_cost::CostSummary;
use tollgate_metrics::{Alert, MetricsSnapshot, Severity};
use tollgate_resilience::CircuitState;

/// Call outcome counters for one client.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub total_requests: AtomicU64,
    pub successful_requests: AtomicU64,
    pub failed_requests: AtomicU64,
    pub cached_responses: AtomicU64,
    pub blocked_by_circuit_breaker: AtomicU64,
    pub blocked_by_budget: AtomicU64,
}

impl StatsCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Point-in-time client statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cached_responses: u64,
    pub budget_checks: u64,
    pub blocked_by_circuit_breaker: u64,
    pub blocked_by_budget: u64,
    /// Successful upstream calls as a percentage of all queries.
    pub success_rate: f64,
    pub circuit_state: CircuitState,
    pub budget_state: BudgetState,
    pub budget_usage: f64,
}

impl ClientStats {
    pub(crate) fn collect(
        counters: &StatsCounters,
        budget_checks: u64,
        circuit_state: CircuitState,
        budget_state: BudgetState,
        budget_usage: f64,
    ) -> Self {
        let total_requests = StatsCounters::read(&counters.total_requests);
        let successful_requests = StatsCounters::read(&counters.successful_requests);
        let success_rate = if total_requests > 0 {
            successful_requests as f64 / total_requests as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_requests,
            successful_requests,
            failed_requests: StatsCounters::read(&counters.failed_requests),
            cached_responses: StatsCounters::read(&counters.cached_responses),
            budget_checks,
            blocked_by_circuit_breaker: StatsCounters::read(&counters.blocked_by_circuit_breaker),
            blocked_by_budget: StatsCounters::read(&counters.blocked_by_budget),
            success_rate,
            circuit_state,
            budget_state,
            budget_usage,
        }
    }
}

/// Alert log section of a [`MonitoringReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub items: Vec<Alert>,
}

impl AlertSummary {
    pub fn from_alerts(items: Vec<Alert>) -> Self {
        let count = |severity| items.iter().filter(|a| a.severity == severity).count();
        Self {
            total: items.len(),
            high: count(Severity::High),
            medium: count(Severity::Medium),
            low: count(Severity::Low),
            items,
        }
    }
}

/// Full monitoring report: metrics, spend and alerts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringReport {
    pub timestamp: DateTime<Utc>,
    pub metrics: MetricsSnapshot,
    pub costs: CostSummary,
    pub alerts: AlertSummary,
}
