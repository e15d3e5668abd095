// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Threshold alerting over metrics snapshots.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use tollgate_config::model::AlertsConfig;
use tollgate_core::TollgateError;

use crate::recording;
use crate::tracker::MetricsSnapshot;

/// Alert severity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Metric an alert was raised on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertMetric {
    ErrorRate,
    LatencyP95,
}

impl AlertMetric {
    /// Parse a threshold name; camelCase aliases are accepted.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "error_rate" | "errorRate" => Some(Self::ErrorRate),
            "latency_p95" | "latencyP95" => Some(Self::LatencyP95),
            _ => None,
        }
    }
}

/// An immutable threshold breach record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub severity: Severity,
    pub metric: AlertMetric,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct AlertState {
    error_rate_threshold: f64,
    latency_p95_threshold: f64,
    log: Vec<Alert>,
}

/// Evaluates snapshots against thresholds and keeps the alert log.
#[derive(Debug)]
pub struct AlertManager {
    state: Mutex<AlertState>,
}

impl AlertManager {
    pub fn new(config: &AlertsConfig) -> Self {
        Self {
            state: Mutex::new(AlertState {
                error_rate_threshold: config.error_rate_threshold_pct,
                latency_p95_threshold: config.latency_p95_threshold_ms as f64,
                log: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AlertState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raise alerts for every threshold the snapshot breaches.
    ///
    /// New alerts are appended to the log and returned.
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Vec<Alert> {
        let mut state = self.lock();
        let now = Utc::now();
        let mut raised = Vec::new();

        if snapshot.error_rate > state.error_rate_threshold {
            raised.push(Alert {
                severity: Severity::High,
                metric: AlertMetric::ErrorRate,
                value: snapshot.error_rate,
                threshold: state.error_rate_threshold,
                message: format!(
                    "error rate ({:.2}%) exceeds threshold ({}%)",
                    snapshot.error_rate, state.error_rate_threshold
                ),
                timestamp: now,
            });
        }

        let p95 = snapshot.latency.p95 as f64;
        if p95 > state.latency_p95_threshold {
            raised.push(Alert {
                severity: Severity::Medium,
                metric: AlertMetric::LatencyP95,
                value: p95,
                threshold: state.latency_p95_threshold,
                message: format!(
                    "p95 latency ({}ms) exceeds threshold ({}ms)",
                    snapshot.latency.p95, state.latency_p95_threshold
                ),
                timestamp: now,
            });
        }

        for alert in &raised {
            warn!(
                severity = %alert.severity,
                metric = %alert.metric,
                value = alert.value,
                threshold = alert.threshold,
                "{}",
                alert.message
            );
            recording::record_alert(&alert.severity.to_string());
        }

        state.log.extend(raised.iter().cloned());
        raised
    }

    /// Change a threshold by name (`error_rate` or `latency_p95`).
    pub fn set_threshold(&self, name: &str, value: f64) -> Result<(), TollgateError> {
        let metric = AlertMetric::from_name(name)
            .ok_or_else(|| TollgateError::Config(format!("unknown alert threshold `{name}`")))?;
        let mut state = self.lock();
        match metric {
            AlertMetric::ErrorRate => state.error_rate_threshold = value,
            AlertMetric::LatencyP95 => state.latency_p95_threshold = value,
        }
        Ok(())
    }

    pub fn threshold(&self, metric: AlertMetric) -> f64 {
        let state = self.lock();
        match metric {
            AlertMetric::ErrorRate => state.error_rate_threshold,
            AlertMetric::LatencyP95 => state.latency_p95_threshold,
        }
    }

    /// All alerts, or only those of `severity`.
    pub fn alerts(&self, severity: Option<Severity>) -> Vec<Alert> {
        let state = self.lock();
        state
            .log
            .iter()
            .filter(|a| severity.is_none_or(|s| a.severity == s))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lock().log.clear();
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(&AlertsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::LatencyStats;
    use tracing_test::traced_test;

    fn snapshot(error_rate: f64, p95: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            error_rate,
            latency: LatencyStats {
                p95,
                ..LatencyStats::default()
            },
            ..MetricsSnapshot::default()
        }
    }

    #[test]
    fn healthy_snapshot_raises_nothing() {
        let manager = AlertManager::default();
        assert!(manager.evaluate(&snapshot(5.0, 5000)).is_empty());
        assert!(manager.alerts(None).is_empty());
    }

    #[test]
    fn error_rate_breach_is_high_severity() {
        let manager = AlertManager::default();
        let raised = manager.evaluate(&snapshot(25.0, 100));
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].severity, Severity::High);
        assert_eq!(raised[0].metric, AlertMetric::ErrorRate);
        assert_eq!(raised[0].threshold, 5.0);
        assert!(raised[0].message.contains("25.00%"));
    }

    #[test]
    fn latency_breach_is_medium_severity() {
        let manager = AlertManager::default();
        let raised = manager.evaluate(&snapshot(0.0, 7000));
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].severity, Severity::Medium);
        assert_eq!(raised[0].value, 7000.0);
    }

    #[test]
    fn alerts_accumulate_and_filter_by_severity() {
        let manager = AlertManager::default();
        manager.evaluate(&snapshot(10.0, 9000));
        manager.evaluate(&snapshot(10.0, 0));

        assert_eq!(manager.alerts(None).len(), 3);
        assert_eq!(manager.alerts(Some(Severity::High)).len(), 2);
        assert_eq!(manager.alerts(Some(Severity::Medium)).len(), 1);
        assert!(manager.alerts(Some(Severity::Low)).is_empty());

        manager.clear();
        assert!(manager.alerts(None).is_empty());
    }

    #[test]
    fn set_threshold_accepts_both_spellings() {
        let manager = AlertManager::default();
        manager.set_threshold("error_rate", 50.0).unwrap();
        manager.set_threshold("latencyP95", 100.0).unwrap();
        assert_eq!(manager.threshold(AlertMetric::ErrorRate), 50.0);
        assert_eq!(manager.threshold(AlertMetric::LatencyP95), 100.0);

        let raised = manager.evaluate(&snapshot(25.0, 150));
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].metric, AlertMetric::LatencyP95);
    }

    #[test]
    fn unknown_threshold_is_a_config_error() {
        let manager = AlertManager::default();
        let err = manager.set_threshold("cost_per_hour", 1.0).unwrap_err();
        assert!(matches!(err, TollgateError::Config(_)));
    }

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!(Severity::Medium.to_string(), "medium");
    }

    #[traced_test]
    #[test]
    fn alerts_are_logged() {
        let manager = AlertManager::default();
        manager.evaluate(&snapshot(12.0, 0));
        assert!(logs_contain("error rate (12.00%) exceeds threshold"));
    }
}
