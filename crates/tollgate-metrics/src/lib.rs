// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request metrics, threshold alerting and Prometheus export for Tollgate.
//!
//! In-process aggregates ([`MetricsTracker`], [`AlertManager`]) back the
//! client's reports. Every recorded request is also mirrored to the
//! metrics-rs facade, which [`PrometheusExporter`] renders in Prometheus text
//! format when installed.

pub mod alerts;
pub mod recording;
pub mod tracker;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use tollgate_core::TollgateError;

pub use alerts::{Alert, AlertManager, AlertMetric, Severity};
pub use tracker::{
    ErrorCounts, LatencyStats, MetricsSnapshot, MetricsTracker, ModelRequestCounts,
    ModelTokenCounts, RequestCounts, RequestSample, TokenCounts,
};

/// Installed Prometheus recorder.
pub struct PrometheusExporter {
    handle: PrometheusHandle,
}

impl PrometheusExporter {
    /// Install the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn install() -> Result<Self, TollgateError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            TollgateError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
