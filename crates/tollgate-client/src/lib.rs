// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget-aware, fault-isolating client for a metered AI API.
//!
//! [`Client`] decides, for every call, whether the request is attempted now,
//! with which parameters, and how its outcome is accounted for. It composes
//! the response cache, the budget gate, the circuit breaker and the rate
//! limiter in front of an [`tollgate_core::ApiTransport`].

pub mod cache;
pub mod client;
pub mod report;

pub use cache::ResponseCache;
pub use client::{CallStage, Client};
pub use report::{AlertSummary, ClientStats, MonitoringReport};
