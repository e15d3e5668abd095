// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget-aware request downgrade.
//!
//! Once budget usage passes the threshold, requests are switched to the
//! economy model and their output is capped.

use tollgate_config::model::{ApiConfig, BudgetConfig};
use tollgate_core::ApiRequest;

use crate::budget::BudgetSnapshot;

/// When and how to downgrade.
#[derive(Debug, Clone, PartialEq)]
pub struct DowngradePolicy {
    /// Usage percentage strictly above which requests are downgraded.
    pub threshold_pct: f64,
    pub economy_model: String,
    pub max_tokens: u32,
}

impl DowngradePolicy {
    pub fn new(api: &ApiConfig, budget: &BudgetConfig) -> Self {
        Self {
            threshold_pct: budget.downgrade_threshold_pct,
            economy_model: api.economy_model.clone(),
            max_tokens: budget.downgraded_max_tokens,
        }
    }

    pub fn applies_to(&self, snapshot: &BudgetSnapshot) -> bool {
        snapshot.usage_percentage > self.threshold_pct
    }
}

impl Default for DowngradePolicy {
    fn default() -> Self {
        Self::new(&ApiConfig::default(), &BudgetConfig::default())
    }
}

/// Rewrite `request` for the current budget standing.
///
/// Pure: the same snapshot and request always yield the same result.
pub fn adapt_request(
    policy: &DowngradePolicy,
    snapshot: &BudgetSnapshot,
    request: &ApiRequest,
) -> ApiRequest {
    let mut adapted = request.clone();
    if policy.applies_to(snapshot) {
        adapted.model = policy.economy_model.clone();
        adapted.max_tokens = request.max_tokens.min(policy.max_tokens);
    }
    adapted
}
