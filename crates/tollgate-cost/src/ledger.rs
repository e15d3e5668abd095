// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory spend ledger.
//!
//! Every successful upstream call is priced and added to a running total and
//! a per-model total. Totals only grow until [`CostTracker::reset`].

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use tollgate_config::model::{ModelPrice, PricingConfig};
use tollgate_core::TokenUsage;

use crate::pricing::{calculate_cost, PriceTable};

/// Accumulated spend in USD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostLedger {
    pub total: f64,
    pub by_model: BTreeMap<String, f64>,
}

/// Display form of the ledger, rounded to four decimals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostSummary {
    pub total: f64,
    pub by_model: BTreeMap<String, f64>,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Prices calls and keeps the ledger.
#[derive(Debug)]
pub struct CostTracker {
    prices: PriceTable,
    ledger: Mutex<CostLedger>,
}

impl CostTracker {
    pub fn new(config: &PricingConfig) -> Self {
        Self::with_prices(PriceTable::new(config))
    }

    pub fn with_prices(prices: PriceTable) -> Self {
        Self {
            prices,
            ledger: Mutex::new(CostLedger::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CostLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn price(&self, model: &str) -> Option<&ModelPrice> {
        self.prices.get(model)
    }

    /// Cost of a call without recording it. Unknown models cost 0.
    pub fn calculate_cost(&self, model: &str, usage: &TokenUsage) -> f64 {
        self.prices
            .get(model)
            .map_or(0.0, |price| calculate_cost(usage, price))
    }

    /// Price a call, add it to the ledger and return its cost in USD.
    ///
    /// A model missing from the price table is recorded at zero cost with a
    /// warning.
    pub fn record_cost(&self, model: &str, tokens_in: u32, tokens_out: u32) -> f64 {
        let usage = TokenUsage {
            input_tokens: tokens_in,
            output_tokens: tokens_out,
        };
        let cost = match self.prices.get(model) {
            Some(price) => calculate_cost(&usage, price),
            None => {
                warn!(model, "no pricing data for model; recording zero cost");
                0.0
            }
        };

        {
            let mut ledger = self.lock();
            ledger.total += cost;
            *ledger.by_model.entry(model.to_string()).or_default() += cost;
        }

        debug!(model, tokens_in, tokens_out, cost_usd = cost, "recorded call cost");
        tollgate_metrics::recording::record_cost(model, cost);
        cost
    }

    /// Exact running totals.
    pub fn ledger(&self) -> CostLedger {
        self.lock().clone()
    }

    pub fn total(&self) -> f64 {
        self.lock().total
    }

    pub fn summary(&self) -> CostSummary {
        let ledger = self.lock();
        CostSummary {
            total: round4(ledger.total),
            by_model: ledger
                .by_model
                .iter()
                .map(|(model, cost)| (model.clone(), round4(*cost)))
                .collect(),
        }
    }

    pub fn reset(&self) {
        *self.lock() = CostLedger::default();
    }
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new(&PricingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn record_cost_prices_per_thousand_tokens() {
        let mut prices = PriceTable::default();
        prices.insert("model", ModelPrice::new(0.003, 0.015));
        let tracker = CostTracker::with_prices(prices);

        let cost = tracker.record_cost("model", 2000, 1000);
        assert!((cost - 0.021).abs() < 1e-10, "got {cost}");
        assert!((tracker.total() - 0.021).abs() < 1e-10);
    }

    #[test]
    fn totals_accumulate_per_model() {
        let tracker = CostTracker::default();
        tracker.record_cost("sonar-pro", 1000, 1000);
        tracker.record_cost("sonar-pro", 1000, 1000);
        tracker.record_cost("sonar", 1000, 0);

        let ledger = tracker.ledger();
        assert!((ledger.by_model["sonar-pro"] - 0.036).abs() < 1e-10);
        assert!((ledger.by_model["sonar"] - 0.001).abs() < 1e-10);
        assert!((ledger.total - 0.037).abs() < 1e-10);
    }

    #[traced_test]
    #[test]
    fn unknown_model_costs_nothing_and_warns() {
        let tracker = CostTracker::default();
        let cost = tracker.record_cost("mystery-model", 5000, 5000);
        assert_eq!(cost, 0.0);
        assert_eq!(tracker.total(), 0.0);
        // The model still appears in the ledger with zero spend.
        assert_eq!(tracker.ledger().by_model.get("mystery-model"), Some(&0.0));
        assert!(logs_contain("no pricing data for model"));
    }

    #[test]
    fn summary_rounds_to_four_decimals() {
        let mut prices = PriceTable::default();
        prices.insert("tiny", ModelPrice::new(0.00025, 0.00125));
        let tracker = CostTracker::with_prices(prices);
        tracker.record_cost("tiny", 400, 700);

        let exact = tracker.total();
        let summary = tracker.summary();
        assert!((summary.total - round4(exact)).abs() < f64::EPSILON);
        assert!((summary.total - 0.001).abs() < 1e-12);
        assert!((summary.by_model["tiny"] - 0.001).abs() < 1e-12);
    }

    #[test]
    fn calculate_cost_does_not_record() {
        let tracker = CostTracker::default();
        let usage = TokenUsage {
            input_tokens: 1000,
            output_tokens: 0,
        };
        assert!((tracker.calculate_cost("sonar", &usage) - 0.001).abs() < 1e-10);
        assert_eq!(tracker.total(), 0.0);
    }

    #[test]
    fn reset_clears_ledger() {
        let tracker = CostTracker::default();
        tracker.record_cost("sonar", 1000, 1000);
        tracker.reset();
        assert_eq!(tracker.ledger(), CostLedger::default());
    }
}
