// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model pricing tables and cost calculation.
//!
//! Prices are USD per thousand tokens and come from `[pricing.models]`. The
//! built-in table covers the Perplexity Sonar family and the Claude models:
//!
//! sonar:               input=$0.001/KTok,  output=$0.001/KTok
//! sonar-pro:           input=$0.003/KTok,  output=$0.015/KTok
//! claude-sonnet-4-5:   input=$0.003/KTok,  output=$0.015/KTok
//! claude-opus-4-1:     input=$0.015/KTok,  output=$0.075/KTok

use std::collections::BTreeMap;

use tollgate_config::model::{ModelPrice, PricingConfig};
use tollgate_core::TokenUsage;

/// Exact-match lookup from model identifier to price.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    models: BTreeMap<String, ModelPrice>,
}

impl PriceTable {
    pub fn new(config: &PricingConfig) -> Self {
        Self {
            models: config.models.clone(),
        }
    }

    /// Price for `model`, if configured.
    pub fn get(&self, model: &str) -> Option<&ModelPrice> {
        self.models.get(model)
    }

    /// Add or replace a model's price.
    pub fn insert(&mut self, model: impl Into<String>, price: ModelPrice) {
        self.models.insert(model.into(), price);
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

/// Calculate cost in USD for a given token usage and price.
///
/// Formula: (tokens / 1000) * price_per_thousand for input and output.
pub fn calculate_cost(usage: &TokenUsage, price: &ModelPrice) -> f64 {
    let input = (usage.input_tokens as f64 / 1000.0) * price.input_per_ktok;
    let output = (usage.output_tokens as f64 / 1000.0) * price.output_per_ktok;
    input + output
}
