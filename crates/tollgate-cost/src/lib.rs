// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost tracking, budget gating, and pricing for the Tollgate client.
//!
//! This crate provides:
//! - **Pricing**: per-model USD prices per thousand tokens
//! - **Cost tracker**: running spend totals, overall and per model
//! - **Budget gate**: cached, rate-limited view of an external budget authority
//! - **Downgrade**: economy-model substitution when the budget runs low

pub mod authority;
pub mod budget;
pub mod downgrade;
pub mod ledger;
pub mod pricing;

pub use authority::CommandAuthority;
pub use budget::{BudgetGate, BudgetSnapshot};
pub use downgrade::{adapt_request, DowngradePolicy};
pub use ledger::{CostLedger, CostSummary, CostTracker};
pub use pricing::{calculate_cost, PriceTable};
