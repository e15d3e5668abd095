// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tollgate budget` command implementation.

use std::sync::Arc;

use tollgate_config::TollgateConfig;
use tollgate_core::TollgateError;
use tollgate_cost::{BudgetGate, BudgetSnapshot, CommandAuthority};

use crate::query::to_json;

/// Run the `tollgate budget` command.
///
/// Consults the configured authority once and prints the resulting standing,
/// with the same fail-open policy the client applies.
pub async fn run_budget(config: &TollgateConfig, json: bool) -> Result<(), TollgateError> {
    let authority = Arc::new(CommandAuthority::new(&config.budget)?);
    let gate = BudgetGate::new(&config.budget, authority);
    let snapshot = gate.check().await;

    if json {
        println!("{}", to_json(&snapshot)?);
    } else {
        println!("{}", format_snapshot(&snapshot));
    }
    Ok(())
}

fn format_snapshot(snapshot: &BudgetSnapshot) -> String {
    let verdict = if snapshot.can_proceed {
        "requests allowed"
    } else {
        "requests refused"
    };
    format!(
        "budget: {} ({verdict})\n  usage:     {:.1}%\n  remaining: ${:.2}",
        snapshot.state, snapshot.usage_percentage, snapshot.remaining_amount
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::BudgetState;

    #[test]
    fn formats_snapshot_for_humans() {
        let snapshot = BudgetSnapshot {
            can_proceed: true,
            usage_percentage: 42.5,
            remaining_amount: 57.5,
            state: BudgetState::Ok,
            checked_at: None,
        };
        let text = format_snapshot(&snapshot);
        assert!(text.starts_with("budget: OK (requests allowed)"));
        assert!(text.contains("42.5%"));
        assert!(text.contains("$57.50"));
    }

    #[tokio::test]
    async fn budget_without_authority_command_is_a_config_error() {
        let mut config = TollgateConfig::default();
        config.budget.authority_command.clear();
        let err = run_budget(&config, false).await.unwrap_err();
        assert!(matches!(err, TollgateError::Config(_)));
    }
}
