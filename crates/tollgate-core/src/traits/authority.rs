// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter for the external spend authority consulted by the budget gate.

use async_trait::async_trait;

use crate::error::TollgateError;
use crate::types::BudgetReport;

/// Reports remaining spend for the metered API.
///
/// Any error (unreachable authority, malformed output) is treated as an
/// authority outage by the budget gate.
#[async_trait]
pub trait BudgetAuthority: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<BudgetReport, TollgateError>;
}
