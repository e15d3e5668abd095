// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget authority backed by an external command.
//!
//! The command prints a JSON object on stdout:
//! `{"can_proceed": true, "remaining_amount": 12.5, "usage_percentage": 37.5, "state": "OK"}`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use tollgate_config::model::BudgetConfig;
use tollgate_core::{BudgetAuthority, BudgetReport, TollgateError};

/// Runs a configured program and parses its JSON budget report.
#[derive(Debug, Clone)]
pub struct CommandAuthority {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAuthority {
    /// Build from `budget.authority_command` and `budget.authority_timeout_ms`.
    pub fn new(config: &BudgetConfig) -> Result<Self, TollgateError> {
        let (program, args) = config
            .authority_command
            .split_first()
            .ok_or_else(|| TollgateError::Config("budget.authority_command is empty".into()))?;
        Ok(Self::with_command(program.clone(), args.to_vec(), config.authority_timeout()))
    }

    pub fn with_command(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }
}

#[async_trait]
impl BudgetAuthority for CommandAuthority {
    fn name(&self) -> &str {
        "command"
    }

    async fn fetch(&self) -> Result<BudgetReport, TollgateError> {
        let child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                TollgateError::authority(format!(
                    "`{}` timed out after {}ms",
                    self.program,
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| TollgateError::Authority {
                message: format!("failed to run `{}`", self.program),
                source: Some(Box::new(e)),
            })?;

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TollgateError::authority(format!(
                "`{}` exited with code {exit_code}: {}",
                self.program,
                stderr.trim()
            )));
        }

        let report: BudgetReport =
            serde_json::from_slice(&output.stdout).map_err(|e| TollgateError::Authority {
                message: "budget report is not valid JSON".into(),
                source: Some(Box::new(e)),
            })?;

        debug!(
            program = self.program.as_str(),
            usage_pct = report.usage_percentage,
            state = report.state.as_str(),
            "budget authority responded"
        );
        Ok(report)
    }
}
