// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tollgate query` command implementation.
//!
//! Builds a client from configuration, runs one query through the admission
//! pipeline and prints the answer. Ctrl-C cancels the in-flight call.

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tollgate_client::Client;
use tollgate_config::TollgateConfig;
use tollgate_core::{QueryOptions, TollgateError};

/// Arguments for `tollgate query`.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// The question to send.
    pub text: String,

    /// Model to request (defaults to `api.default_model`).
    #[arg(long)]
    pub model: Option<String>,

    /// Output token cap (defaults to `api.default_max_tokens`).
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Override the configured system prompt.
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Restrict search to this domain. Repeatable.
    #[arg(long)]
    pub domain: Vec<String>,

    /// Emit the result as JSON.
    #[arg(long)]
    pub json: bool,

    /// Print the monitoring report after the answer.
    #[arg(long)]
    pub report: bool,
}

impl QueryArgs {
    fn options(&self) -> QueryOptions {
        let mut options = QueryOptions::default().with_domains(self.domain.clone());
        if let Some(model) = &self.model {
            options = options.with_model(model.clone());
        }
        if let Some(max_tokens) = self.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }
        if let Some(prompt) = &self.system_prompt {
            options = options.with_system_prompt(prompt.clone());
        }
        options
    }
}

/// Run the `tollgate query` command.
pub async fn run_query(config: &TollgateConfig, args: QueryArgs) -> Result<(), TollgateError> {
    let client = Client::from_config(config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling query");
            on_interrupt.cancel();
        }
    });

    let result = client
        .query_with_cancel(&args.text, args.options(), cancel)
        .await;

    let stats = client.stats().await;
    debug!(
        total = stats.total_requests,
        failed = stats.failed_requests,
        circuit = %stats.circuit_state,
        "query finished"
    );

    let result = result?;
    if args.json {
        println!("{}", to_json(&result)?);
    } else {
        println!("{}", result.content);
        if !result.citations.is_empty() {
            println!();
            println!("Sources:");
            for (i, citation) in result.citations.iter().enumerate() {
                println!("  [{}] {citation}", i + 1);
            }
        }
        eprintln!(
            "model={} tokens={} cost=${:.4}",
            result.model,
            result.usage.total(),
            client.costs().total()
        );
    }

    if args.report {
        println!("{}", to_json(&client.report())?);
    }
    Ok(())
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, TollgateError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| TollgateError::Internal(format!("failed to serialize output: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> QueryArgs {
        QueryArgs {
            text: "What is Rust?".into(),
            model: None,
            max_tokens: None,
            system_prompt: None,
            domain: Vec::new(),
            json: false,
            report: false,
        }
    }

    #[test]
    fn unset_flags_leave_options_to_config() {
        let options = args().options();
        assert_eq!(options, QueryOptions::default());
    }

    #[test]
    fn flags_map_onto_options() {
        let options = QueryArgs {
            model: Some("sonar".into()),
            max_tokens: Some(256),
            domain: vec!["docs.rs".into()],
            ..args()
        }
        .options();
        assert_eq!(options.model.as_deref(), Some("sonar"));
        assert_eq!(options.max_tokens, Some(256));
        assert_eq!(options.domains, vec!["docs.rs".to_string()]);
    }

    #[tokio::test]
    async fn query_without_api_key_fails_before_network() {
        let mut config = TollgateConfig::default();
        config.api.api_key = None;
        let err = run_query(&config, args()).await.unwrap_err();
        assert!(matches!(err, TollgateError::Config(_)));
    }
}
