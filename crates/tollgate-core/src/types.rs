// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the admission pipeline and its adapters.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Token usage reported by the upstream API for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        u64::from(self.input_tokens) + u64::from(self.output_tokens)
    }
}

/// Per-call options supplied by the caller of `Client::query`.
///
/// Unset fields fall back to the client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    /// Restrict upstream search to these domains.
    pub domains: Vec<String>,
    pub return_citations: bool,
    /// Overrides the configured dispatch timeout.
    pub timeout: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: None,
            system_prompt: None,
            temperature: None,
            domains: Vec::new(),
            return_citations: true,
            timeout: None,
        }
    }
}

impl QueryOptions {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_domains(mut self, domains: Vec<String>) -> Self {
        self.domains = domains;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fully resolved request handed to an [`crate::traits::ApiTransport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_message: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub return_citations: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_filter: Vec<String>,
}

/// The decoded upstream answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub content: String,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub usage: TokenUsage,
}

/// What `Client::query` hands back to the caller (and what the cache stores).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub content: String,
    pub citations: Vec<String>,
    /// The model that actually served the call, after any budget downgrade.
    pub model: String,
    pub usage: TokenUsage,
    pub timestamp: DateTime<Utc>,
}

impl QueryResult {
    pub fn from_response(response: ApiResponse, model: String) -> Self {
        Self {
            content: response.content,
            citations: response.citations,
            model,
            usage: response.usage,
            timestamp: Utc::now(),
        }
    }
}

/// Budget state as reported by the external spend authority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetState {
    Ok,
    Warning,
    Unknown,
}

impl BudgetState {
    /// Lenient parse of the authority's free-form state string.
    ///
    /// Anything that is not recognizably `OK` or `WARNING` maps to `Unknown`.
    pub fn from_authority(state: &str) -> Self {
        state.trim().parse().unwrap_or(BudgetState::Unknown)
    }
}

/// Raw report returned by a [`crate::traits::BudgetAuthority`].
///
/// Field names follow the authority's JSON output. Missing fields take the
/// most conservative value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BudgetReport {
    #[serde(default)]
    pub can_proceed: bool,
    #[serde(default)]
    pub remaining_amount: f64,
    #[serde(default)]
    pub usage_percentage: f64,
    #[serde(default = "unknown_state")]
    pub state: String,
}

fn unknown_state() -> String {
    "UNKNOWN".to_string()
}
