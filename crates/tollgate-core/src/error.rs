// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tollgate client core.
//!
//! Every failure a caller can observe from [`crate::traits::ApiTransport`],
//! [`crate::traits::BudgetAuthority`] or the orchestrating client is a
//! [`TollgateError`]. The coarse [`ErrorKind`] is what callers branch on when
//! deciding whether and when to retry.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Coarse classification of a [`TollgateError`].
///
/// The string form (`snake_case`) doubles as the error category recorded in
/// request metrics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BudgetExhausted,
    CircuitOpen,
    UpstreamRateLimited,
    UpstreamQuotaExceeded,
    InvalidCredential,
    UpstreamFault,
    Timeout,
    Cancelled,
    Authority,
    Config,
    Internal,
}

/// The primary error type used across the Tollgate workspace.
#[derive(Debug, Error)]
pub enum TollgateError {
    /// Configuration errors (missing credential, invalid option values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Admission denied by the budget gate. Not retried by the client.
    #[error("budget limit reached: {message}")]
    BudgetExhausted { message: String },

    /// Admission denied by the circuit breaker.
    #[error("circuit breaker is open: too many recent failures")]
    CircuitOpen {
        /// Remaining cool-down before a probe request will be admitted.
        retry_after: Option<Duration>,
    },

    /// Upstream answered HTTP 429.
    #[error("upstream rate limit exceeded, retry after {retry_after:?}")]
    UpstreamRateLimited { retry_after: Duration },

    /// Upstream answered HTTP 402 or reported an exhausted quota.
    #[error("upstream quota exceeded: {message}")]
    UpstreamQuotaExceeded { message: String },

    /// Upstream answered HTTP 401. Fatal, never retried.
    #[error("invalid API credential: {message}")]
    InvalidCredential { message: String },

    /// Any other upstream failure (non-success status, transport, decode).
    #[error("upstream request failed: {message}")]
    UpstreamFault {
        status: Option<u16>,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The external call did not finish within its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// The caller cancelled the operation.
    #[error("operation cancelled by caller")]
    Cancelled,

    /// The external budget authority could not be consulted.
    #[error("budget authority unavailable: {message}")]
    Authority {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TollgateError {
    /// Shorthand for an [`TollgateError::UpstreamFault`] without a source.
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::UpstreamFault {
            status,
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for an [`TollgateError::Authority`] without a source.
    pub fn authority(message: impl Into<String>) -> Self {
        Self::Authority {
            message: message.into(),
            source: None,
        }
    }

    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::BudgetExhausted { .. } => ErrorKind::BudgetExhausted,
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::UpstreamRateLimited { .. } => ErrorKind::UpstreamRateLimited,
            Self::UpstreamQuotaExceeded { .. } => ErrorKind::UpstreamQuotaExceeded,
            Self::InvalidCredential { .. } => ErrorKind::InvalidCredential,
            Self::UpstreamFault { .. } => ErrorKind::UpstreamFault,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Authority { .. } => ErrorKind::Authority,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Delay hint for callers that want to retry, where one is known.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::UpstreamRateLimited { retry_after } => Some(*retry_after),
            Self::CircuitOpen { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Whether a later attempt of the same call can reasonably succeed.
    ///
    /// Budget denials, quota exhaustion and bad credentials need operator
    /// action; everything transient is retryable by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::CircuitOpen
                | ErrorKind::UpstreamRateLimited
                | ErrorKind::UpstreamFault
                | ErrorKind::Timeout
        )
    }

    /// Whether the failure originated at the upstream API (as opposed to a
    /// local admission decision or the caller).
    pub fn is_upstream(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::UpstreamRateLimited
                | ErrorKind::UpstreamQuotaExceeded
                | ErrorKind::InvalidCredential
                | ErrorKind::UpstreamFault
                | ErrorKind::Timeout
        )
    }
}
