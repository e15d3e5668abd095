// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Perplexity chat-completions API.
//!
//! Provides [`PerplexityClient`], which builds the request body, attaches
//! bearer authentication and classifies failed responses into
//! [`TollgateError`] variants. It never retries; retry policy belongs to the
//! caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use tracing::{debug, warn};

use tollgate_config::model::ApiConfig;
use tollgate_core::{ApiRequest, ApiResponse, ApiTransport, TollgateError};

use crate::types::{ApiErrorResponse, ChatRequest, ChatResponse};

/// Back-off suggested for a 429 without a usable `Retry-After` header.
pub const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);

/// HTTP transport for the Perplexity API.
#[derive(Debug, Clone)]
pub struct PerplexityClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl PerplexityClient {
    /// Creates a client from the `[api]` configuration section.
    ///
    /// Fails with [`TollgateError::Config`] when no API key is configured.
    pub fn new(config: &ApiConfig) -> Result<Self, TollgateError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                TollgateError::Config(
                    "no API key configured; set api.api_key or PERPLEXITY_API_KEY".into(),
                )
            })?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| TollgateError::Config(format!("invalid API key header value: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let timeout = config.request_timeout();
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| TollgateError::UpstreamFault {
                status: None,
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: config.base_url.clone(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends a non-streaming completion request.
    pub async fn complete(&self, request: &ApiRequest) -> Result<ApiResponse, TollgateError> {
        let body = ChatRequest::from(request);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(status = %status, model = body.model.as_str(), "completion response received");

        if status.is_success() {
            let text = response.text().await.map_err(|e| self.transport_error(e))?;
            let parsed: ChatResponse =
                serde_json::from_str(&text).map_err(|e| TollgateError::UpstreamFault {
                    status: Some(status.as_u16()),
                    message: format!("failed to parse API response: {e}"),
                    source: Some(Box::new(e)),
                })?;
            return parsed.into_api_response().ok_or_else(|| {
                TollgateError::upstream(Some(status.as_u16()), "API response contained no choices")
            });
        }

        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        let error = classify_failure(status, retry_after, &body);
        warn!(status = %status, kind = %error.kind(), "API request failed");
        Err(error)
    }

    fn transport_error(&self, e: reqwest::Error) -> TollgateError {
        if e.is_timeout() {
            return TollgateError::Timeout {
                duration: self.timeout,
            };
        }
        TollgateError::UpstreamFault {
            status: e.status().map(|s| s.as_u16()),
            message: format!("HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

#[async_trait]
impl ApiTransport for PerplexityClient {
    fn name(&self) -> &str {
        "perplexity"
    }

    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TollgateError> {
        self.complete(request).await
    }
}

/// `Retry-After` in whole seconds, if present and numeric.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Map a non-success response onto the error taxonomy.
///
/// 429 is a rate limit and 402 an exhausted quota. 401 is always a bad
/// credential, whatever the body says. 403 is an exhausted quota when the body
/// mentions one and a bad credential otherwise. Any other status whose body
/// mentions a quota is an exhausted quota; the rest are upstream faults.
pub fn classify_failure(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> TollgateError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .map(|e| match e.error.type_ {
            Some(t) => format!("{t}: {}", e.error.message),
            None => e.error.message,
        })
        .unwrap_or_else(|| format!("API returned {status}: {body}"));

    match status {
        StatusCode::TOO_MANY_REQUESTS => TollgateError::UpstreamRateLimited {
            retry_after: retry_after.unwrap_or(DEFAULT_RATE_LIMIT_BACKOFF),
        },
        StatusCode::PAYMENT_REQUIRED => TollgateError::UpstreamQuotaExceeded { message },
        StatusCode::UNAUTHORIZED => TollgateError::InvalidCredential { message },
        _ if mentions_quota(body) => TollgateError::UpstreamQuotaExceeded { message },
        StatusCode::FORBIDDEN => TollgateError::InvalidCredential { message },
        _ => TollgateError::upstream(Some(status.as_u16()), message),
    }
}

fn mentions_quota(body: &str) -> bool {
    body.to_ascii_lowercase().contains("quota")
}
