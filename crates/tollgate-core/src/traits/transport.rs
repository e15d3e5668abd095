// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport adapter for the external AI API.

use async_trait::async_trait;

use crate::error::TollgateError;
use crate::types::{ApiRequest, ApiResponse};

/// Sends one fully resolved request to the upstream AI API.
///
/// Implementations classify upstream failures into the
/// [`TollgateError`] taxonomy (429, 402, 401, other) and never retry on
/// their own; retry policy belongs to the caller.
#[async_trait]
pub trait ApiTransport: Send + Sync + 'static {
    /// Human-readable name of the transport (used in logs).
    fn name(&self) -> &str;

    /// Performs the call and returns the decoded response.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TollgateError>;
}
