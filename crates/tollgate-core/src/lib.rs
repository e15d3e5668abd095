// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tollgate metered-API client.
//!
//! This crate provides the error taxonomy, the request/response types and
//! the adapter traits shared by every other crate in the workspace.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ErrorKind, TollgateError};
pub use traits::{ApiTransport, BudgetAuthority};
pub use types::{
    ApiRequest, ApiResponse, BudgetReport, BudgetState, QueryOptions, QueryResult, TokenUsage,
};
