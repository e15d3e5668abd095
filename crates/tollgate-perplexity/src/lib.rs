// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Perplexity chat-completions transport for Tollgate.
//!
//! Implements [`tollgate_core::ApiTransport`] over reqwest. Admission control,
//! caching and accounting happen in the client that owns this transport.

pub mod client;
pub mod types;

pub use client::{classify_failure, PerplexityClient};
