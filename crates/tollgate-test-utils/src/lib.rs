// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tollgate integration tests.
//!
//! Provides scripted collaborators for fast, deterministic, CI-runnable tests
//! without network access or external processes.
//!
//! # Components
//!
//! - [`MockTransport`] - Upstream API transport with queued outcomes
//! - [`MockAuthority`] - Budget authority with queued reports

pub mod mock_authority;
pub mod mock_transport;

pub use mock_authority::MockAuthority;
pub use mock_transport::MockTransport;
