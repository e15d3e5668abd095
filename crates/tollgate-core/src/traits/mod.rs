// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the external collaborators of the client.
//!
//! Both traits use `#[async_trait]` so implementations can be held as
//! `Arc<dyn Trait>` by the orchestrator.

pub mod authority;
pub mod transport;

pub use authority::BudgetAuthority;
pub use transport::ApiTransport;
