// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tollgate.toml` > `~/.config/tollgate/tollgate.toml`
//! > `/etc/tollgate/tollgate.toml` with environment variable overrides via the
//! `TOLLGATE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::TollgateConfig;

/// Config sections, in the order they are matched against env var names.
///
/// `circuit_breaker` and `rate_limit` contain underscores themselves, so the
/// env mapping matches whole section prefixes instead of splitting on `_`.
const SECTIONS: &[&str] = &[
    "api",
    "circuit_breaker",
    "rate_limit",
    "cache",
    "budget",
    "alerts",
    "metrics",
    "pricing",
    "logging",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tollgate/tollgate.toml` (system-wide)
/// 3. `~/.config/tollgate/tollgate.toml` (user XDG config)
/// 4. `./tollgate.toml` (local directory)
/// 5. `PERPLEXITY_API_KEY`
/// 6. `TOLLGATE_*` environment variables
pub fn load_config() -> Result<TollgateConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<TollgateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TollgateConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TollgateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TollgateConfig::default()))
        .merge(Toml::file(path))
        .merge(api_key_fallback())
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TollgateConfig::default()))
        .merge(Toml::file("/etc/tollgate/tollgate.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("tollgate/tollgate.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("tollgate.toml"))
        .merge(api_key_fallback())
        .merge(env_provider())
}

/// The conventional `PERPLEXITY_API_KEY` variable feeds `api.api_key`.
fn api_key_fallback() -> Env {
    Env::raw()
        .only(&["PERPLEXITY_API_KEY"])
        .map(|_| "api.api_key".into())
}

/// Create the `TOLLGATE_` environment provider.
///
/// `TOLLGATE_CIRCUIT_BREAKER_FAILURE_THRESHOLD` maps to
/// `circuit_breaker.failure_threshold`, `TOLLGATE_API_API_KEY` to
/// `api.api_key`.
fn env_provider() -> Env {
    Env::prefixed("TOLLGATE_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
