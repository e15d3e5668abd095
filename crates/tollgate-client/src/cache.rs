// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response cache with a TTL and a fixed LRU capacity.
//!
//! Expired entries are dropped when they are read; there is no background
//! sweep. When the cache is full the least recently used entry is evicted.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

use tollgate_config::model::CacheConfig;
use tollgate_core::QueryResult;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: QueryResult,
    stored_at: Instant,
}

/// Shared response cache.
pub struct ResponseCache {
    enabled: bool,
    ttl: Duration,
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            enabled: config.enabled,
            ttl: config.ttl(),
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cache key for a query: normalized text, requested model, requested
    /// output limit. Casing and surrounding whitespace do not matter.
    pub fn key(query: &str, model: Option<&str>, max_tokens: u32) -> String {
        let normalized_query = query.trim().to_lowercase();
        format!(
            "{}|{}|{}",
            normalized_query,
            model.unwrap_or("default"),
            max_tokens
        )
    }

    /// Fresh entry for `key`, if any.
    pub fn get(&self, key: &str) -> Option<QueryResult> {
        if !self.enabled {
            return None;
        }
        let mut entries = self.lock();
        if let Some(entry) = entries.get(key) {
            if entry.stored_at.elapsed() < self.ttl {
                return Some(entry.result.clone());
            }
            entries.pop(key);
        }
        None
    }

    /// Store or overwrite `key`.
    pub fn put(&self, key: String, result: QueryResult) {
        if !self.enabled {
            return;
        }
        self.lock().put(
            key,
            CacheEntry {
                result,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Entries currently held, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
