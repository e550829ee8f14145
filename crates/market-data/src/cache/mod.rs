//! Response caching.
//!
//! [`TtlCache`] is the generic store; [`ResponseCache`] keys it by request
//! fingerprint and is shared by every data type the router serves. Providers
//! reuse `TtlCache` for their private micro-caches.

mod ttl_cache;

use std::sync::Arc;

use chrono::Duration;
use log::debug;
use serde::Serialize;

use crate::clock::Clock;
use crate::models::{DataRequest, MarketPayload};

pub use ttl_cache::TtlCache;

/// Age past which `stats()` reports an entry as expired.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    /// Entries older than the default TTL (informational).
    pub expired_entries: usize,
}

/// Router-level cache of provider responses.
pub struct ResponseCache {
    inner: TtlCache<MarketPayload>,
    default_ttl_secs: u64,
}

impl ResponseCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_default_ttl(clock, DEFAULT_CACHE_TTL_SECS)
    }

    pub fn with_default_ttl(clock: Arc<dyn Clock>, default_ttl_secs: u64) -> Self {
        Self {
            inner: TtlCache::new(clock),
            default_ttl_secs,
        }
    }

    /// Deterministic key: data type, then `_symbol`, then `_k=v` pairs sorted
    /// by key. Neither max age nor TTL takes part.
    pub fn fingerprint(request: &DataRequest) -> String {
        let mut key = request.data_type.to_string();

        if let Some(symbol) = &request.symbol {
            key.push('_');
            key.push_str(symbol);
        }

        if let Some(params) = request.parameters.as_ref().filter(|p| !p.is_empty()) {
            let mut pairs: Vec<_> = params.iter().collect();
            pairs.sort();
            let joined = pairs
                .into_iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("_");
            key.push('_');
            key.push_str(&joined);
        }

        key
    }

    pub fn get(&self, key: &str, requested_max_age_secs: u64) -> Option<MarketPayload> {
        let hit = self.inner.get(key, secs(requested_max_age_secs));
        debug!(
            "Cache {} for '{}'",
            if hit.is_some() { "hit" } else { "miss" },
            key
        );
        hit
    }

    pub fn put(&self, key: impl Into<String>, payload: MarketPayload, rule_ttl_secs: u64) {
        self.inner.put(key, payload, secs(rule_ttl_secs));
    }

    pub fn clear(&self, pattern: Option<&str>) -> usize {
        let removed = self.inner.clear(pattern);
        debug!("Cleared {} cache entries (pattern: {:?})", removed, pattern);
        removed
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.inner.len(),
            expired_entries: self.inner.count_older_than(secs(self.default_ttl_secs)),
        }
    }

    /// Remove entries past the TTL recorded when they were written.
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }
}

/// Whole seconds as a `Duration`, saturating at `Duration::MAX`.
pub(crate) fn secs(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}
