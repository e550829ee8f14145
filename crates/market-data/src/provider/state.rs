//! Per-provider runtime state: status counters, rate limiter, micro-cache.
//!
//! Every provider funnels its upstream calls through [`ProviderState::fetch`],
//! which serves repeats from the micro-cache, waits on the rate limiter and
//! records the outcome in the provider's [`ProviderStatus`].

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Duration;
use tracing::{debug, warn};

use crate::cache::{secs, TtlCache};
use crate::clock::{system_clock, Clock};
use crate::errors::MarketDataError;
use crate::models::{Bar, EconomicEvent, MarketPayload, MarketSnapshot, NewsItem, ProviderStatus, Quote};

use super::capabilities::RateLimit;
use super::rate_limiter::RateLimiter;

/// Default lifetime of a provider micro-cache entry.
pub const DEFAULT_MICRO_CACHE_TTL_SECS: i64 = 300;

/// Values a provider can keep in its micro-cache.
pub trait MicroCached: Sized {
    fn into_payload(self) -> MarketPayload;
    fn from_payload(payload: MarketPayload) -> Option<Self>;
}

impl MicroCached for Quote {
    fn into_payload(self) -> MarketPayload {
        MarketPayload::Quote(self)
    }
    fn from_payload(payload: MarketPayload) -> Option<Self> {
        payload.into_quote()
    }
}

impl MicroCached for MarketSnapshot {
    fn into_payload(self) -> MarketPayload {
        MarketPayload::Snapshot(self)
    }
    fn from_payload(payload: MarketPayload) -> Option<Self> {
        payload.into_snapshot()
    }
}

impl MicroCached for Vec<Bar> {
    fn into_payload(self) -> MarketPayload {
        MarketPayload::Bars(self)
    }
    fn from_payload(payload: MarketPayload) -> Option<Self> {
        payload.into_bars()
    }
}

impl MicroCached for Vec<NewsItem> {
    fn into_payload(self) -> MarketPayload {
        MarketPayload::News(self)
    }
    fn from_payload(payload: MarketPayload) -> Option<Self> {
        payload.into_news()
    }
}

impl MicroCached for Vec<EconomicEvent> {
    fn into_payload(self) -> MarketPayload {
        MarketPayload::Events(self)
    }
    fn from_payload(payload: MarketPayload) -> Option<Self> {
        payload.into_events()
    }
}

pub struct ProviderState {
    provider: &'static str,
    status: Mutex<ProviderStatus>,
    limiter: RateLimiter,
    micro_cache: TtlCache<MarketPayload>,
    micro_cache_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ProviderState {
    pub fn new(provider: &'static str, rate_limit: RateLimit) -> Self {
        Self::with_clock(provider, rate_limit, system_clock())
    }

    pub fn with_clock(provider: &'static str, rate_limit: RateLimit, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            status: Mutex::new(ProviderStatus::default()),
            limiter: RateLimiter::new(provider, rate_limit.min_interval),
            micro_cache: TtlCache::new(clock.clone()),
            micro_cache_ttl: Duration::seconds(DEFAULT_MICRO_CACHE_TTL_SECS),
            clock,
        }
    }

    pub fn with_micro_cache_ttl(mut self, seconds: u64) -> Self {
        self.micro_cache_ttl = secs(seconds);
        self
    }

    fn lock_status(&self) -> MutexGuard<'_, ProviderStatus> {
        self.status.lock().unwrap_or_else(|poisoned| {
            warn!("Status mutex for '{}' was poisoned, recovering", self.provider);
            poisoned.into_inner()
        })
    }

    pub fn status(&self) -> ProviderStatus {
        self.lock_status().clone()
    }

    pub fn is_healthy(&self) -> bool {
        self.lock_status().is_healthy()
    }

    pub fn reset_status(&self) {
        *self.lock_status() = ProviderStatus::default();
    }

    /// Clear error count and availability, keeping request telemetry.
    pub fn reset_health(&self) {
        self.lock_status().reset_health();
    }

    pub fn update_quota(&self, remaining: Option<u64>, limit: Option<u64>) {
        self.lock_status().update_quota(remaining, limit);
    }

    /// Run one upstream call.
    ///
    /// A fresh micro-cache entry short-circuits the call without touching
    /// the limiter or the counters. Otherwise the request count always goes
    /// up; failures also bump the error count and record the message.
    pub async fn fetch<T, F, Fut>(&self, cache_key: &str, op: F) -> Result<Option<T>, MarketDataError>
    where
        T: MicroCached + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, MarketDataError>>,
    {
        if let Some(cached) = self
            .micro_cache
            .get(cache_key, self.micro_cache_ttl)
            .and_then(T::from_payload)
        {
            debug!("{}: micro-cache hit for '{}'", self.provider, cache_key);
            return Ok(Some(cached));
        }

        self.limiter.acquire().await;
        let pending = PendingCall {
            state: self,
            cache_key,
            armed: true,
        };
        let result = op().await;
        pending.disarm();
        let now = self.clock.now();

        match &result {
            Ok(value) => {
                self.lock_status().record_success(now);
                if let Some(value) = value {
                    self.micro_cache
                        .put(cache_key, value.clone().into_payload(), self.micro_cache_ttl);
                }
            }
            Err(e) => {
                warn!("{}: request '{}' failed: {}", self.provider, cache_key, e);
                self.lock_status()
                    .record_failure(now, e.to_string(), e.marks_unavailable());
            }
        }

        result
    }
}

/// Records a timeout if the call it guards is dropped before completing,
/// as happens when an attempt timeout or request deadline cancels it.
struct PendingCall<'a> {
    state: &'a ProviderState,
    cache_key: &'a str,
    armed: bool,
}

impl PendingCall<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let error = MarketDataError::Timeout {
            provider: self.state.provider.to_string(),
        };
        warn!("{}: request '{}' cancelled: {}", self.state.provider, self.cache_key, error);
        self.state
            .lock_status()
            .record_failure(self.state.clock.now(), error.to_string(), error.marks_unavailable());
    }
}
