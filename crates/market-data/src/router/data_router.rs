//! The data router.
//!
//! Given a [`DataRequest`], the router:
//! 1. Serves it from the response cache when allowed and fresh enough
//! 2. Looks up the routing rule and keeps the providers that are available
//! 3. Tries each candidate up to `max_retries + 1` times, each attempt
//!    bounded by the per-attempt timeout
//! 4. Caches the first non-empty answer under the rule's TTL
//!
//! Individual provider failures never reach the caller. They are logged,
//! counted against the provider and may start a cooldown.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;

use super::settings::RouterSettings;
use crate::cache::{CacheStats, ResponseCache};
use crate::clock::{system_clock, Clock};
use crate::errors::MarketDataError;
use crate::models::{
    Bar, DataRequest, DataType, EconomicEvent, MarketPayload, MarketSnapshot, NewsItem, Quote,
};
use crate::provider::MarketDataProvider;
use crate::registry::{FetchDiagnostics, ProviderConfig, ProviderRegistry, RoutingRule, RoutingTable};
use crate::secrets::ApiKeyStore;

/// Per-provider entry of [`DataRouter::provider_status`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatusReport {
    pub available: bool,
    pub healthy: bool,
    pub enabled: bool,
    pub is_primary: bool,
    pub priority: u8,
    /// Consecutive failed attempts seen by the router.
    pub error_count: u32,
    pub request_count: u64,
    pub last_request: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub quota_usage: f64,
    pub in_cooldown: bool,
    pub cooldown_until: Option<DateTime<Utc>>,
}

/// Routes data requests to providers with caching and failover.
pub struct DataRouter {
    registry: Arc<ProviderRegistry>,
    routing: RoutingTable,
    cache: ResponseCache,
    attempt_timeout: Duration,
}

impl DataRouter {
    pub fn new(registry: Arc<ProviderRegistry>, settings: &RouterSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            routing: settings.routing.clone(),
            cache: ResponseCache::with_default_ttl(clock, settings.default_cache_ttl_secs),
            attempt_timeout: settings.attempt_timeout(),
        }
    }

    /// Router over every provider `key_store` has credentials for.
    pub fn from_key_store(key_store: &dyn ApiKeyStore, settings: &RouterSettings) -> Self {
        let clock = system_clock();
        let registry = ProviderRegistry::from_key_store(key_store, settings, clock.clone());
        Self::new(Arc::new(registry), settings, clock)
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Fetch data, or `None` if no provider could supply it.
    pub async fn get_data(&self, request: DataRequest) -> Option<MarketPayload> {
        self.try_get_data(request).await.ok()
    }

    /// Like [`get_data`](Self::get_data), but says why nothing came back.
    ///
    /// The error is always one of the definitive failures: no providers
    /// available, all providers failed, or deadline exceeded.
    pub async fn try_get_data(&self, request: DataRequest) -> Result<MarketPayload, MarketDataError> {
        let cache_key = ResponseCache::fingerprint(&request);

        if request.use_cache {
            if let Some(hit) = self.cache.get(&cache_key, request.max_age_seconds) {
                return Ok(hit);
            }
        }

        let Some(deadline) = request.deadline else {
            return self.route(&request, &cache_key).await;
        };

        match tokio::time::timeout(deadline, self.route(&request, &cache_key)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Deadline of {:?} exceeded while fetching {}",
                    deadline, request.data_type
                );
                Err(MarketDataError::DeadlineExceeded {
                    data_type: request.data_type.to_string(),
                })
            }
        }
    }

    /// Available providers for `rule`, primary first.
    fn candidates(
        &self,
        rule: &RoutingRule,
        diagnostics: &mut FetchDiagnostics,
    ) -> Vec<(Arc<dyn MarketDataProvider>, ProviderConfig)> {
        let mut candidates = Vec::new();

        for name in rule.provider_order() {
            match self.registry.available(name) {
                Ok(provider) => {
                    if let Some(config) = self.registry.config(name) {
                        candidates.push((provider, config));
                    }
                }
                Err(reason) => {
                    if rule.primary.as_deref() == Some(name) {
                        warn!("Primary provider '{}' not available: {}", name, reason);
                    } else {
                        debug!("Fallback provider '{}' not available: {}", name, reason);
                    }
                    diagnostics.record_skip(name, reason);
                }
            }
        }

        candidates
    }

    async fn route(&self, request: &DataRequest, cache_key: &str) -> Result<MarketPayload, MarketDataError> {
        let data_type = &request.data_type;
        let rule = self.routing.rule_for(data_type);
        let mut diagnostics = FetchDiagnostics::new();

        let candidates = self.candidates(&rule, &mut diagnostics);
        if candidates.is_empty() {
            error!(
                "No available providers for {} ({})",
                data_type,
                diagnostics.summary()
            );
            return Err(MarketDataError::NoProvidersAvailable {
                data_type: data_type.to_string(),
            });
        }

        let attempts = rule.attempts_per_provider();

        for (provider, config) in candidates {
            let name = config.name.as_str();

            for attempt in 1..=attempts {
                debug!(
                    "Requesting {} from {} (attempt {}/{})",
                    data_type, name, attempt, attempts
                );

                let outcome = match tokio::time::timeout(
                    self.attempt_timeout,
                    execute(provider.as_ref(), request),
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(MarketDataError::Timeout {
                        provider: name.to_string(),
                    }),
                };

                match outcome {
                    Ok(Some(payload)) => {
                        if request.use_cache {
                            self.cache.put(cache_key, payload.clone(), rule.cache_ttl_secs);
                        }
                        self.registry.health().record_success(name);
                        diagnostics.record_success(name);
                        info!("Successfully got {} from {}", data_type, name);
                        return Ok(payload);
                    }
                    Ok(None) => {
                        debug!("{} had no {} data (attempt {})", name, data_type, attempt);
                        diagnostics.record_no_data(name);
                    }
                    Err(e) => {
                        warn!("Attempt {} failed for {}: {}", attempt, name, e);
                        self.registry
                            .health()
                            .record_failure(name, config.max_errors, config.cooldown_minutes);
                        diagnostics.record_error(name, e.to_string());
                    }
                }
            }
        }

        error!(
            "Failed to get {} from all available providers ({})",
            data_type,
            diagnostics.summary()
        );
        Err(MarketDataError::AllProvidersFailed {
            data_type: data_type.to_string(),
        })
    }

    pub async fn get_vix(&self) -> Option<Quote> {
        self.get_data(DataRequest::vix()).await?.into_quote()
    }

    pub async fn get_quote(&self, symbol: &str) -> Option<Quote> {
        self.get_data(DataRequest::quote(symbol)).await?.into_quote()
    }

    pub async fn get_market_data(&self) -> Option<MarketSnapshot> {
        self.get_data(DataRequest::market_data()).await?.into_snapshot()
    }

    pub async fn get_history(&self, symbol: &str, period: &str) -> Option<Vec<Bar>> {
        self.get_data(DataRequest::history(symbol, period))
            .await?
            .into_bars()
    }

    pub async fn get_news(&self) -> Option<Vec<NewsItem>> {
        self.get_data(DataRequest::news()).await?.into_news()
    }

    /// Events due within `days_ahead` days. `Some(vec![])` means nothing is
    /// scheduled; `None` means no provider answered.
    pub async fn get_economic_events(&self, days_ahead: u32) -> Option<Vec<EconomicEvent>> {
        self.get_data(DataRequest::economic_events(days_ahead))
            .await?
            .into_events()
    }

    /// Run every registered provider's connection test.
    pub async fn test_all_providers(&self) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for (provider, config) in self.registry.entries() {
            let ok = provider.test_connection().await;
            info!(
                "Provider '{}' test: {}",
                config.name,
                if ok { "PASS" } else { "FAIL" }
            );
            results.insert(config.name, ok);
        }
        results
    }

    pub fn provider_status(&self) -> BTreeMap<String, ProviderStatusReport> {
        let health = self.registry.health();

        self.registry
            .entries()
            .into_iter()
            .map(|(provider, config)| {
                let status = provider.status();
                let available = self.registry.available(&config.name).is_ok();
                let report = ProviderStatusReport {
                    available,
                    healthy: provider.is_healthy(),
                    enabled: config.enabled,
                    is_primary: config.is_primary,
                    priority: config.priority,
                    error_count: health.consecutive_errors(&config.name),
                    request_count: status.request_count,
                    last_request: status.last_request,
                    last_error: status.last_error.clone(),
                    quota_usage: status.quota_usage_percent(),
                    in_cooldown: health.in_cooldown(&config.name),
                    cooldown_until: health.cooldown_until(&config.name),
                };
                (config.name, report)
            })
            .collect()
    }

    /// Clear error counts and cooldowns for one provider, or all of them.
    pub fn reset_provider_errors(&self, name: Option<&str>) -> Result<(), MarketDataError> {
        self.registry.reset_errors(name)?;
        match name {
            Some(name) => info!("Reset errors for provider '{}'", name),
            None => info!("Reset errors for all providers"),
        }
        Ok(())
    }

    pub fn set_provider_enabled(&self, name: &str, enabled: bool) -> Result<(), MarketDataError> {
        self.registry.set_enabled(name, enabled)
    }

    /// Remove every cache entry, or those whose key contains `pattern`.
    pub fn clear_cache(&self, pattern: Option<&str>) -> usize {
        let removed = self.cache.clear(pattern);
        match pattern {
            Some(pattern) => info!("Cleared {} cache entries matching '{}'", removed, pattern),
            None => info!("Cleared entire cache ({} entries)", removed),
        }
        removed
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Remove entries whose recorded TTL has passed.
    pub fn sweep_cache(&self) -> usize {
        let removed = self.cache.sweep();
        if removed > 0 {
            debug!("Swept {} expired cache entries", removed);
        }
        removed
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

/// Dispatch one attempt by data type.
async fn execute(
    provider: &dyn MarketDataProvider,
    request: &DataRequest,
) -> Result<Option<MarketPayload>, MarketDataError> {
    let payload = match &request.data_type {
        DataType::Vix => provider.fetch_vix().await?.map(MarketPayload::Quote),
        DataType::Quote => {
            let symbol = request.require_symbol()?;
            provider.fetch_quote(symbol).await?.map(MarketPayload::Quote)
        }
        DataType::MarketData => provider.fetch_market_data().await?.map(MarketPayload::Snapshot),
        DataType::History => {
            let symbol = request.require_symbol()?;
            let range = request.history_range()?;
            provider
                .fetch_history(symbol, &range)
                .await?
                .map(MarketPayload::Bars)
        }
        DataType::News => provider.fetch_news().await?.map(MarketPayload::News),
        DataType::EconomicEvents => {
            let days_ahead = request.days_ahead()?;
            provider
                .fetch_economic_events(days_ahead)
                .await?
                .map(MarketPayload::Events)
        }
        DataType::Other(name) => return Err(MarketDataError::UnknownDataType(name.clone())),
    };
    Ok(payload)
}
