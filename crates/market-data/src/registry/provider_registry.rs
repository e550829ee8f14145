//! Provider registry.
//!
//! Holds the constructed providers with their static [`ProviderConfig`] and
//! the shared [`CooldownTracker`]. Registration under a live name swaps the
//! entry atomically; callers holding the old `Arc` finish against the old
//! instance.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};
use serde::Serialize;

use super::health::{CooldownCheck, CooldownTracker};
use super::skip_reason::SkipReason;
use crate::clock::{system_clock, Clock};
use crate::errors::MarketDataError;
use crate::provider::alpha_vantage::AlphaVantageProvider;
use crate::provider::finnhub::FinnhubProvider;
use crate::provider::fmp::FmpProvider;
use crate::provider::fred::FredProvider;
use crate::provider::polygon::PolygonProvider;
use crate::provider::twelvedata::TwelvedataProvider;
use crate::provider::yahoo::YahooProvider;
use crate::provider::{MarketDataProvider, ProviderState};
use crate::router::RouterSettings;
use crate::secrets::ApiKeyStore;

/// Consecutive errors before a cooldown starts.
pub const DEFAULT_MAX_ERRORS: u32 = 5;

pub const DEFAULT_COOLDOWN_MINUTES: u32 = 15;

/// Every provider the registry knows how to construct, in registration order.
pub const KNOWN_PROVIDERS: &[&str] = &[
    "fred",
    "yahoo",
    "finnhub",
    "polygon",
    "twelvedata",
    "fmp",
    "alphavantage",
];

/// Static registration metadata for one provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub name: String,
    pub is_primary: bool,
    /// 1 for primaries, 2 otherwise. Lower is preferred.
    pub priority: u8,
    pub enabled: bool,
    pub max_errors: u32,
    pub cooldown_minutes: u32,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, is_primary: bool) -> Self {
        Self {
            name: name.into(),
            is_primary,
            priority: if is_primary { 1 } else { 2 },
            enabled: true,
            max_errors: DEFAULT_MAX_ERRORS,
            cooldown_minutes: DEFAULT_COOLDOWN_MINUTES,
        }
    }
}

struct Entry {
    provider: Arc<dyn MarketDataProvider>,
    config: ProviderConfig,
}

pub struct ProviderRegistry {
    entries: RwLock<BTreeMap<String, Entry>>,
    health: CooldownTracker,
    max_errors: u32,
    cooldown_minutes: u32,
}

impl ProviderRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(clock, DEFAULT_MAX_ERRORS, DEFAULT_COOLDOWN_MINUTES)
    }

    /// Registry whose future registrations use the given thresholds.
    pub fn with_limits(clock: Arc<dyn Clock>, max_errors: u32, cooldown_minutes: u32) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            health: CooldownTracker::new(clock),
            max_errors,
            cooldown_minutes,
        }
    }

    /// Construct and register every known provider whose credentials are
    /// available.
    ///
    /// Providers are built independently. A missing key skips the provider;
    /// any other construction failure is logged and skipped too. An empty
    /// registry is a valid outcome.
    pub fn from_key_store(
        key_store: &dyn ApiKeyStore,
        settings: &RouterSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = Self::with_limits(clock.clone(), settings.max_errors, settings.cooldown_minutes);

        for name in KNOWN_PROVIDERS {
            match build_provider(name, key_store, settings, &clock) {
                Ok(Some(provider)) => {
                    let is_primary = settings
                        .routing
                        .rules()
                        .iter()
                        .any(|rule| rule.primary.as_deref() == Some(*name));
                    registry.register(name, provider, is_primary);
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to initialize provider '{}': {}", name, e),
            }
        }

        info!(
            "Registered {} market data providers: {:?}",
            registry.len(),
            registry.provider_names()
        );
        registry
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, BTreeMap<String, Entry>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("Provider registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Entry>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("Provider registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Store `provider` under `name`, replacing any previous entry, and
    /// clear its error counter and cooldown.
    pub fn register(&self, name: &str, provider: Arc<dyn MarketDataProvider>, is_primary: bool) {
        let config = ProviderConfig {
            max_errors: self.max_errors,
            cooldown_minutes: self.cooldown_minutes,
            ..ProviderConfig::new(name, is_primary)
        };
        self.register_with_config(provider, config);
    }

    pub fn register_with_config(&self, provider: Arc<dyn MarketDataProvider>, config: ProviderConfig) {
        let name = config.name.clone();
        let replaced = self
            .write_entries()
            .insert(name.clone(), Entry { provider, config })
            .is_some();
        self.health.reset(&name);

        if replaced {
            info!("Replaced provider '{}'", name);
        } else {
            info!("Registered provider '{}'", name);
        }
    }

    pub fn unregister(&self, name: &str) -> Result<(), MarketDataError> {
        self.write_entries()
            .remove(name)
            .ok_or_else(|| MarketDataError::ProviderNotFound(name.to_string()))?;
        self.health.reset(name);
        info!("Unregistered provider '{}'", name);
        Ok(())
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), MarketDataError> {
        let mut entries = self.write_entries();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| MarketDataError::ProviderNotFound(name.to_string()))?;
        entry.config.enabled = enabled;
        info!(
            "Provider '{}' {}",
            name,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn MarketDataProvider>> {
        self.read_entries().get(name).map(|e| e.provider.clone())
    }

    pub fn config(&self, name: &str) -> Option<ProviderConfig> {
        self.read_entries().get(name).map(|e| e.config.clone())
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.read_entries().keys().cloned().collect()
    }

    /// Snapshot of every registration, ordered by name.
    pub fn entries(&self) -> Vec<(Arc<dyn MarketDataProvider>, ProviderConfig)> {
        self.read_entries()
            .values()
            .map(|e| (e.provider.clone(), e.config.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    pub fn health(&self) -> &CooldownTracker {
        &self.health
    }

    /// The provider if it may be tried right now, or why not.
    ///
    /// Available means registered, enabled, not cooling down, below its
    /// error threshold and healthy by its own status. A cooldown that has
    /// just ended also restores the provider's health counters.
    pub fn available(&self, name: &str) -> Result<Arc<dyn MarketDataProvider>, SkipReason> {
        let (provider, config) = {
            let entries = self.read_entries();
            let entry = entries.get(name).ok_or(SkipReason::NotRegistered)?;
            (entry.provider.clone(), entry.config.clone())
        };

        if !config.enabled {
            return Err(SkipReason::Disabled);
        }

        match self.health.check(name) {
            CooldownCheck::Active { until } => return Err(SkipReason::CoolingDown { until }),
            CooldownCheck::Expired => provider.state().reset_health(),
            CooldownCheck::Clear => {}
        }

        let count = self.health.consecutive_errors(name);
        if count >= config.max_errors {
            return Err(SkipReason::TooManyErrors {
                count,
                max: config.max_errors,
            });
        }

        if !provider.is_healthy() {
            return Err(SkipReason::Unhealthy);
        }

        Ok(provider)
    }

    /// Clear error counters, cooldowns and provider health for one provider,
    /// or for all of them.
    pub fn reset_errors(&self, name: Option<&str>) -> Result<(), MarketDataError> {
        match name {
            Some(name) => {
                let provider = self
                    .get(name)
                    .ok_or_else(|| MarketDataError::ProviderNotFound(name.to_string()))?;
                self.health.reset(name);
                provider.state().reset_health();
            }
            None => {
                self.health.reset_all();
                for (provider, _) in self.entries() {
                    provider.state().reset_health();
                }
            }
        }
        Ok(())
    }
}

fn provider_state(provider: &dyn MarketDataProvider, settings: &RouterSettings, clock: &Arc<dyn Clock>) -> ProviderState {
    ProviderState::with_clock(provider.id(), provider.rate_limit(), clock.clone())
        .with_micro_cache_ttl(settings.micro_cache_ttl_secs)
}

fn build_provider(
    name: &str,
    key_store: &dyn ApiKeyStore,
    settings: &RouterSettings,
    clock: &Arc<dyn Clock>,
) -> Result<Option<Arc<dyn MarketDataProvider>>, MarketDataError> {
    macro_rules! keyed {
        ($ty:ty) => {{
            let Some(key) = key_store.get_key(name)? else {
                debug!("Skipping provider '{}': no API key configured", name);
                return Ok(None);
            };
            let provider = <$ty>::new(key);
            let state = provider_state(&provider, settings, clock);
            provider.with_state(state)
        }};
        ($ty:ty, vix) => {{
            let provider = keyed!($ty);
            match settings.vix_symbol(name) {
                Some(symbol) => provider.with_vix_symbol(symbol),
                None => provider,
            }
        }};
    }

    let provider: Arc<dyn MarketDataProvider> = match name {
        "fred" => Arc::new(keyed!(FredProvider, vix)),
        "yahoo" => {
            let provider = YahooProvider::new()?;
            let state = provider_state(&provider, settings, clock);
            let provider = provider.with_state(state);
            Arc::new(match settings.vix_symbol(name) {
                Some(symbol) => provider.with_vix_symbol(symbol),
                None => provider,
            })
        }
        "finnhub" => Arc::new(keyed!(FinnhubProvider, vix)),
        "polygon" => Arc::new(keyed!(PolygonProvider, vix)),
        "twelvedata" => Arc::new(keyed!(TwelvedataProvider, vix)),
        "fmp" => Arc::new(keyed!(FmpProvider, vix)),
        "alphavantage" => Arc::new(keyed!(AlphaVantageProvider)),
        other => return Err(MarketDataError::ProviderNotFound(other.to_string())),
    };
    Ok(Some(provider))
}

/// Registry backed by the system clock and default thresholds.
impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(system_clock())
    }
}
