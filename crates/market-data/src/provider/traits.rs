//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! market data providers must implement.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{Bar, EconomicEvent, HistoryRange, MarketSnapshot, NewsItem, ProviderStatus, Quote};

use super::capabilities::{ProviderCapabilities, RateLimit};
use super::state::ProviderState;

/// Trait for market data providers.
///
/// Fetch methods return `Ok(None)` when the upstream simply has no usable
/// value; an `Err` means the call itself failed. Optional operations
/// default to `NotSupported`.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use algotrade_market_data::provider::{MarketDataProvider, ProviderCapabilities, ProviderState, RateLimit};
///
/// struct MyProvider {
///     state: ProviderState,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "mine"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities::default()
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::default()
///     }
///
///     fn state(&self) -> &ProviderState {
///         &self.state
///     }
///
///     // ... implement fetch_vix / fetch_quote
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Lowercase upstream name (`fred`, `yahoo`, ...). Also the key under
    /// which its API key is looked up.
    fn id(&self) -> &'static str;

    /// Describes which optional operations this provider implements.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Rate limiting configuration.
    fn rate_limit(&self) -> RateLimit;

    /// Shared status, limiter and micro-cache.
    fn state(&self) -> &ProviderState;

    /// Current value of the VIX index.
    async fn fetch_vix(&self) -> Result<Option<Quote>, MarketDataError>;

    /// Latest quote for one symbol.
    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>, MarketDataError>;

    /// Quotes for the index basket (VIX, SPY, QQQ, IWM).
    async fn fetch_market_data(&self) -> Result<Option<MarketSnapshot>, MarketDataError> {
        Err(MarketDataError::not_supported(self.id(), "market_data"))
    }

    /// Daily bars, oldest first.
    async fn fetch_history(
        &self,
        symbol: &str,
        range: &HistoryRange,
    ) -> Result<Option<Vec<Bar>>, MarketDataError> {
        let _ = (symbol, range);
        Err(MarketDataError::not_supported(self.id(), "history"))
    }

    async fn fetch_news(&self) -> Result<Option<Vec<NewsItem>>, MarketDataError> {
        Err(MarketDataError::not_supported(self.id(), "news"))
    }

    /// Macro releases due within `days_ahead` days. `Ok(Some(vec![]))` means
    /// nothing is scheduled.
    async fn fetch_economic_events(
        &self,
        days_ahead: u32,
    ) -> Result<Option<Vec<EconomicEvent>>, MarketDataError> {
        let _ = days_ahead;
        Err(MarketDataError::not_supported(self.id(), "economic_events"))
    }

    /// Whether the upstream is reachable. Defaults to fetching VIX.
    async fn test_connection(&self) -> bool {
        match self.fetch_vix().await {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("{} connection test failed: {}", self.id(), e);
                false
            }
        }
    }

    fn status(&self) -> ProviderStatus {
        self.state().status()
    }

    fn is_healthy(&self) -> bool {
        self.state().is_healthy()
    }

    /// Fresh counters, as if the provider had just been constructed.
    fn reset_status(&self) {
        self.state().reset_status()
    }
}
