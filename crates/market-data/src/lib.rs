//! AlgoTrade Market Data Crate
//!
//! A single entry point for market data (VIX, quotes, market snapshot,
//! daily history, news, economic events) backed by several upstream
//! providers with caching and failover.
//!
//! # Architecture
//!
//! ```text
//!                          +------------------+
//!   caller ------------->  |    DataRouter    |  (get_vix, get_quote, get_data, ...)
//!                          +------------------+
//!                            |       |      |
//!                            v       |      v
//!               +---------------+    |   +------------------+
//!               | ResponseCache |    |   |   RoutingTable   |  (primary + fallbacks, TTL, retries)
//!               +---------------+    |   +------------------+
//!                                    v
//!                          +------------------+
//!                          | ProviderRegistry |  (config, enable flag, cooldowns)
//!                          +------------------+
//!                                    |
//!                                    v
//!                          +------------------+
//!                          |    Provider      |  (FRED, Yahoo, Finnhub, Polygon, ...)
//!                          +------------------+
//!                          | rate limiter     |
//!                          | micro-cache      |
//!                          | ProviderStatus   |
//!                          +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`DataRouter`] - Cache lookup, candidate selection, retries, failover
//! - [`DataRequest`] - Data type, symbol, parameters, cache policy, deadline
//! - [`MarketPayload`] - Anything the router returns and caches
//! - [`Quote`] - Point-in-time price, always positive
//! - [`ProviderStatus`] - Live per-provider counters
//! - [`RouterSettings`] - Tunables and the routing table

pub mod cache;
pub mod clock;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;
pub mod router;
pub mod secrets;

// Re-export all public types from models
pub use models::{
    Bar, DataRequest, DataType, EconomicEvent, HistoryRange, MarketPayload, MarketSnapshot,
    NewsItem, ProviderStatus, Quote,
};

pub use cache::{CacheStats, ResponseCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::MarketDataError;

// Re-export provider types
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::finnhub::FinnhubProvider;
pub use provider::fmp::FmpProvider;
pub use provider::fred::FredProvider;
pub use provider::polygon::PolygonProvider;
pub use provider::twelvedata::TwelvedataProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{MarketDataProvider, ProviderCapabilities, ProviderState, RateLimit};

// Re-export registry and router types
pub use registry::{
    CooldownTracker, FetchDiagnostics, ProviderConfig, ProviderRegistry, RoutingRule, RoutingTable,
    SkipReason,
};
pub use router::{DataRouter, ProviderStatusReport, RouterSettings};
pub use secrets::{ApiKeyStore, InMemoryKeyStore, JsonFileKeyStore};
