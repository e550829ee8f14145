//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider capabilities and rate limiting configuration
//! - Per-provider runtime state (status counters, limiter, micro-cache)
//! - Concrete provider implementations (FRED, Yahoo, Finnhub, ...)
//!
//! Providers never decide on fallbacks. They answer `Ok(Some)`, `Ok(None)`
//! or `Err` and leave ordering, retries and cooldowns to the router.

mod capabilities;
pub(crate) mod http;
mod rate_limiter;
mod state;
mod traits;

pub mod alpha_vantage;
pub mod finnhub;
pub mod fmp;
pub mod fred;
pub mod polygon;
pub mod twelvedata;
pub mod yahoo;

// Re-exports
pub use capabilities::{ProviderCapabilities, RateLimit};
pub use http::HTTP_TIMEOUT;
pub use rate_limiter::RateLimiter;
pub use state::{MicroCached, ProviderState, DEFAULT_MICRO_CACHE_TTL_SECS};
pub use traits::MarketDataProvider;
