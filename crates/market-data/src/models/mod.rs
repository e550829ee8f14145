//! Market data models
//!
//! - `quote` - the point-in-time price observation (Quote)
//! - `payload` - everything the router returns and caches (MarketPayload and friends)
//! - `request` - what callers ask for (DataRequest, DataType, HistoryRange)
//! - `status` - live per-provider health counters (ProviderStatus)

mod payload;
mod quote;
mod request;
mod status;

pub use payload::{Bar, EconomicEvent, MarketPayload, MarketSnapshot, NewsItem};
pub use quote::Quote;
pub use request::{
    DataRequest, DataType, HistoryRange, DEFAULT_EVENTS_DAYS_AHEAD, DEFAULT_REQUEST_MAX_AGE_SECS,
};
pub use status::{ProviderStatus, HEALTHY_ERROR_LIMIT, HEALTHY_QUOTA_LIMIT_PERCENT};
