//! Provider capabilities and rate limiting configuration.

use std::time::Duration;

use crate::models::DataType;

/// Which optional operations a provider implements.
///
/// Every provider can be asked for VIX and single-symbol quotes; the rest
/// are opt-in. The router still calls an unsupported operation if a routing
/// rule names the provider, and the provider answers `NotSupported`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    pub supports_market_data: bool,
    pub supports_history: bool,
    pub supports_news: bool,
    pub supports_events: bool,
}

impl ProviderCapabilities {
    pub fn supports(&self, data_type: &DataType) -> bool {
        match data_type {
            DataType::Vix | DataType::Quote => true,
            DataType::MarketData => self.supports_market_data,
            DataType::History => self.supports_history,
            DataType::News => self.supports_news,
            DataType::EconomicEvents => self.supports_events,
            DataType::Other(_) => false,
        }
    }
}

/// Rate limiting configuration for a provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Minimum delay between two upstream requests.
    pub min_interval: Duration,
}

impl RateLimit {
    pub const fn every(min_interval: Duration) -> Self {
        Self { min_interval }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::every(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quotes_always_supported() {
        let caps = ProviderCapabilities::default();
        assert!(caps.supports(&DataType::Vix));
        assert!(caps.supports(&DataType::Quote));
        assert!(!caps.supports(&DataType::MarketData));
        assert!(!caps.supports(&DataType::from("foo")));
    }
}
