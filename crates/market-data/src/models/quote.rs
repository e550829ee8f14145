use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time price observation.
///
/// Quotes are only ever built through [`Quote::new`], which rejects
/// non-positive or non-finite prices, so a `Quote` in hand always carries a
/// usable price. Providers that cannot produce one report "no data" instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Symbol as the caller knows it (e.g. `^VIX`, `SPY`)
    pub symbol: String,

    /// Last / current price, always > 0
    pub price: f64,

    /// Observation time reported by the provider (or fetch time)
    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,

    /// Absolute change against the previous close
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,

    /// Percent change against the previous close
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,

    /// Provider that produced the quote (fred, yahoo, ...)
    pub source: String,
}

impl Quote {
    /// Create a quote, or `None` if the price is not a positive finite number.
    pub fn new(
        symbol: impl Into<String>,
        price: f64,
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Option<Self> {
        if !price.is_finite() || price <= 0.0 {
            return None;
        }
        Some(Self {
            symbol: symbol.into(),
            price,
            timestamp,
            volume: None,
            change: None,
            change_percent: None,
            source: source.into(),
        })
    }

    pub fn with_volume(mut self, volume: Option<u64>) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_change(mut self, change: Option<f64>, change_percent: Option<f64>) -> Self {
        self.change = change.filter(|v| v.is_finite());
        self.change_percent = change_percent.filter(|v| v.is_finite());
        self
    }
}
