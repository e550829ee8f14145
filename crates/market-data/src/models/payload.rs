use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::quote::Quote;

/// Quotes for a fixed basket keyed by display name (`VIX`, `SPY`, ...).
pub type MarketSnapshot = BTreeMap<String, Quote>;

/// One daily OHLCV bar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
}

/// A market news headline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub headline: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// A scheduled macro release (rate decision, CPI, unemployment, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EconomicEvent {
    pub name: String,
    pub series_id: String,
    pub date: NaiveDate,
    pub value: String,
}

/// Anything the router can return and cache.
///
/// An empty `Events` list is a real answer ("nothing scheduled"), not a
/// failure; providers signal failure through `Ok(None)` or an error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MarketPayload {
    Quote(Quote),
    Snapshot(MarketSnapshot),
    Bars(Vec<Bar>),
    News(Vec<NewsItem>),
    Events(Vec<EconomicEvent>),
}

impl MarketPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Quote(_) => "quote",
            Self::Snapshot(_) => "snapshot",
            Self::Bars(_) => "bars",
            Self::News(_) => "news",
            Self::Events(_) => "events",
        }
    }

    pub fn into_quote(self) -> Option<Quote> {
        match self {
            Self::Quote(q) => Some(q),
            _ => None,
        }
    }

    pub fn into_snapshot(self) -> Option<MarketSnapshot> {
        match self {
            Self::Snapshot(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_bars(self) -> Option<Vec<Bar>> {
        match self {
            Self::Bars(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_news(self) -> Option<Vec<NewsItem>> {
        match self {
            Self::News(n) => Some(n),
            _ => None,
        }
    }

    pub fn into_events(self) -> Option<Vec<EconomicEvent>> {
        match self {
            Self::Events(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Quote> for MarketPayload {
    fn from(quote: Quote) -> Self {
        Self::Quote(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serializes_with_kind_tag() {
        let quote = Quote::new("^VIX", 14.2, Utc::now(), "fred").unwrap();
        let json = serde_json::to_value(MarketPayload::Quote(quote)).unwrap();
        assert_eq!(json["kind"], "quote");
        assert_eq!(json["data"]["price"], 14.2);
    }

    #[test]
    fn test_empty_events_is_still_a_payload() {
        let payload = MarketPayload::Events(vec![]);
        assert_eq!(payload.kind(), "events");
        assert_eq!(payload.into_events(), Some(vec![]));
    }

    #[test]
    fn test_into_wrong_variant_is_none() {
        let payload = MarketPayload::News(vec![]);
        assert!(payload.into_quote().is_none());
    }
}
