//! FRED (Federal Reserve Economic Data) provider.
//!
//! - VIX via the `VIXCLS` series (daily close, one business day behind)
//! - economic events via the latest FEDFUNDS / CPIAUCSL / UNRATE observations
//!
//! FRED publishes no intraday quotes; `fetch_quote` always reports no data.
//! API documentation: https://fred.stlouisfed.org/docs/api/fred/

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::MarketDataError;
use crate::models::{EconomicEvent, Quote};
use crate::provider::http::ApiClient;
use crate::provider::{MarketDataProvider, ProviderCapabilities, ProviderState, RateLimit};

const BASE_URL: &str = "https://api.stlouisfed.org";
const OBSERVATIONS_PATH: &str = "/fred/series/observations";
const PROVIDER_ID: &str = "fred";

/// FRED series backing the VIX data type.
pub const VIX_SERIES: &str = "VIXCLS";

/// Series reported as economic events, with their display names.
const EVENT_SERIES: &[(&str, &str)] = &[
    ("FEDFUNDS", "Fed Rate Decision"),
    ("CPIAUCSL", "CPI Release"),
    ("UNRATE", "Unemployment Data"),
];

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    /// Numeric string, or "." when FRED has no value for the date.
    value: String,
}

impl Observation {
    fn parsed(&self) -> Option<(NaiveDate, f64)> {
        if self.value == "." {
            return None;
        }
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()?;
        let value = self.value.parse().ok()?;
        Some((date, value))
    }
}

pub struct FredProvider {
    api: ApiClient,
    api_key: String,
    vix_series: String,
    state: ProviderState,
}

impl FredProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api: ApiClient::new(PROVIDER_ID, BASE_URL),
            api_key: api_key.into(),
            vix_series: VIX_SERIES.to_string(),
            state: ProviderState::new(PROVIDER_ID, Self::RATE_LIMIT),
        }
    }

    const RATE_LIMIT: RateLimit = RateLimit::every(Duration::from_secs(1));

    /// Point the provider at another host (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api = ApiClient::new(PROVIDER_ID, base_url);
        self
    }

    pub fn with_vix_symbol(mut self, series: impl Into<String>) -> Self {
        self.vix_series = series.into();
        self
    }

    pub fn with_state(mut self, state: ProviderState) -> Self {
        self.state = state;
        self
    }

    fn has_key(&self) -> bool {
        if self.api_key.trim().is_empty() {
            warn!("FRED API key missing");
            return false;
        }
        true
    }

    async fn observations(&self, series_id: &str, limit: u32) -> Result<Vec<Observation>, MarketDataError> {
        let limit = limit.to_string();
        let params = [
            ("series_id", series_id),
            ("api_key", self.api_key.as_str()),
            ("file_type", "json"),
            ("limit", limit.as_str()),
            ("sort_order", "desc"),
        ];
        let response: ObservationsResponse = self.api.get(OBSERVATIONS_PATH, &params).await?.json()?;
        Ok(response.observations)
    }

    /// Latest observation with a real value, newest first.
    fn latest(observations: &[Observation]) -> Option<(NaiveDate, f64)> {
        observations.iter().find_map(Observation::parsed)
    }
}

fn vix_quote(date: NaiveDate, value: f64) -> Option<Quote> {
    let timestamp = date.and_hms_opt(0, 0, 0)?.and_utc();
    Quote::new("^VIX", value, timestamp, PROVIDER_ID)
}

#[async_trait]
impl MarketDataProvider for FredProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_events: true,
            ..Default::default()
        }
    }

    fn rate_limit(&self) -> RateLimit {
        Self::RATE_LIMIT
    }

    fn state(&self) -> &ProviderState {
        &self.state
    }

    async fn fetch_vix(&self) -> Result<Option<Quote>, MarketDataError> {
        if !self.has_key() {
            return Ok(None);
        }

        self.state
            .fetch("vix", || async {
                // A few rows so a trailing "." (holiday) does not hide the last close.
                let observations = self.observations(&self.vix_series, 5).await?;
                let Some((date, value)) = Self::latest(&observations) else {
                    warn!("No VIX data from FRED");
                    return Ok(None);
                };
                info!("FRED VIX: {} on {}", value, date);
                Ok(vix_quote(date, value))
            })
            .await
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>, MarketDataError> {
        debug!("FRED has no quote for {}", symbol);
        Ok(None)
    }

    async fn fetch_economic_events(
        &self,
        days_ahead: u32,
    ) -> Result<Option<Vec<EconomicEvent>>, MarketDataError> {
        if !self.has_key() {
            return Ok(None);
        }

        let cache_key = format!("events:{}", days_ahead);
        self.state
            .fetch(&cache_key, || async {
                let today = Utc::now().date_naive();
                let end = today + chrono::Days::new(days_ahead.into());
                let mut events = Vec::new();
                let mut last_error = None;
                let mut succeeded = 0;

                for (series_id, name) in EVENT_SERIES {
                    match self.observations(series_id, 2).await {
                        Ok(observations) => {
                            succeeded += 1;
                            let Some((date, value)) = Self::latest(&observations) else {
                                continue;
                            };
                            if today <= date && date <= end {
                                events.push(EconomicEvent {
                                    name: name.to_string(),
                                    series_id: series_id.to_string(),
                                    date,
                                    value: value.to_string(),
                                });
                            }
                        }
                        Err(e) => {
                            warn!("FRED event fetch failed for {}: {}", series_id, e);
                            last_error = Some(e);
                        }
                    }
                }

                match (succeeded, last_error) {
                    (0, Some(e)) => Err(e),
                    _ => Ok(Some(events)),
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id() {
        let provider = FredProvider::new("key");
        assert_eq!(provider.id(), "fred");
        assert!(provider.capabilities().supports_events);
        assert!(!provider.capabilities().supports_market_data);
        assert_eq!(provider.rate_limit().min_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_parse_observations_skips_missing_values() {
        let json = r#"{
            "observations": [
                {"realtime_start": "2024-05-28", "date": "2024-05-27", "value": "."},
                {"realtime_start": "2024-05-28", "date": "2024-05-24", "value": "11.93"}
            ]
        }"#;
        let response: ObservationsResponse = serde_json::from_str(json).unwrap();
        let (date, value) = FredProvider::latest(&response.observations).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 24).unwrap());
        assert_eq!(value, 11.93);

        let quote = vix_quote(date, value).unwrap();
        assert_eq!(quote.symbol, "^VIX");
        assert_eq!(quote.source, "fred");
    }

    #[test]
    fn test_only_missing_values_is_no_data() {
        let json = r#"{"observations": [{"date": "2024-05-27", "value": "."}]}"#;
        let response: ObservationsResponse = serde_json::from_str(json).unwrap();
        assert!(FredProvider::latest(&response.observations).is_none());
    }

    #[tokio::test]
    async fn test_missing_key_is_no_data() {
        let provider = FredProvider::new("");
        assert!(provider.fetch_vix().await.unwrap().is_none());
        assert!(provider.fetch_economic_events(30).await.unwrap().is_none());
        assert_eq!(provider.status().request_count, 0);
    }

    #[tokio::test]
    async fn test_quote_is_no_data() {
        let provider = FredProvider::new("key");
        assert!(provider.fetch_quote("SPY").await.unwrap().is_none());
    }
}
