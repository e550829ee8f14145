//! Twelve Data provider.
//!
//! Quotes (and VIX) from the latest daily bar of `/time_series`. Twelve
//! Data sends numbers as strings and reports errors in a 200 body with
//! `"status": "error"`. Credit usage comes back in `api-credits-*` headers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::MarketDataError;
use crate::models::Quote;
use crate::provider::http::ApiClient;
use crate::provider::{MarketDataProvider, ProviderCapabilities, ProviderState, RateLimit};

const BASE_URL: &str = "https://api.twelvedata.com";
const PROVIDER_ID: &str = "twelvedata";
const DEFAULT_VIX_SYMBOL: &str = "VIX";

const HEADER_CREDITS_USED: &str = "api-credits-used";
const HEADER_CREDITS_LEFT: &str = "api-credits-left";

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(default)]
    values: Vec<TimeSeriesValue>,
    status: Option<String>,
    code: Option<u16>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesValue {
    datetime: String,
    close: String,
    volume: Option<String>,
}

pub struct TwelvedataProvider {
    api: ApiClient,
    api_key: String,
    vix_symbol: String,
    state: ProviderState,
}

impl TwelvedataProvider {
    const RATE_LIMIT: RateLimit = RateLimit::every(Duration::from_secs(1));

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api: ApiClient::new(PROVIDER_ID, BASE_URL),
            api_key: api_key.into(),
            vix_symbol: DEFAULT_VIX_SYMBOL.to_string(),
            state: ProviderState::new(PROVIDER_ID, Self::RATE_LIMIT),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api = ApiClient::new(PROVIDER_ID, base_url);
        self
    }

    pub fn with_vix_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.vix_symbol = symbol.into();
        self
    }

    pub fn with_state(mut self, state: ProviderState) -> Self {
        self.state = state;
        self
    }

    fn has_key(&self) -> bool {
        if self.api_key.trim().is_empty() {
            warn!("Twelvedata API key missing");
            return false;
        }
        true
    }

    async fn quote_for(&self, upstream: &str, label: &str) -> Result<Option<Quote>, MarketDataError> {
        let params = [
            ("symbol", upstream),
            ("interval", "1day"),
            ("outputsize", "1"),
            ("apikey", self.api_key.as_str()),
        ];
        let response = self.api.get("/time_series", &params).await?;

        let used = response.header_u64(HEADER_CREDITS_USED);
        let left = response.header_u64(HEADER_CREDITS_LEFT);
        let limit = match (used, left) {
            (Some(used), Some(left)) => Some(used + left),
            _ => None,
        };
        self.state.update_quota(left, limit);

        let quote = parse_time_series(label, response.json()?)?;
        match &quote {
            Some(q) => info!("Twelvedata {} (time_series): {}", label, q.price),
            None => warn!("No time_series data from Twelvedata for {}", upstream),
        }
        Ok(quote)
    }
}

fn parse_time_series(symbol: &str, response: TimeSeriesResponse) -> Result<Option<Quote>, MarketDataError> {
    if response.status.as_deref() == Some("error") {
        let message = response.message.unwrap_or_else(|| "unknown error".to_string());
        return Err(match response.code {
            Some(401) => MarketDataError::Unauthorized {
                provider: PROVIDER_ID.to_string(),
            },
            Some(429) => MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            },
            // 400 / 404 mean the symbol is unknown or not on this plan
            Some(400) | Some(404) => {
                warn!("Twelvedata: {}", message);
                return Ok(None);
            }
            _ => MarketDataError::provider_error(PROVIDER_ID, message),
        });
    }

    let Some(latest) = response.values.into_iter().next() else {
        return Ok(None);
    };

    let price: f64 = latest.close.parse().map_err(|_| {
        MarketDataError::invalid_response(PROVIDER_ID, format!("close '{}' is not a number", latest.close))
    })?;

    let timestamp = NaiveDateTime::parse_from_str(&latest.datetime, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(&latest.datetime, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now);

    let volume = latest.volume.and_then(|v| v.parse().ok());
    Ok(Quote::new(symbol, price, timestamp, PROVIDER_ID).map(|q| q.with_volume(volume)))
}

#[async_trait]
impl MarketDataProvider for TwelvedataProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
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
            .fetch("vix", || self.quote_for(&self.vix_symbol, "^VIX"))
            .await
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>, MarketDataError> {
        if !self.has_key() {
            return Ok(None);
        }
        let cache_key = format!("quote:{}", symbol);
        self.state
            .fetch(&cache_key, || self.quote_for(symbol, symbol))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_series() {
        let json = r#"{
            "meta": {"symbol": "SPY", "interval": "1day"},
            "values": [{"datetime": "2024-05-03", "open": "511.16", "high": "512.55",
                        "low": "508.56", "close": "511.29", "volume": "72756700"}],
            "status": "ok"
        }"#;
        let response: TimeSeriesResponse = serde_json::from_str(json).unwrap();
        let quote = parse_time_series("SPY", response).unwrap().unwrap();
        assert_eq!(quote.price, 511.29);
        assert_eq!(quote.volume, Some(72_756_700));
        assert_eq!(quote.timestamp.date_naive(), NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
    }

    #[test]
    fn test_error_status() {
        let json = r#"{"code": 401, "message": "**apikey** parameter is incorrect", "status": "error"}"#;
        let response: TimeSeriesResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            parse_time_series("SPY", response),
            Err(MarketDataError::Unauthorized { .. })
        ));

        let json = r#"{"code": 404, "message": "symbol not found", "status": "error"}"#;
        let response: TimeSeriesResponse = serde_json::from_str(json).unwrap();
        assert!(parse_time_series("NOPE", response).unwrap().is_none());
    }

    #[test]
    fn test_non_numeric_close() {
        let json = r#"{"values": [{"datetime": "2024-05-03", "close": "n/a"}], "status": "ok"}"#;
        let response: TimeSeriesResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            parse_time_series("SPY", response),
            Err(MarketDataError::InvalidResponse { .. })
        ));
    }
}
