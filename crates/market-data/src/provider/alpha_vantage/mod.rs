//! Alpha Vantage market data provider implementation.
//!
//! This module provides market data from Alpha Vantage API:
//! - Quotes via GLOBAL_QUOTE endpoint
//! - Daily bars via TIME_SERIES_DAILY endpoint
//!
//! Alpha Vantage has no VIX series; `fetch_vix` reports no data and the
//! connection test quotes SPY instead.
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute and 25
//! per day. Limits come back as a 200 body with a "Note" or "Information"
//! field rather than an HTTP status.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::MarketDataError;
use crate::models::{Bar, HistoryRange, Quote};
use crate::provider::http::ApiClient;
use crate::provider::{MarketDataProvider, ProviderCapabilities, ProviderState, RateLimit};

const BASE_URL: &str = "https://www.alphavantage.co";
const QUERY_PATH: &str = "/query";
const PROVIDER_ID: &str = "alphavantage";
const CONNECTION_TEST_SYMBOL: &str = "SPY";

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// Fields every Alpha Vantage response may carry instead of data.
#[derive(Debug, Default, Deserialize)]
struct ApiNotice {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// GLOBAL_QUOTE response
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(flatten)]
    notice: ApiNotice,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    /// e.g. "0.3100%"
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

/// TIME_SERIES_DAILY response
#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyBar>>,
    #[serde(flatten)]
    notice: ApiNotice,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

// ============================================================================
// AlphaVantageProvider
// ============================================================================

pub struct AlphaVantageProvider {
    api: ApiClient,
    api_key: String,
    state: ProviderState,
}

impl AlphaVantageProvider {
    const RATE_LIMIT: RateLimit = RateLimit::every(Duration::from_secs(12));

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api: ApiClient::new(PROVIDER_ID, BASE_URL),
            api_key: api_key.into(),
            state: ProviderState::new(PROVIDER_ID, Self::RATE_LIMIT),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api = ApiClient::new(PROVIDER_ID, base_url);
        self
    }

    pub fn with_state(mut self, state: ProviderState) -> Self {
        self.state = state;
        self
    }

    fn has_key(&self) -> bool {
        if self.api_key.trim().is_empty() {
            warn!("Alpha Vantage API key missing");
            return false;
        }
        true
    }

    async fn query<T: serde::de::DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T, MarketDataError> {
        let mut all_params = params.to_vec();
        all_params.push(("apikey", self.api_key.as_str()));
        self.api.get(QUERY_PATH, &all_params).await?.json()
    }

    async fn global_quote(&self, symbol: &str) -> Result<Option<Quote>, MarketDataError> {
        let response: GlobalQuoteResponse = self
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        let quote = parse_global_quote(symbol, response)?;
        match &quote {
            Some(q) => info!("Alpha Vantage {}: {}", symbol, q.price),
            None => warn!("No quote data from Alpha Vantage for {}", symbol),
        }
        Ok(quote)
    }

    async fn daily_bars(&self, symbol: &str, range: &HistoryRange) -> Result<Option<Vec<Bar>>, MarketDataError> {
        let (start, end) = range.resolve(Utc::now().date_naive())?;
        let response: TimeSeriesResponse = self
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                // 'full' is premium-only
                ("outputsize", "compact"),
            ])
            .await?;

        let bars = parse_time_series(response, start, end)?;
        debug!("Alpha Vantage: {} bars for {}", bars.len(), symbol);
        Ok(if bars.is_empty() { None } else { Some(bars) })
    }
}

/// Turn an in-body notice into an error.
fn check_notice(notice: &ApiNotice) -> Result<(), MarketDataError> {
    if let Some(msg) = &notice.error_message {
        return Err(MarketDataError::provider_error(PROVIDER_ID, msg.clone()));
    }

    for msg in [&notice.note, &notice.information].into_iter().flatten() {
        let lower = msg.to_lowercase();
        if lower.contains("per day") || lower.contains("daily") {
            return Err(MarketDataError::QuotaExhausted {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if lower.contains("frequency") || lower.contains("rate limit") {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        warn!("Alpha Vantage notice: {}", msg);
    }

    Ok(())
}

fn parse_number(raw: &Option<String>) -> Option<f64> {
    raw.as_deref()
        .map(|s| s.trim().trim_end_matches('%'))
        .and_then(|s| s.parse().ok())
}

fn parse_global_quote(symbol: &str, response: GlobalQuoteResponse) -> Result<Option<Quote>, MarketDataError> {
    check_notice(&response.notice)?;

    // Unknown symbols come back as an empty "Global Quote" object
    let Some(gq) = response.global_quote else {
        return Ok(None);
    };
    let Some(price) = parse_number(&gq.price) else {
        return Ok(None);
    };

    let timestamp = gq
        .latest_trading_day
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now);

    let volume = gq.volume.as_deref().and_then(|v| v.parse().ok());
    Ok(Quote::new(symbol, price, timestamp, PROVIDER_ID).map(|q| {
        q.with_volume(volume)
            .with_change(parse_number(&gq.change), parse_number(&gq.change_percent))
    }))
}

fn parse_time_series(
    response: TimeSeriesResponse,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Bar>, MarketDataError> {
    check_notice(&response.notice)?;

    let Some(series) = response.time_series else {
        return Ok(Vec::new());
    };

    let mut bars: Vec<Bar> = series
        .into_iter()
        .filter_map(|(date, daily)| {
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").ok()?;
            if date < start || date > end {
                return None;
            }
            Some(Bar {
                timestamp: date.and_hms_opt(0, 0, 0)?.and_utc(),
                open: daily.open.parse().ok()?,
                high: daily.high.parse().ok()?,
                low: daily.low.parse().ok()?,
                close: daily.close.parse().ok()?,
                volume: daily.volume.parse().ok(),
            })
        })
        .collect();

    bars.sort_by_key(|bar| bar.timestamp);
    Ok(bars)
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_history: true,
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
        debug!("Alpha Vantage does not publish VIX");
        Ok(None)
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>, MarketDataError> {
        if !self.has_key() {
            return Ok(None);
        }
        let cache_key = format!("quote:{}", symbol);
        self.state
            .fetch(&cache_key, || self.global_quote(symbol))
            .await
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        range: &HistoryRange,
    ) -> Result<Option<Vec<Bar>>, MarketDataError> {
        if !self.has_key() {
            return Ok(None);
        }
        let cache_key = format!("history:{}:{:?}", symbol, range);
        self.state
            .fetch(&cache_key, || self.daily_bars(symbol, range))
            .await
    }

    async fn test_connection(&self) -> bool {
        match self.fetch_quote(CONNECTION_TEST_SYMBOL).await {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                warn!("Alpha Vantage connection test failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id() {
        let provider = AlphaVantageProvider::new("test_key");
        assert_eq!(provider.id(), "alphavantage");
        assert!(provider.capabilities().supports_history);
        assert_eq!(provider.rate_limit().min_interval, Duration::from_secs(12));
    }

    #[test]
    fn test_parse_global_quote() {
        let json = r#"{
            "Global Quote": {
                "01. symbol": "SPY", "02. open": "511.1600", "03. high": "512.5500",
                "04. low": "508.5600", "05. price": "511.2900", "06. volume": "72756709",
                "07. latest trading day": "2024-05-03", "08. previous close": "505.0300",
                "09. change": "6.2600", "10. change percent": "1.2395%"
            }
        }"#;
        let response: GlobalQuoteResponse = serde_json::from_str(json).unwrap();
        let quote = parse_global_quote("SPY", response).unwrap().unwrap();
        assert_eq!(quote.price, 511.29);
        assert_eq!(quote.volume, Some(72_756_709));
        assert_eq!(quote.change, Some(6.26));
        assert_eq!(quote.change_percent, Some(1.2395));
    }

    #[test]
    fn test_empty_global_quote_is_no_data() {
        let json = r#"{"Global Quote": {}}"#;
        let response: GlobalQuoteResponse = serde_json::from_str(json).unwrap();
        assert!(parse_global_quote("NOPE", response).unwrap().is_none());
    }

    #[test]
    fn test_notice_classification() {
        let notice = ApiNotice {
            note: Some("Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute".to_string()),
            ..Default::default()
        };
        assert!(matches!(check_notice(&notice), Err(MarketDataError::RateLimited { .. })));

        let notice = ApiNotice {
            information: Some("Our standard API rate limit is 25 requests per day.".to_string()),
            ..Default::default()
        };
        assert!(matches!(check_notice(&notice), Err(MarketDataError::QuotaExhausted { .. })));

        let notice = ApiNotice {
            error_message: Some("Invalid API call.".to_string()),
            ..Default::default()
        };
        assert!(matches!(check_notice(&notice), Err(MarketDataError::ProviderError { .. })));
    }

    #[test]
    fn test_parse_time_series_filters_and_sorts() {
        let json = r#"{
            "Meta Data": {"2. Symbol": "SPY"},
            "Time Series (Daily)": {
                "2024-01-31": {"1. open": "110", "2. high": "111", "3. low": "109", "4. close": "110.5", "5. volume": "1000"},
                "2024-01-15": {"1. open": "105", "2. high": "106", "3. low": "104", "4. close": "105.5", "5. volume": "900"},
                "2024-01-10": {"1. open": "100", "2. high": "101", "3. low": "99", "4. close": "100.5", "5. volume": "800"},
                "2024-01-01": {"1. open": "95", "2. high": "96", "3. low": "94", "4. close": "95.5", "5. volume": "700"}
            }
        }"#;
        let response: TimeSeriesResponse = serde_json::from_str(json).unwrap();
        let bars = parse_time_series(
            response,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
        )
        .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 100.5);
        assert_eq!(bars[1].close, 105.5);
        assert_eq!(bars[1].volume, Some(900));
    }

    #[tokio::test]
    async fn test_vix_is_no_data() {
        let provider = AlphaVantageProvider::new("test_key");
        assert!(provider.fetch_vix().await.unwrap().is_none());
    }
}
