//! Finnhub market data provider implementation.
//!
//! This module provides market data from Finnhub API:
//! - Quotes (and VIX) via the /quote endpoint
//! - General market headlines via the /news endpoint
//!
//! Finnhub free tier is limited to 60 API calls per minute and reports the
//! remaining budget in `X-Ratelimit-*` response headers.
//! API documentation: https://finnhub.io/docs/api

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::MarketDataError;
use crate::models::{NewsItem, Quote};
use crate::provider::http::{ApiClient, ApiResponse};
use crate::provider::{MarketDataProvider, ProviderCapabilities, ProviderState, RateLimit};

const BASE_URL: &str = "https://finnhub.io/api/v1";
const PROVIDER_ID: &str = "finnhub";
const DEFAULT_VIX_SYMBOL: &str = "^VIX";

const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_LIMIT: &str = "x-ratelimit-limit";

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /quote endpoint
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Change
    d: Option<f64>,
    /// Percent change
    dp: Option<f64>,
    /// Timestamp (Unix)
    t: Option<i64>,
}

/// Item of the /news array
#[derive(Debug, Deserialize)]
struct NewsResponseItem {
    #[serde(default)]
    headline: String,
    #[serde(default)]
    summary: String,
    source: Option<String>,
    url: Option<String>,
    /// Publication time (Unix)
    datetime: Option<i64>,
}

// ============================================================================
// FinnhubProvider
// ============================================================================

pub struct FinnhubProvider {
    api: ApiClient,
    api_key: String,
    vix_symbol: String,
    state: ProviderState,
}

impl FinnhubProvider {
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
            warn!("Finnhub API key missing");
            return false;
        }
        true
    }

    /// GET with the token attached; records quota headers on success.
    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<ApiResponse, MarketDataError> {
        let mut all = params.to_vec();
        all.push(("token", self.api_key.as_str()));
        let response = self.api.get(path, &all).await?;

        self.state.update_quota(
            response.header_u64(HEADER_REMAINING),
            response.header_u64(HEADER_LIMIT),
        );
        Ok(response)
    }

    async fn quote_for(&self, upstream: &str, label: &str) -> Result<Option<Quote>, MarketDataError> {
        let response: QuoteResponse = self.get("/quote", &[("symbol", upstream)]).await?.json()?;
        let quote = parse_quote(label, response);
        match &quote {
            Some(q) => info!("Finnhub {}: {}", label, q.price),
            // Finnhub answers unknown symbols with c = 0
            None => warn!("No quote data from Finnhub for {}", upstream),
        }
        Ok(quote)
    }
}

fn parse_quote(symbol: &str, response: QuoteResponse) -> Option<Quote> {
    let timestamp = response
        .t
        .filter(|ts| *ts > 0)
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or_else(Utc::now);

    Quote::new(symbol, response.c?, timestamp, PROVIDER_ID)
        .map(|q| q.with_change(response.d, response.dp))
}

fn parse_news(items: Vec<NewsResponseItem>) -> Vec<NewsItem> {
    items
        .into_iter()
        .filter(|item| !item.headline.is_empty())
        .map(|item| NewsItem {
            headline: item.headline,
            summary: item.summary,
            source: item.source.filter(|s| !s.is_empty()),
            url: item.url.filter(|s| !s.is_empty()),
            published_at: item.datetime.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        })
        .collect()
}

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_news: true,
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

    async fn fetch_news(&self) -> Result<Option<Vec<NewsItem>>, MarketDataError> {
        if !self.has_key() {
            return Ok(None);
        }
        self.state
            .fetch("news:general", || async {
                let items: Vec<NewsResponseItem> =
                    self.get("/news", &[("category", "general")]).await?.json()?;
                let news = parse_news(items);
                info!("Finnhub returned {} headlines", news.len());
                Ok(Some(news))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id() {
        let provider = FinnhubProvider::new("test_key");
        assert_eq!(provider.id(), "finnhub");
        assert!(provider.capabilities().supports_news);
        assert!(!provider.capabilities().supports_history);
    }

    #[test]
    fn test_parse_quote_response() {
        let json = r#"{"c": 261.74, "d": 1.26, "dp": 0.4837, "h": 263.31, "l": 260.68, "o": 261.07, "pc": 260.48, "t": 1714766400}"#;
        let response: QuoteResponse = serde_json::from_str(json).unwrap();
        let quote = parse_quote("AAPL", response).unwrap();
        assert_eq!(quote.price, 261.74);
        assert_eq!(quote.change, Some(1.26));
        assert_eq!(quote.timestamp.timestamp(), 1714766400);
        assert_eq!(quote.source, "finnhub");
    }

    #[test]
    fn test_zero_price_is_no_data() {
        let json = r#"{"c": 0, "d": null, "dp": null, "h": 0, "l": 0, "o": 0, "pc": 0, "t": 0}"#;
        let response: QuoteResponse = serde_json::from_str(json).unwrap();
        assert!(parse_quote("NOPE", response).is_none());
    }

    #[test]
    fn test_parse_news() {
        let json = r#"[
            {"category": "top news", "datetime": 1714766400, "headline": "Stocks rally", "id": 1,
             "image": "", "related": "", "source": "Reuters", "summary": "Indexes rose.", "url": "https://example.com/a"},
            {"category": "top news", "datetime": 1714766000, "headline": "", "id": 2,
             "image": "", "related": "", "source": "", "summary": "", "url": ""}
        ]"#;
        let items: Vec<NewsResponseItem> = serde_json::from_str(json).unwrap();
        let news = parse_news(items);
        assert_eq!(news.len(), 1);
        assert_eq!(news[0].headline, "Stocks rally");
        assert_eq!(news[0].source.as_deref(), Some("Reuters"));
        assert!(news[0].published_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_key_is_no_data() {
        let provider = FinnhubProvider::new(" ");
        assert!(provider.fetch_quote("AAPL").await.unwrap().is_none());
        assert!(provider.fetch_news().await.unwrap().is_none());
    }
}
