//! Polygon.io provider.
//!
//! Quotes (and VIX, as the `I:VIX` index ticker) from the last-trade
//! endpoint `/v2/last/trade/{symbol}`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::MarketDataError;
use crate::models::Quote;
use crate::provider::http::ApiClient;
use crate::provider::{MarketDataProvider, ProviderCapabilities, ProviderState, RateLimit};

const BASE_URL: &str = "https://api.polygon.io";
const PROVIDER_ID: &str = "polygon";
const DEFAULT_VIX_SYMBOL: &str = "I:VIX";

#[derive(Debug, Deserialize)]
struct LastTradeResponse {
    results: Option<LastTrade>,
}

#[derive(Debug, Deserialize)]
struct LastTrade {
    #[serde(alias = "p")]
    price: Option<f64>,
    #[serde(alias = "s")]
    size: Option<f64>,
    /// SIP timestamp, nanoseconds since epoch
    #[serde(alias = "t")]
    timestamp: Option<i64>,
}

pub struct PolygonProvider {
    api: ApiClient,
    api_key: String,
    vix_symbol: String,
    state: ProviderState,
}

impl PolygonProvider {
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
            warn!("Polygon API key missing");
            return false;
        }
        true
    }

    async fn quote_for(&self, upstream: &str, label: &str) -> Result<Option<Quote>, MarketDataError> {
        let path = format!("/v2/last/trade/{}", urlencoding::encode(upstream));
        let response: LastTradeResponse = self
            .api
            .get(&path, &[("apiKey", self.api_key.as_str())])
            .await?
            .json()?;

        let quote = parse_last_trade(label, response);
        match &quote {
            Some(q) => info!("Polygon {}: {}", label, q.price),
            None => warn!("No quote data from Polygon for {}", upstream),
        }
        Ok(quote)
    }
}

fn parse_last_trade(symbol: &str, response: LastTradeResponse) -> Option<Quote> {
    let trade = response.results?;
    let timestamp = trade
        .timestamp
        .map(DateTime::from_timestamp_nanos)
        .unwrap_or_else(Utc::now);

    Quote::new(symbol, trade.price?, timestamp, PROVIDER_ID)
        .map(|q| q.with_volume(trade.size.filter(|s| *s >= 0.0).map(|s| s as u64)))
}

#[async_trait]
impl MarketDataProvider for PolygonProvider {
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
