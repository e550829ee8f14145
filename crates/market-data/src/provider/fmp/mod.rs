//! Financial Modeling Prep (FMP) provider.
//!
//! Quotes (and VIX) via `/api/v3/quote/{symbol}`, which answers with a JSON
//! array; the first element carries the price.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::MarketDataError;
use crate::models::Quote;
use crate::provider::http::ApiClient;
use crate::provider::{MarketDataProvider, ProviderCapabilities, ProviderState, RateLimit};

const BASE_URL: &str = "https://financialmodelingprep.com";
const PROVIDER_ID: &str = "fmp";
const DEFAULT_VIX_SYMBOL: &str = "^VIX";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuoteResponse {
    Quotes(Vec<QuoteItem>),
    Error {
        #[serde(rename = "Error Message")]
        error_message: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteItem {
    price: Option<f64>,
    change: Option<f64>,
    changes_percentage: Option<f64>,
    volume: Option<f64>,
    timestamp: Option<i64>,
}

pub struct FmpProvider {
    api: ApiClient,
    api_key: String,
    vix_symbol: String,
    state: ProviderState,
}

impl FmpProvider {
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
            warn!("FMP API key missing");
            return false;
        }
        true
    }

    async fn quote_for(&self, upstream: &str, label: &str) -> Result<Option<Quote>, MarketDataError> {
        let path = format!("/api/v3/quote/{}", urlencoding::encode(upstream));
        let response: QuoteResponse = self
            .api
            .get(&path, &[("apikey", self.api_key.as_str())])
            .await?
            .json()?;

        let quote = parse_quote(label, response)?;
        match &quote {
            Some(q) => info!("FMP {}: {}", label, q.price),
            None => warn!("No quote data from FMP for {}", upstream),
        }
        Ok(quote)
    }
}

fn parse_quote(symbol: &str, response: QuoteResponse) -> Result<Option<Quote>, MarketDataError> {
    let items = match response {
        QuoteResponse::Quotes(items) => items,
        QuoteResponse::Error { error_message } => {
            return Err(MarketDataError::provider_error(PROVIDER_ID, error_message))
        }
    };

    let Some(item) = items.into_iter().next() else {
        return Ok(None);
    };
    let Some(price) = item.price else {
        return Ok(None);
    };

    let timestamp = item
        .timestamp
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or_else(Utc::now);

    Ok(Quote::new(symbol, price, timestamp, PROVIDER_ID).map(|q| {
        q.with_volume(item.volume.filter(|v| *v >= 0.0).map(|v| v as u64))
            .with_change(item.change, item.changes_percentage)
    }))
}

#[async_trait]
impl MarketDataProvider for FmpProvider {
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
