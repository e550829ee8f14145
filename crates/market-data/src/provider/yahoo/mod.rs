//! Yahoo Finance market data provider.
//!
//! No API key is needed. Current prices come from three strategies tried in
//! order until one yields a positive price:
//!
//! 1. the chart API via `yahoo_finance_api` (latest 1-minute bar)
//! 2. the quoteSummary `price` module (needs a cookie + crumb pair)
//! 3. the most recent daily close over the last five days
//!
//! Historical daily bars come from the chart API as well.

mod models;

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use reqwest::header;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use urlencoding::encode;
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{Bar, HistoryRange, MarketSnapshot, Quote};
use crate::provider::{MarketDataProvider, ProviderCapabilities, ProviderState, RateLimit};

use models::YahooQuoteSummaryResponse;

const PROVIDER_ID: &str = "yahoo";
const DEFAULT_VIX_SYMBOL: &str = "^VIX";
const CONNECTION_TEST_SYMBOL: &str = "SPY";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Basket returned for the `market_data` data type: display name, Yahoo symbol.
pub const MARKET_SYMBOLS: &[(&str, &str)] = &[
    ("VIX", "^VIX"),
    ("SPY", "SPY"),
    ("QQQ", "QQQ"),
    ("IWM", "IWM"),
];

// ============================================================================
// Crumb/Cookie Authentication
// ============================================================================

#[derive(Debug, Clone)]
struct CrumbData {
    cookie: String,
    crumb: String,
}

/// A price found by one of the strategies.
#[derive(Debug)]
struct PricePoint {
    price: f64,
    timestamp: DateTime<Utc>,
    volume: Option<u64>,
    change: Option<f64>,
    change_percent: Option<f64>,
}

impl PricePoint {
    fn from_close(close: f64, timestamp: i64, volume: u64) -> Self {
        Self {
            price: close,
            timestamp: Utc
                .timestamp_opt(timestamp, 0)
                .single()
                .unwrap_or_else(Utc::now),
            volume: Some(volume).filter(|v| *v > 0),
            change: None,
            change_percent: None,
        }
    }

    fn from_bar(bar: &yahoo::Quote) -> Self {
        Self::from_close(bar.close, bar.timestamp as i64, bar.volume)
    }

    fn into_quote(self, symbol: &str) -> Option<Quote> {
        Quote::new(symbol, self.price, self.timestamp, PROVIDER_ID).map(|q| {
            q.with_volume(self.volume)
                .with_change(self.change, self.change_percent)
        })
    }
}

/// Price strategies, in the order they are tried.
#[derive(Clone, Copy, Debug)]
enum Strategy {
    Chart,
    QuoteSummary,
    DailyClose,
}

impl Strategy {
    const ALL: [Strategy; 3] = [Self::Chart, Self::QuoteSummary, Self::DailyClose];

    fn name(self) -> &'static str {
        match self {
            Self::Chart => "chart",
            Self::QuoteSummary => "quoteSummary",
            Self::DailyClose => "daily close",
        }
    }
}

// ============================================================================
// Yahoo Provider
// ============================================================================

pub struct YahooProvider {
    connector: yahoo::YahooConnector,
    client: reqwest::Client,
    crumb: RwLock<Option<CrumbData>>,
    vix_symbol: String,
    state: ProviderState,
}

impl YahooProvider {
    const RATE_LIMIT: RateLimit = RateLimit::every(Duration::from_secs(2));

    pub fn new() -> Result<Self, MarketDataError> {
        let connector = yahoo::YahooConnector::new().map_err(|e| {
            MarketDataError::provider_error(
                PROVIDER_ID,
                format!("Failed to initialize Yahoo connector: {}", e),
            )
        })?;
        let client = reqwest::Client::builder()
            .timeout(crate::provider::http::HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            connector,
            client,
            crumb: RwLock::new(None),
            vix_symbol: DEFAULT_VIX_SYMBOL.to_string(),
            state: ProviderState::new(PROVIDER_ID, Self::RATE_LIMIT),
        })
    }

    pub fn with_vix_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.vix_symbol = symbol.into();
        self
    }

    pub fn with_state(mut self, state: ProviderState) -> Self {
        self.state = state;
        self
    }

    fn read_crumb(&self) -> RwLockReadGuard<'_, Option<CrumbData>> {
        self.crumb.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_crumb(&self) -> RwLockWriteGuard<'_, Option<CrumbData>> {
        self.crumb.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn ensure_crumb(&self) -> Result<CrumbData, MarketDataError> {
        if let Some(crumb) = self.read_crumb().as_ref() {
            return Ok(crumb.clone());
        }
        self.fetch_crumb().await
    }

    async fn fetch_crumb(&self) -> Result<CrumbData, MarketDataError> {
        let response = self.client.get("https://fc.yahoo.com").send().await?;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split_once(';').map(|(v, _)| v.to_string()))
            .ok_or_else(|| MarketDataError::provider_error(PROVIDER_ID, "Failed to parse Yahoo cookie"))?;

        let crumb = self
            .client
            .get("https://query1.finance.yahoo.com/v1/test/getcrumb")
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::COOKIE, &cookie)
            .send()
            .await?
            .text()
            .await?;

        let crumb_data = CrumbData { cookie, crumb };
        *self.write_crumb() = Some(crumb_data.clone());
        Ok(crumb_data)
    }

    fn clear_crumb(&self) {
        *self.write_crumb() = None;
    }

    fn map_yahoo_error(e: yahoo::YahooError) -> Result<Option<PricePoint>, MarketDataError> {
        match e {
            yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult => Ok(None),
            other => Err(MarketDataError::provider_error(PROVIDER_ID, other.to_string())),
        }
    }

    // ========================================================================
    // Price strategies
    // ========================================================================

    async fn price_from_chart(&self, symbol: &str) -> Result<Option<PricePoint>, MarketDataError> {
        let response = match self.connector.get_latest_quotes(symbol, "1m").await {
            Ok(response) => response,
            Err(e) => return Self::map_yahoo_error(e),
        };
        match response.last_quote() {
            Ok(bar) => Ok(Some(PricePoint::from_bar(&bar))),
            Err(e) => Self::map_yahoo_error(e),
        }
    }

    async fn price_from_summary(&self, symbol: &str) -> Result<Option<PricePoint>, MarketDataError> {
        let crumb = self.ensure_crumb().await?;
        let url = format!(
            "https://query1.finance.yahoo.com/v10/finance/quoteSummary/{}?modules=price&crumb={}",
            encode(symbol),
            encode(&crumb.crumb)
        );

        let response = self
            .client
            .get(&url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::COOKIE, &crumb.cookie)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.clear_crumb();
            return Err(MarketDataError::provider_error(
                PROVIDER_ID,
                "Yahoo authentication expired",
            ));
        }

        let data: YahooQuoteSummaryResponse = response.json().await.map_err(|e| {
            MarketDataError::invalid_response(PROVIDER_ID, format!("Failed to parse quoteSummary: {}", e))
        })?;

        let Some(price) = data.into_price() else {
            return Ok(None);
        };
        Ok(price.price().map(|value| PricePoint {
            price: value,
            timestamp: price
                .regular_market_time
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
                .unwrap_or_else(Utc::now),
            volume: price.volume(),
            change: price.change(),
            change_percent: price.change_percent(),
        }))
    }

    async fn price_from_daily_close(&self, symbol: &str) -> Result<Option<PricePoint>, MarketDataError> {
        let response = match self.connector.get_quote_range(symbol, "1d", "5d").await {
            Ok(response) => response,
            Err(e) => return Self::map_yahoo_error(e),
        };
        match response.last_quote() {
            Ok(bar) => Ok(Some(PricePoint::from_bar(&bar))),
            Err(e) => Self::map_yahoo_error(e),
        }
    }

    async fn run_strategy(&self, strategy: Strategy, symbol: &str) -> Result<Option<PricePoint>, MarketDataError> {
        match strategy {
            Strategy::Chart => self.price_from_chart(symbol).await,
            Strategy::QuoteSummary => self.price_from_summary(symbol).await,
            Strategy::DailyClose => self.price_from_daily_close(symbol).await,
        }
    }

    /// Run the strategies until one gives a positive price.
    async fn current_quote(&self, upstream: &str, label: &str) -> Result<Option<Quote>, MarketDataError> {
        let mut last_error = None;

        for strategy in Strategy::ALL {
            match self.run_strategy(strategy, upstream).await {
                Ok(Some(point)) => {
                    if let Some(quote) = point.into_quote(label) {
                        info!(
                            "Retrieved quote for {} via {}: {:.2}",
                            label,
                            strategy.name(),
                            quote.price
                        );
                        return Ok(Some(quote));
                    }
                    debug!("{} gave no positive price for {}", strategy.name(), upstream);
                }
                Ok(None) => debug!("{} had no data for {}", strategy.name(), upstream),
                Err(e) => {
                    debug!("{} failed for {}: {}", strategy.name(), upstream, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn daily_bars(&self, symbol: &str, range: &HistoryRange) -> Result<Option<Vec<Bar>>, MarketDataError> {
        let (start, end) = range.resolve(Utc::now().date_naive())?;
        let response = match self
            .connector
            .get_quote_history(symbol, to_offset(start), to_offset_end(end))
            .await
        {
            Ok(response) => response,
            Err(yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) => return Ok(None),
            Err(e) => return Err(MarketDataError::provider_error(PROVIDER_ID, e.to_string())),
        };

        let quotes = match response.quotes() {
            Ok(quotes) => quotes,
            Err(yahoo::YahooError::NoQuotes) => {
                warn!("No historical data for {} ({} to {})", symbol, start, end);
                return Ok(None);
            }
            Err(e) => return Err(MarketDataError::provider_error(PROVIDER_ID, e.to_string())),
        };

        let bars: Vec<Bar> = quotes.iter().filter_map(to_bar).collect();
        info!("Retrieved {} historical records for {}", bars.len(), symbol);
        Ok(if bars.is_empty() { None } else { Some(bars) })
    }
}

fn to_offset(date: NaiveDate) -> OffsetDateTime {
    date.and_hms_opt(0, 0, 0)
        .and_then(|dt| OffsetDateTime::from_unix_timestamp(dt.and_utc().timestamp()).ok())
        .unwrap_or_else(OffsetDateTime::now_utc)
}

/// End of `date`, so the last day is included.
fn to_offset_end(date: NaiveDate) -> OffsetDateTime {
    date.and_hms_opt(23, 59, 59)
        .and_then(|dt| OffsetDateTime::from_unix_timestamp(dt.and_utc().timestamp()).ok())
        .unwrap_or_else(OffsetDateTime::now_utc)
}

fn to_bar(q: &yahoo::Quote) -> Option<Bar> {
    make_bar(q.timestamp as i64, q.open, q.high, q.low, q.close, q.volume)
}

fn make_bar(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Option<Bar> {
    if !close.is_finite() || close <= 0.0 {
        return None;
    }
    Some(Bar {
        timestamp: Utc.timestamp_opt(timestamp, 0).single()?,
        open,
        high,
        low,
        close,
        volume: Some(volume),
    })
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_market_data: true,
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
        self.state
            .fetch("vix", || self.current_quote(&self.vix_symbol, "^VIX"))
            .await
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>, MarketDataError> {
        let cache_key = format!("quote:{}", symbol);
        self.state
            .fetch(&cache_key, || self.current_quote(symbol, symbol))
            .await
    }

    async fn fetch_market_data(&self) -> Result<Option<MarketSnapshot>, MarketDataError> {
        let mut snapshot = MarketSnapshot::new();
        let mut last_error = None;

        for (name, symbol) in MARKET_SYMBOLS {
            let result = if *symbol == DEFAULT_VIX_SYMBOL {
                self.fetch_vix().await
            } else {
                self.fetch_quote(symbol).await
            };
            match result {
                Ok(Some(quote)) => {
                    snapshot.insert(name.to_string(), quote);
                }
                Ok(None) => warn!("No market data for {}", symbol),
                Err(e) => {
                    warn!("Failed to get market data for {}: {}", symbol, e);
                    last_error = Some(e);
                }
            }
        }

        match (snapshot.is_empty(), last_error) {
            (true, Some(e)) => Err(e),
            (true, None) => Ok(None),
            (false, _) => Ok(Some(snapshot)),
        }
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        range: &HistoryRange,
    ) -> Result<Option<Vec<Bar>>, MarketDataError> {
        let cache_key = format!("history:{}:{:?}", symbol, range);
        self.state
            .fetch(&cache_key, || self.daily_bars(symbol, range))
            .await
    }

    async fn test_connection(&self) -> bool {
        match self.fetch_quote(CONNECTION_TEST_SYMBOL).await {
            Ok(Some(quote)) => {
                info!("Yahoo Finance connection test successful ({})", quote.price);
                true
            }
            Ok(None) => {
                warn!("Yahoo Finance connection test failed - no valid data");
                false
            }
            Err(e) => {
                warn!("Yahoo Finance connection test failed: {}", e);
                false
            }
        }
    }
}
