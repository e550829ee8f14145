use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Default `max_age_seconds` for a request that does not set one.
pub const DEFAULT_REQUEST_MAX_AGE_SECS: u64 = 60;

/// Default look-ahead window for economic events.
pub const DEFAULT_EVENTS_DAYS_AHEAD: u32 = 30;

/// Logical data type, the key into the routing table.
///
/// Unknown names are kept as `Other` so the router can report
/// "no available providers" for them instead of failing to parse.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    Vix,
    Quote,
    MarketData,
    History,
    News,
    EconomicEvents,
    Other(String),
}

impl DataType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Vix => "VIX",
            Self::Quote => "quote",
            Self::MarketData => "market_data",
            Self::History => "history",
            Self::News => "news",
            Self::EconomicEvents => "economic_events",
            Self::Other(name) => name,
        }
    }

    /// Whether requests of this type must carry a symbol.
    pub fn requires_symbol(&self) -> bool {
        matches!(self, Self::Quote | Self::History)
    }
}

impl From<&str> for DataType {
    fn from(value: &str) -> Self {
        match value {
            "VIX" => Self::Vix,
            "quote" => Self::Quote,
            "market_data" => Self::MarketData,
            "history" => Self::History,
            "news" => Self::News,
            "economic_events" => Self::EconomicEvents,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for DataType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for market data, as handed to the router.
#[derive(Clone, Debug)]
pub struct DataRequest {
    pub data_type: DataType,
    pub symbol: Option<String>,
    pub parameters: Option<HashMap<String, String>>,
    pub use_cache: bool,
    /// Oldest cached answer the caller will accept. Read path only; the
    /// write path records the routing rule's TTL instead.
    pub max_age_seconds: u64,
    /// Overall time budget for the call, across every provider attempt.
    pub deadline: Option<Duration>,
}

impl DataRequest {
    pub fn new(data_type: impl Into<DataType>) -> Self {
        Self {
            data_type: data_type.into(),
            symbol: None,
            parameters: None,
            use_cache: true,
            max_age_seconds: DEFAULT_REQUEST_MAX_AGE_SECS,
            deadline: None,
        }
    }

    /// VIX, accepting cached values up to a minute old.
    pub fn vix() -> Self {
        Self::new(DataType::Vix).with_max_age(60)
    }

    pub fn quote(symbol: impl Into<String>) -> Self {
        Self::new(DataType::Quote).with_symbol(symbol).with_max_age(30)
    }

    pub fn market_data() -> Self {
        Self::new(DataType::MarketData).with_max_age(300)
    }

    /// Daily bars for `symbol` over a period code (`5d`, `1mo`, `1y`, ...).
    pub fn history(symbol: impl Into<String>, period: impl Into<String>) -> Self {
        Self::new(DataType::History)
            .with_symbol(symbol)
            .with_param("period", period)
            .with_max_age(3600)
    }

    pub fn news() -> Self {
        Self::new(DataType::News).with_max_age(300)
    }

    pub fn economic_events(days_ahead: u32) -> Self {
        Self::new(DataType::EconomicEvents)
            .with_param("days_ahead", days_ahead.to_string())
            .with_max_age(3600)
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age_seconds = seconds;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters
            .as_ref()
            .and_then(|p| p.get(key))
            .map(String::as_str)
    }

    /// The symbol, or `SymbolRequired` if it is missing or blank.
    pub fn require_symbol(&self) -> Result<&str, MarketDataError> {
        match self.symbol.as_deref().map(str::trim) {
            Some(symbol) if !symbol.is_empty() => Ok(symbol),
            _ => Err(MarketDataError::SymbolRequired {
                data_type: self.data_type.to_string(),
            }),
        }
    }

    /// Date range for a `history` request, from `period` or `start`/`end`.
    pub fn history_range(&self) -> Result<HistoryRange, MarketDataError> {
        if let Some(start) = self.param("start") {
            let start = parse_date("start", start)?;
            let end = match self.param("end") {
                Some(end) => parse_date("end", end)?,
                None => chrono::Utc::now().date_naive(),
            };
            if end < start {
                return Err(MarketDataError::InvalidParameter {
                    name: "end".to_string(),
                    message: format!("{} is before start {}", end, start),
                });
            }
            return Ok(HistoryRange::Between { start, end });
        }

        let period = self.param("period").unwrap_or("1mo");
        HistoryRange::period(period)
    }

    /// Look-ahead window for an `economic_events` request.
    pub fn days_ahead(&self) -> Result<u32, MarketDataError> {
        match self.param("days_ahead") {
            None => Ok(DEFAULT_EVENTS_DAYS_AHEAD),
            Some(raw) => raw.parse().map_err(|_| MarketDataError::InvalidParameter {
                name: "days_ahead".to_string(),
                message: format!("'{}' is not a non-negative integer", raw),
            }),
        }
    }
}

fn parse_date(name: &str, raw: &str) -> Result<NaiveDate, MarketDataError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| MarketDataError::InvalidParameter {
        name: name.to_string(),
        message: format!("'{}': {}", raw, e),
    })
}

/// Date span for historical bars.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryRange {
    /// Yahoo-style range code: `5d`, `1mo`, `1y`, `ytd`, `max`
    Period(String),
    Between { start: NaiveDate, end: NaiveDate },
}

impl HistoryRange {
    /// Validate a period code.
    pub fn period(code: &str) -> Result<Self, MarketDataError> {
        let range = Self::Period(code.to_string());
        range.resolve(chrono::Utc::now().date_naive())?;
        Ok(range)
    }

    /// Concrete `(start, end)` dates relative to `today`.
    pub fn resolve(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), MarketDataError> {
        let code = match self {
            Self::Between { start, end } => return Ok((*start, *end)),
            Self::Period(code) => code.as_str(),
        };

        let invalid = || MarketDataError::InvalidParameter {
            name: "period".to_string(),
            message: format!("unsupported period '{}'", code),
        };

        let start = match code {
            "max" => NaiveDate::from_ymd_opt(1970, 1, 1),
            "ytd" => NaiveDate::from_ymd_opt(today.year(), 1, 1),
            _ => {
                let (count, unit) = split_period(code).ok_or_else(invalid)?;
                match unit {
                    "d" => today.checked_sub_days(chrono::Days::new(count.into())),
                    "mo" => today.checked_sub_months(Months::new(count)),
                    "y" => today.checked_sub_months(Months::new(count.saturating_mul(12))),
                    _ => return Err(invalid()),
                }
            }
        };

        let start = start.ok_or_else(invalid)?;
        Ok((start, today))
    }
}

fn split_period(code: &str) -> Option<(u32, &str)> {
    let digits = code.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let count = code[..digits].parse().ok()?;
    Some((count, &code[digits..]))
}
