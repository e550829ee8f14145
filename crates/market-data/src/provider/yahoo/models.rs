//! Yahoo Finance quoteSummary response models.
//!
//! Only the `price` module is requested; it is the second of the three
//! price strategies the provider tries.

use serde::Deserialize;

/// Main response wrapper for quoteSummary API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResponse {
    pub quote_summary: YahooQuoteSummary,
}

/// Quote summary container
#[derive(Debug, Deserialize)]
pub struct YahooQuoteSummary {
    /// `null` when Yahoo does not know the symbol
    #[serde(default)]
    pub result: Option<Vec<YahooQuoteSummaryResult>>,
}

impl YahooQuoteSummaryResponse {
    pub fn into_price(self) -> Option<YahooPriceData> {
        self.quote_summary
            .result?
            .into_iter()
            .next()
            .and_then(|r| r.price)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResult {
    pub price: Option<YahooPriceData>,
}

/// Price data from quoteSummary API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooPriceData {
    pub regular_market_price: Option<YahooPriceDetail>,
    pub regular_market_change: Option<YahooPriceDetail>,
    pub regular_market_change_percent: Option<YahooPriceDetail>,
    pub regular_market_volume: Option<YahooPriceDetail>,
    pub regular_market_time: Option<i64>,
}

/// Price detail with raw and formatted values.
/// Yahoo sends `{}` when a value is unavailable.
#[derive(Debug, Deserialize, Clone)]
pub struct YahooPriceDetail {
    pub raw: Option<f64>,
}

impl YahooPriceData {
    pub fn price(&self) -> Option<f64> {
        raw(&self.regular_market_price)
    }

    pub fn change(&self) -> Option<f64> {
        raw(&self.regular_market_change)
    }

    /// Percent change; Yahoo reports it as a fraction.
    pub fn change_percent(&self) -> Option<f64> {
        raw(&self.regular_market_change_percent).map(|v| v * 100.0)
    }

    pub fn volume(&self) -> Option<u64> {
        raw(&self.regular_market_volume)
            .filter(|v| *v >= 0.0)
            .map(|v| v as u64)
    }
}

fn raw(detail: &Option<YahooPriceDetail>) -> Option<f64> {
    detail.as_ref().and_then(|d| d.raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_price_detail_empty() {
        let detail: YahooPriceDetail = serde_json::from_str("{}").unwrap();
        assert_eq!(detail.raw, None);
    }

    #[test]
    fn test_deserialize_quote_summary_price() {
        let json = r#"{
            "quoteSummary": {
                "result": [{
                    "price": {
                        "regularMarketPrice": {"raw": 13.49, "fmt": "13.49"},
                        "regularMarketChange": {"raw": -0.5, "fmt": "-0.50"},
                        "regularMarketChangePercent": {"raw": -0.0357, "fmt": "-3.57%"},
                        "regularMarketVolume": {},
                        "regularMarketTime": 1714766400,
                        "currency": "USD"
                    }
                }],
                "error": null
            }
        }"#;
        let response: YahooQuoteSummaryResponse = serde_json::from_str(json).unwrap();
        let price = response.into_price().unwrap();
        assert_eq!(price.price(), Some(13.49));
        assert_eq!(price.change(), Some(-0.5));
        assert!((price.change_percent().unwrap() + 3.57).abs() < 1e-9);
        assert_eq!(price.volume(), None);
        assert_eq!(price.regular_market_time, Some(1714766400));
    }

    #[test]
    fn test_deserialize_empty_result() {
        let json = r#"{"quoteSummary": {"result": null, "error": {"code": "Not Found"}}}"#;
        let response: YahooQuoteSummaryResponse = serde_json::from_str(json).unwrap();
        assert!(response.into_price().is_none());

        let json = r#"{"quoteSummary": {"result": []}}"#;
        let response: YahooQuoteSummaryResponse = serde_json::from_str(json).unwrap();
        assert!(response.into_price().is_none());
    }
}
