//! Provider behavior against a mocked upstream.

use std::time::Duration;

use algotrade_market_data::{
    AlphaVantageProvider, FinnhubProvider, FmpProvider, FredProvider, MarketDataError,
    MarketDataProvider, PolygonProvider, ProviderState, RateLimit, TwelvedataProvider,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn unthrottled(id: &'static str) -> ProviderState {
    ProviderState::new(id, RateLimit::every(Duration::ZERO))
}

// ============================================================================
// FRED
// ============================================================================

#[tokio::test]
async fn test_fred_vix_skips_missing_observations() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fred/series/observations"))
        .and(query_param("series_id", "VIXCLS"))
        .and(query_param("api_key", "fred-key"))
        .and(query_param("sort_order", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "observations": [
                {"date": "2024-05-03", "value": "."},
                {"date": "2024-05-02", "value": "14.68"},
                {"date": "2024-05-01", "value": "15.39"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = FredProvider::new("fred-key").with_base_url(server.uri());
    let quote = provider.fetch_vix().await.unwrap().unwrap();

    assert_eq!(quote.symbol, "^VIX");
    assert_eq!(quote.price, 14.68);
    assert_eq!(quote.source, "fred");
    assert_eq!(quote.timestamp.date_naive().to_string(), "2024-05-02");

    let status = provider.status();
    assert_eq!(status.request_count, 1);
    assert_eq!(status.error_count, 0);
}

#[tokio::test]
async fn test_fred_vix_series_override() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fred/series/observations"))
        .and(query_param("series_id", "VIXCUSTOM"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "observations": [{"date": "2024-05-02", "value": "21.5"}]
        })))
        .mount(&server)
        .await;

    let provider = FredProvider::new("fred-key")
        .with_base_url(server.uri())
        .with_vix_symbol("VIXCUSTOM");

    let quote = provider.fetch_vix().await.unwrap().unwrap();
    assert_eq!(quote.price, 21.5);
}

#[tokio::test]
async fn test_fred_only_dots_is_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fred/series/observations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "observations": [{"date": "2024-05-03", "value": "."}]
        })))
        .mount(&server)
        .await;

    let provider = FredProvider::new("fred-key").with_base_url(server.uri());
    assert!(provider.fetch_vix().await.unwrap().is_none());
    assert_eq!(provider.status().error_count, 0);
}

#[tokio::test]
async fn test_missing_key_answers_no_data_without_calling_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let fred = FredProvider::new("  ").with_base_url(server.uri());
    let finnhub = FinnhubProvider::new("").with_base_url(server.uri());

    assert!(fred.fetch_vix().await.unwrap().is_none());
    assert!(finnhub.fetch_quote("SPY").await.unwrap().is_none());
    assert!(finnhub.fetch_news().await.unwrap().is_none());
    assert_eq!(fred.status().request_count, 0);
}

// ============================================================================
// Finnhub
// ============================================================================

#[tokio::test]
async fn test_finnhub_quote_records_quota_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .and(query_param("symbol", "SPY"))
        .and(query_param("token", "fh-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "6")
                .insert_header("x-ratelimit-limit", "60")
                .set_body_json(json!({
                    "c": 511.29, "d": 5.1, "dp": 1.0075,
                    "h": 512.55, "l": 508.56, "o": 511.16, "pc": 506.19,
                    "t": 1714766400
                })),
        )
        .mount(&server)
        .await;

    let provider = FinnhubProvider::new("fh-key").with_base_url(server.uri());
    let quote = provider.fetch_quote("SPY").await.unwrap().unwrap();

    assert_eq!(quote.price, 511.29);
    assert_eq!(quote.change, Some(5.1));
    assert_eq!(quote.timestamp.timestamp(), 1714766400);

    let status = provider.status();
    assert_eq!(status.quota_remaining, Some(6));
    assert_eq!(status.quota_limit, Some(60));
    assert!((status.quota_usage_percent() - 90.0).abs() < 1e-9);
    assert!(provider.is_healthy());
}

#[tokio::test]
async fn test_finnhub_nearly_spent_quota_is_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "1")
                .insert_header("x-ratelimit-limit", "60")
                .set_body_json(json!({"c": 14.2, "t": 1714766400})),
        )
        .mount(&server)
        .await;

    let provider = FinnhubProvider::new("fh-key").with_base_url(server.uri());
    assert!(provider.fetch_vix().await.unwrap().is_some());
    assert!(!provider.is_healthy());
}

#[tokio::test]
async fn test_finnhub_zero_price_is_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "c": 0, "d": null, "dp": null, "h": 0, "l": 0, "o": 0, "pc": 0, "t": 0
        })))
        .mount(&server)
        .await;

    let provider = FinnhubProvider::new("fh-key").with_base_url(server.uri());
    assert!(provider.fetch_quote("NOPE").await.unwrap().is_none());
}

#[tokio::test]
async fn test_finnhub_news_drops_blank_headlines() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .and(query_param("category", "general"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"headline": "Fed holds rates", "summary": "Unchanged", "source": "Reuters",
             "url": "https://example.com/a", "datetime": 1714766400},
            {"headline": "", "summary": "ignored"}
        ])))
        .mount(&server)
        .await;

    let provider = FinnhubProvider::new("fh-key").with_base_url(server.uri());
    let news = provider.fetch_news().await.unwrap().unwrap();

    assert_eq!(news.len(), 1);
    assert_eq!(news[0].headline, "Fed holds rates");
    assert_eq!(news[0].source.as_deref(), Some("Reuters"));
}

#[tokio::test]
async fn test_unauthorized_marks_provider_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let provider = FinnhubProvider::new("bad-key").with_base_url(server.uri());
    let err = provider.fetch_quote("SPY").await.unwrap_err();

    assert!(matches!(err, MarketDataError::Unauthorized { .. }));
    let status = provider.status();
    assert!(!status.is_available);
    assert_eq!(status.error_count, 1);
    assert!(!provider.is_healthy());

    provider.state().reset_health();
    assert!(provider.is_healthy());
    assert_eq!(provider.status().request_count, 1);
}

#[tokio::test]
async fn test_http_status_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .and(query_param("symbol", "LIMIT"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .and(query_param("symbol", "QUOTA"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .and(query_param("symbol", "BOOM"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let provider = FinnhubProvider::new("fh-key")
        .with_base_url(server.uri())
        .with_state(unthrottled("finnhub"));

    let err = provider.fetch_quote("LIMIT").await.unwrap_err();
    assert!(matches!(err, MarketDataError::RateLimited { .. }));
    // Rate limiting is transient
    assert!(provider.status().is_available);

    let err = provider.fetch_quote("QUOTA").await.unwrap_err();
    assert!(matches!(err, MarketDataError::QuotaExhausted { .. }));
    assert!(!provider.status().is_available);

    match provider.fetch_quote("BOOM").await.unwrap_err() {
        MarketDataError::ProviderError { provider, message } => {
            assert_eq!(provider, "finnhub");
            assert!(message.contains("502"));
            assert!(message.contains("bad gateway"));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(provider.status().error_count, 3);
    assert_eq!(provider.status().request_count, 3);
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let provider = FinnhubProvider::new("fh-key").with_base_url(server.uri());
    let err = provider.fetch_quote("SPY").await.unwrap_err();
    assert!(matches!(err, MarketDataError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_micro_cache_serves_repeat_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"c": 100.5, "t": 1714766400})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = FinnhubProvider::new("fh-key")
        .with_base_url(server.uri())
        .with_state(unthrottled("finnhub"));

    let first = provider.fetch_quote("SPY").await.unwrap().unwrap();
    let second = provider.fetch_quote("SPY").await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(provider.status().request_count, 1);
}

// ============================================================================
// FMP
// ============================================================================

#[tokio::test]
async fn test_fmp_quote() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/quote/SPY"))
        .and(query_param("apikey", "fmp-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "symbol": "SPY", "price": 511.29, "change": 5.1,
            "changesPercentage": 1.0075, "volume": 72756700, "timestamp": 1714766400
        }])))
        .mount(&server)
        .await;

    let provider = FmpProvider::new("fmp-key").with_base_url(server.uri());
    let quote = provider.fetch_quote("SPY").await.unwrap().unwrap();

    assert_eq!(quote.price, 511.29);
    assert_eq!(quote.volume, Some(72_756_700));
    assert_eq!(quote.change_percent, Some(1.0075));
    assert_eq!(quote.source, "fmp");
}

#[tokio::test]
async fn test_fmp_error_message_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/quote/SPY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Error Message": "Invalid API KEY."
        })))
        .mount(&server)
        .await;

    let provider = FmpProvider::new("fmp-key").with_base_url(server.uri());
    match provider.fetch_quote("SPY").await.unwrap_err() {
        MarketDataError::ProviderError { message, .. } => assert_eq!(message, "Invalid API KEY."),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_fmp_empty_array_is_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/quote/ZZZZ"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let provider = FmpProvider::new("fmp-key").with_base_url(server.uri());
    assert!(provider.fetch_quote("ZZZZ").await.unwrap().is_none());
}

// ============================================================================
// Polygon
// ============================================================================

#[tokio::test]
async fn test_polygon_last_trade() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/last/trade/SPY"))
        .and(query_param("apiKey", "poly-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request_id": "abc",
            "results": {"T": "SPY", "p": 511.3, "s": 200, "t": 1714766400000000000_i64},
            "status": "OK"
        })))
        .mount(&server)
        .await;

    let provider = PolygonProvider::new("poly-key").with_base_url(server.uri());
    let quote = provider.fetch_quote("SPY").await.unwrap().unwrap();

    assert_eq!(quote.price, 511.3);
    assert_eq!(quote.volume, Some(200));
    assert_eq!(quote.timestamp.timestamp(), 1714766400);
}

#[tokio::test]
async fn test_polygon_without_results_is_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/last/trade/SPY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "NOT_FOUND"})))
        .mount(&server)
        .await;

    let provider = PolygonProvider::new("poly-key").with_base_url(server.uri());
    assert!(provider.fetch_quote("SPY").await.unwrap().is_none());
}

// ============================================================================
// Twelvedata
// ============================================================================

#[tokio::test]
async fn test_twelvedata_time_series_and_credits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/time_series"))
        .and(query_param("symbol", "SPY"))
        .and(query_param("interval", "1day"))
        .and(query_param("outputsize", "1"))
        .and(query_param("apikey", "td-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("api-credits-used", "3")
                .insert_header("api-credits-left", "5")
                .set_body_json(json!({
                    "meta": {"symbol": "SPY", "interval": "1day"},
                    "values": [{"datetime": "2024-05-03", "open": "511.16", "high": "512.55",
                                "low": "508.56", "close": "511.29", "volume": "72756700"}],
                    "status": "ok"
                })),
        )
        .mount(&server)
        .await;

    let provider = TwelvedataProvider::new("td-key").with_base_url(server.uri());
    let quote = provider.fetch_quote("SPY").await.unwrap().unwrap();

    assert_eq!(quote.price, 511.29);
    assert_eq!(quote.volume, Some(72_756_700));

    let status = provider.status();
    assert_eq!(status.quota_remaining, Some(5));
    assert_eq!(status.quota_limit, Some(8));
}

#[tokio::test]
async fn test_twelvedata_error_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/time_series"))
        .and(query_param("symbol", "LIMIT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 429, "message": "You have run out of API credits", "status": "error"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/time_series"))
        .and(query_param("symbol", "UNKNOWN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 404, "message": "symbol not found", "status": "error"
        })))
        .mount(&server)
        .await;

    let provider = TwelvedataProvider::new("td-key")
        .with_base_url(server.uri())
        .with_state(unthrottled("twelvedata"));

    let err = provider.fetch_quote("LIMIT").await.unwrap_err();
    assert!(matches!(err, MarketDataError::RateLimited { .. }));

    assert!(provider.fetch_quote("UNKNOWN").await.unwrap().is_none());
    assert_eq!(provider.status().error_count, 1);
}

// ============================================================================
// Alpha Vantage
// ============================================================================

#[tokio::test]
async fn test_alpha_vantage_global_quote() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("function", "GLOBAL_QUOTE"))
        .and(query_param("symbol", "SPY"))
        .and(query_param("apikey", "av-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Global Quote": {
                "01. symbol": "SPY",
                "05. price": "511.2900",
                "06. volume": "72756700",
                "07. latest trading day": "2024-05-03",
                "09. change": "5.1000",
                "10. change percent": "1.0075%"
            }
        })))
        .mount(&server)
        .await;

    let provider = AlphaVantageProvider::new("av-key").with_base_url(server.uri());
    let quote = provider.fetch_quote("SPY").await.unwrap().unwrap();

    assert_eq!(quote.price, 511.29);
    assert_eq!(quote.change_percent, Some(1.0075));
    assert_eq!(quote.timestamp.date_naive().to_string(), "2024-05-03");
}

#[tokio::test]
async fn test_alpha_vantage_notices() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("symbol", "FAST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Note": "Our standard API call frequency is 5 calls per minute."
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("symbol", "DAILY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Information": "You have reached the 25 requests per day limit."
        })))
        .mount(&server)
        .await;

    let provider = AlphaVantageProvider::new("av-key")
        .with_base_url(server.uri())
        .with_state(unthrottled("alphavantage"));

    let err = provider.fetch_quote("FAST").await.unwrap_err();
    assert!(matches!(err, MarketDataError::RateLimited { .. }));

    let err = provider.fetch_quote("DAILY").await.unwrap_err();
    assert!(matches!(err, MarketDataError::QuotaExhausted { .. }));
    assert!(!provider.status().is_available);
}

#[tokio::test]
async fn test_alpha_vantage_has_no_vix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider = AlphaVantageProvider::new("av-key").with_base_url(server.uri());
    assert!(provider.fetch_vix().await.unwrap().is_none());
}
