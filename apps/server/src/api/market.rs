use std::sync::Arc;

use algotrade_market_data::models::DEFAULT_EVENTS_DAYS_AHEAD;
use algotrade_market_data::{
    Bar, DataRequest, DataType, EconomicEvent, MarketPayload, MarketSnapshot, NewsItem, Quote,
};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

/// Route `request` under the server-wide deadline.
async fn fetch(state: &AppState, request: DataRequest) -> ApiResult<MarketPayload> {
    let payload = state
        .router
        .try_get_data(request.with_deadline(state.request_timeout))
        .await?;
    Ok(payload)
}

fn unexpected(payload: &MarketPayload) -> ApiError {
    ApiError::Internal(format!("unexpected {} payload", payload.kind()))
}

async fn get_vix(State(state): State<Arc<AppState>>) -> ApiResult<Json<Quote>> {
    match fetch(&state, DataRequest::vix()).await? {
        MarketPayload::Quote(quote) => Ok(Json(quote)),
        other => Err(unexpected(&other)),
    }
}

async fn get_quote(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Quote>> {
    match fetch(&state, DataRequest::quote(symbol)).await? {
        MarketPayload::Quote(quote) => Ok(Json(quote)),
        other => Err(unexpected(&other)),
    }
}

async fn get_market_data(State(state): State<Arc<AppState>>) -> ApiResult<Json<MarketSnapshot>> {
    match fetch(&state, DataRequest::market_data()).await? {
        MarketPayload::Snapshot(snapshot) => Ok(Json(snapshot)),
        other => Err(unexpected(&other)),
    }
}

#[derive(Deserialize)]
struct HistoryQuery {
    period: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

async fn get_history(
    Path(symbol): Path<String>,
    Query(q): Query<HistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Bar>>> {
    let request = match q.start {
        Some(start) => {
            let request = DataRequest::new(DataType::History)
                .with_symbol(symbol)
                .with_param("start", start)
                .with_max_age(3600);
            match q.end {
                Some(end) => request.with_param("end", end),
                None => request,
            }
        }
        None => DataRequest::history(symbol, q.period.unwrap_or_else(|| "1mo".to_string())),
    };
    // Reject bad ranges here so they never count against a provider.
    request.history_range()?;

    match fetch(&state, request).await? {
        MarketPayload::Bars(bars) => Ok(Json(bars)),
        other => Err(unexpected(&other)),
    }
}

async fn get_news(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<NewsItem>>> {
    match fetch(&state, DataRequest::news()).await? {
        MarketPayload::News(news) => Ok(Json(news)),
        other => Err(unexpected(&other)),
    }
}

#[derive(Deserialize)]
struct EventsQuery {
    days_ahead: Option<u32>,
}

async fn get_economic_events(
    Query(q): Query<EventsQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<EconomicEvent>>> {
    let days_ahead = q.days_ahead.unwrap_or(DEFAULT_EVENTS_DAYS_AHEAD);
    match fetch(&state, DataRequest::economic_events(days_ahead)).await? {
        MarketPayload::Events(events) => Ok(Json(events)),
        other => Err(unexpected(&other)),
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vix", get(get_vix))
        .route("/quotes/{symbol}", get(get_quote))
        .route("/market", get(get_market_data))
        .route("/history/{symbol}", get(get_history))
        .route("/news", get(get_news))
        .route("/economic-events", get(get_economic_events))
}
