use std::sync::Arc;

use algotrade_market_data::CacheStats;
use axum::{
    extract::{Query, State},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiResult, main_lib::AppState};

async fn get_cache_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<CacheStats>> {
    Ok(Json(state.router.cache_stats()))
}

#[derive(Deserialize)]
struct ClearQuery {
    pattern: Option<String>,
}

#[derive(Serialize)]
struct ClearResponse {
    removed: usize,
}

async fn clear_cache(
    Query(q): Query<ClearQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ClearResponse>> {
    let pattern = q.pattern.as_deref().filter(|p| !p.is_empty());
    let removed = state.router.clear_cache(pattern);
    Ok(Json(ClearResponse { removed }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cache/stats", get(get_cache_stats))
        .route("/cache", delete(clear_cache))
}
