use std::collections::BTreeMap;
use std::sync::Arc;

use algotrade_market_data::ProviderStatusReport;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

async fn get_provider_status(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<BTreeMap<String, ProviderStatusReport>>> {
    Ok(Json(state.router.provider_status()))
}

async fn test_providers(State(state): State<Arc<AppState>>) -> ApiResult<Json<BTreeMap<String, bool>>> {
    Ok(Json(state.router.test_all_providers().await))
}

#[derive(Deserialize, Default)]
struct ResetBody {
    name: Option<String>,
}

/// Reset one provider (`{"name": ".."}`) or, with no body, all of them.
async fn reset_provider_errors(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let body: ResetBody = if body.iter().all(u8::is_ascii_whitespace) {
        ResetBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid reset body: {}", e)))?
    };
    state.router.reset_provider_errors(body.name.as_deref())?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct EnabledBody {
    enabled: bool,
}

async fn set_provider_enabled(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<EnabledBody>,
) -> ApiResult<StatusCode> {
    state.router.set_provider_enabled(&name, body.enabled)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/providers", get(get_provider_status))
        .route("/providers/test", post(test_providers))
        .route("/providers/reset", post(reset_provider_errors))
        .route("/providers/{name}/enabled", put(set_provider_enabled))
}
