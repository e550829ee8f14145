use std::sync::Arc;
use std::time::Duration;

use algotrade_market_data::{DataRouter, JsonFileKeyStore, RouterSettings};
use anyhow::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub router: Arc<DataRouter>,
    /// Deadline applied to every routed request.
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(router: Arc<DataRouter>, request_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            router,
            request_timeout,
        })
    }
}

pub fn init_tracing() {
    let log_format = std::env::var("AT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let settings = match &config.routing_file {
        Some(path) => RouterSettings::from_json_file(path)
            .with_context(|| format!("Failed to load routing settings from {}", path.display()))?,
        None => RouterSettings::default(),
    };

    let key_store = JsonFileKeyStore::new(&config.api_keys_file);
    tracing::info!("API keys file in use: {}", key_store.path().display());

    let router = DataRouter::from_key_store(&key_store, &settings);
    let providers = router.registry().provider_names();
    if providers.is_empty() {
        tracing::warn!("No market data providers registered; every request will be unavailable");
    } else {
        tracing::info!("Registered providers: {}", providers.join(", "));
    }

    Ok(AppState::new(Arc::new(router), config.request_timeout))
}
