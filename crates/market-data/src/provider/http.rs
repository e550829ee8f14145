//! Thin reqwest wrapper shared by the REST providers.
//!
//! Maps HTTP failures onto `MarketDataError` the same way for every
//! upstream and hands back the raw body plus headers so providers can read
//! quota counters.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::MarketDataError;

/// Timeout for a single upstream HTTP call.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest slice of an error body kept in messages.
const MAX_ERROR_BODY: usize = 200;

pub(crate) struct ApiClient {
    provider: &'static str,
    client: Client,
    base_url: String,
}

pub(crate) struct ApiResponse {
    provider: &'static str,
    pub body: String,
    pub headers: HeaderMap,
}

impl ApiClient {
    pub fn new(provider: &'static str, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            provider,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}{path}` with query parameters.
    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<ApiResponse, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);

        debug!("{} request: {} with {} params", self.provider, path, params.len());

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout {
                        provider: self.provider.to_string(),
                    }
                } else {
                    MarketDataError::Network(e)
                }
            })?;

        let status = response.status();
        let headers = response.headers().clone();

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(MarketDataError::RateLimited {
                    provider: self.provider.to_string(),
                })
            }
            StatusCode::UNAUTHORIZED => {
                return Err(MarketDataError::Unauthorized {
                    provider: self.provider.to_string(),
                })
            }
            StatusCode::FORBIDDEN => {
                return Err(MarketDataError::QuotaExhausted {
                    provider: self.provider.to_string(),
                })
            }
            _ => {}
        }

        let body = response.text().await.map_err(|e| {
            MarketDataError::provider_error(self.provider, format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(MarketDataError::provider_error(
                self.provider,
                format!("HTTP {} - {}", status, snippet),
            ));
        }

        Ok(ApiResponse {
            provider: self.provider,
            body,
            headers,
        })
    }
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, MarketDataError> {
        serde_json::from_str(&self.body).map_err(|e| {
            MarketDataError::invalid_response(self.provider, format!("Failed to parse response: {}", e))
        })
    }

    /// Integer header value, if present and numeric.
    pub fn header_u64(&self, name: &str) -> Option<u64> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }
}
