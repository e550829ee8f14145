//! Router configuration.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_TTL_SECS;
use crate::errors::MarketDataError;
use crate::provider::DEFAULT_MICRO_CACHE_TTL_SECS;
use crate::registry::{RoutingTable, DEFAULT_COOLDOWN_MINUTES, DEFAULT_MAX_ERRORS};

/// Default per-attempt timeout.
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 15;

/// Tunables for the router, its registry and its providers.
///
/// Every field has a default, so a settings file only needs the values it
/// changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterSettings {
    /// Age past which `cache_stats` reports an entry as expired.
    pub default_cache_ttl_secs: u64,
    /// Upper bound on a single provider attempt.
    pub attempt_timeout_secs: u64,
    pub micro_cache_ttl_secs: u64,
    /// Consecutive errors before a provider is cooled down.
    pub max_errors: u32,
    pub cooldown_minutes: u32,
    /// Upstream VIX symbol per provider, overriding each provider's default.
    pub vix_symbols: BTreeMap<String, String>,
    pub routing: RoutingTable,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            default_cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT_SECS,
            micro_cache_ttl_secs: DEFAULT_MICRO_CACHE_TTL_SECS as u64,
            max_errors: DEFAULT_MAX_ERRORS,
            cooldown_minutes: DEFAULT_COOLDOWN_MINUTES,
            vix_symbols: BTreeMap::new(),
            routing: RoutingTable::default(),
        }
    }
}

impl RouterSettings {
    pub fn from_json_str(raw: &str) -> Result<Self, MarketDataError> {
        serde_json::from_str(raw).map_err(|e| MarketDataError::InvalidParameter {
            name: "settings".to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MarketDataError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| MarketDataError::InvalidParameter {
            name: "settings".to_string(),
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_json_str(&raw)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn vix_symbol(&self, provider: &str) -> Option<&str> {
        self.vix_symbols.get(provider).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataType;

    #[test]
    fn test_defaults() {
        let settings = RouterSettings::default();
        assert_eq!(settings.default_cache_ttl_secs, 60);
        assert_eq!(settings.attempt_timeout(), Duration::from_secs(15));
        assert_eq!(settings.micro_cache_ttl_secs, 300);
        assert_eq!(settings.max_errors, 5);
        assert_eq!(settings.cooldown_minutes, 15);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = RouterSettings::from_json_str(
            r#"{"maxErrors": 2, "vixSymbols": {"polygon": "I:VIX1D"}}"#,
        )
        .unwrap();
        assert_eq!(settings.max_errors, 2);
        assert_eq!(settings.cooldown_minutes, 15);
        assert_eq!(settings.vix_symbol("polygon"), Some("I:VIX1D"));
        assert_eq!(settings.vix_symbol("fred"), None);
        assert_eq!(
            settings.routing.rule_for(&DataType::Vix).primary.as_deref(),
            Some("fred")
        );
    }

    #[test]
    fn test_routing_override() {
        let settings = RouterSettings::from_json_str(
            r#"{"routing": [{"dataType": "VIX", "primary": "polygon", "cacheTtlSecs": 10}]}"#,
        )
        .unwrap();
        assert_eq!(
            settings.routing.rule_for(&DataType::Vix).primary.as_deref(),
            Some("polygon")
        );
        assert!(settings.routing.rule_for(&DataType::Quote).primary.is_none());
    }

    #[test]
    fn test_invalid_json() {
        assert!(RouterSettings::from_json_str("{").is_err());
    }
}
