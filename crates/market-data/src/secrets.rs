//! API key lookup.
//!
//! Keys are addressed by lowercase provider name (`fred`, `polygon`, ...).
//! A store answering `Ok(None)` means "no key configured"; the registry then
//! skips the provider.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use log::{debug, warn};

use crate::errors::MarketDataError;

/// Environment variable prefix that overrides file entries, e.g.
/// `AT_API_KEY_FRED`.
pub const API_KEY_ENV_PREFIX: &str = "AT_API_KEY_";

/// Source of provider API keys.
pub trait ApiKeyStore: Send + Sync {
    fn get_key(&self, provider: &str) -> Result<Option<String>, MarketDataError>;
}

fn normalize(provider: &str) -> String {
    provider.trim().to_ascii_lowercase()
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Keys held in memory. Used by tests and by embedders that manage keys
/// themselves.
#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<String, String>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(self, provider: &str, key: impl Into<String>) -> Self {
        self.set_key(provider, key);
        self
    }

    pub fn set_key(&self, provider: &str, key: impl Into<String>) {
        self.keys
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(normalize(provider), key.into());
    }
}

impl ApiKeyStore for InMemoryKeyStore {
    fn get_key(&self, provider: &str) -> Result<Option<String>, MarketDataError> {
        Ok(self
            .keys
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&normalize(provider))
            .cloned()
            .and_then(non_blank))
    }
}

/// Flat JSON file of keys: `{"fred": "...", "polygon": "..."}`.
///
/// The file is read on every lookup so edits apply without a restart. A
/// missing file is an empty store. `AT_API_KEY_<NAME>` wins over the file.
#[derive(Debug, Clone)]
pub struct JsonFileKeyStore {
    path: PathBuf,
}

impl JsonFileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<HashMap<String, String>, MarketDataError> {
        if !self.path.exists() {
            debug!("API key file {} not found", self.path.display());
            return Ok(HashMap::new());
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|e| MarketDataError::KeyStore(format!("{}: {}", self.path.display(), e)))?;
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }

        let keys: HashMap<String, String> = serde_json::from_str(&raw)
            .map_err(|e| MarketDataError::KeyStore(format!("{}: {}", self.path.display(), e)))?;
        Ok(keys
            .into_iter()
            .map(|(provider, key)| (normalize(&provider), key))
            .collect())
    }
}

impl ApiKeyStore for JsonFileKeyStore {
    fn get_key(&self, provider: &str) -> Result<Option<String>, MarketDataError> {
        let name = normalize(provider);

        let env_name = format!("{}{}", API_KEY_ENV_PREFIX, name.to_ascii_uppercase());
        if let Some(key) = std::env::var(&env_name).ok().and_then(non_blank) {
            return Ok(Some(key));
        }

        match self.read_file() {
            Ok(mut keys) => Ok(keys.remove(&name).and_then(non_blank)),
            Err(e) => {
                warn!("Failed to read API keys: {}", e);
                Err(e)
            }
        }
    }
}
