use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub api_keys_file: PathBuf,
    pub routing_file: Option<PathBuf>,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    /// `None` disables the background cache sweep.
    pub cache_sweep_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("AT_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid AT_LISTEN_ADDR")?;
        let api_keys_file = std::env::var("AT_API_KEYS_FILE")
            .unwrap_or_else(|_| "./config/api_keys.json".into())
            .into();
        let routing_file = std::env::var("AT_ROUTING_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let cors_allow = std::env::var("AT_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = std::env::var("AT_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".into())
            .parse()
            .unwrap_or(30000);
        let sweep_secs: u64 = std::env::var("AT_CACHE_SWEEP_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .unwrap_or(300);
        Ok(Self {
            listen_addr,
            api_keys_file,
            routing_file,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            cache_sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
        })
    }
}
