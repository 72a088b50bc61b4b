//! API process configuration.

use std::net::SocketAddr;
use std::time::Duration;

use broker::DEFAULT_QUEUE_NAME;
use search::SearchConfig;
use thiserror::Error;

use crate::rate_limit::RateLimitConfig;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid API_BIND={value}: {reason}")]
    InvalidBind { value: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub bind: SocketAddr,
    /// Queue tasks are submitted to.
    pub queue_name: String,
    /// `None` disables the search and stats routes.
    pub search: Option<SearchConfig>,
    pub rate_limit: RateLimitConfig,
}

impl ApiConfig {
    /// Build a config from environment variables.
    ///
    /// - `API_BIND` (default: `0.0.0.0:8080`)
    /// - `API_QUEUE_NAME` (default: `default`)
    /// - `SEARCH_URL`, `SEARCH_API_KEY`, `SEARCH_DOCS_INDEX`, `SEARCH_GRAPH_INDEX`
    /// - `RATE_LIMIT_LIMIT` (default: `10`), `RATE_LIMIT_PERIOD_SECS` (default: `3600`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let num = |key: &str, default: u64| -> u64 {
            match get(key) {
                Some(raw) => raw.parse().unwrap_or_else(|_| {
                    tracing::warn!("Invalid value {key}={raw}, using {default}");
                    default
                }),
                None => default,
            }
        };

        let bind_raw = get("API_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidBind {
                value: bind_raw.clone(),
                reason: e.to_string(),
            })?;

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            limit: u32::try_from(num("RATE_LIMIT_LIMIT", u64::from(defaults.limit)))
                .unwrap_or(defaults.limit),
            period: Duration::from_secs(num(
                "RATE_LIMIT_PERIOD_SECS",
                defaults.period.as_secs(),
            )),
        };

        Ok(Self {
            bind,
            queue_name: get("API_QUEUE_NAME").unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string()),
            search: SearchConfig::from_lookup(&lookup),
            rate_limit,
        })
    }
}
