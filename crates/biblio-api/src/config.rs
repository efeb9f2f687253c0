//! Server configuration from the environment.

use std::time::Duration;

use axum::http::HeaderValue;
use tracing::warn;

use biblio_core::defaults;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

/// HTTP server settings.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `HOST` | `0.0.0.0` | Bind address |
/// | `PORT` | `3000` | Bind port |
/// | `DATABASE_URL` | `postgres://localhost/biblio` | Postgres connection |
/// | `REQUEST_BODY_LIMIT` | `2097152` | Max request body in bytes |
/// | `ALLOWED_ORIGINS` | `http://localhost:3000` | Comma-separated CORS origins |
/// | `FRONTOFFICE_URL` | unset | Public site linked from ORCID works and downloads |
/// | `EMBARGO_SWEEP_ENABLED` | `true` | Run the periodic embargo sweep |
/// | `EMBARGO_SWEEP_INTERVAL_SECS` | `21600` | Seconds between sweeps |
/// | `SEARCH_ENABLED` | `true` | Index changes and serve search from Elasticsearch |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub request_body_limit: usize,
    pub allowed_origins: Vec<HeaderValue>,
    pub frontoffice_url: Option<String>,
    pub embargo_sweep_enabled: bool,
    pub embargo_sweep_interval: Duration,
    pub search_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            database_url: defaults::DATABASE_URL.to_string(),
            request_body_limit: defaults::REQUEST_BODY_LIMIT,
            allowed_origins: vec![HeaderValue::from_static("http://localhost:3000")],
            frontoffice_url: None,
            embargo_sweep_enabled: true,
            embargo_sweep_interval: Duration::from_secs(defaults::EMBARGO_SWEEP_INTERVAL_SECS),
            search_enabled: true,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(base.host),
            port: env_or("PORT", base.port),
            database_url: std::env::var("DATABASE_URL").unwrap_or(base.database_url),
            request_body_limit: env_or("REQUEST_BODY_LIMIT", base.request_body_limit),
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .map(|v| parse_allowed_origins(&v))
                .unwrap_or(base.allowed_origins),
            frontoffice_url: std::env::var("FRONTOFFICE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            embargo_sweep_enabled: env_flag("EMBARGO_SWEEP_ENABLED", base.embargo_sweep_enabled),
            embargo_sweep_interval: Duration::from_secs(
                env_or(
                    "EMBARGO_SWEEP_INTERVAL_SECS",
                    defaults::EMBARGO_SWEEP_INTERVAL_SECS,
                )
                .max(1),
            ),
            search_enabled: env_flag("SEARCH_ENABLED", base.search_enabled),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a comma-separated origin list, skipping invalid entries.
pub fn parse_allowed_origins(origins: &str) -> Vec<HeaderValue> {
    origins
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

/// Directory cache sizing from `CACHE_SIZE` and `CACHE_TTL_SECS`.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::CACHE_SIZE,
            ttl: Duration::from_secs(defaults::CACHE_TTL_SECS),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            capacity: env_or("CACHE_SIZE", defaults::CACHE_SIZE).max(1),
            ttl: Duration::from_secs(env_or("CACHE_TTL_SECS", defaults::CACHE_TTL_SECS)),
        }
    }
}
