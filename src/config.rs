//! Runtime configuration
//!
//! Values come from `STOCKDASH_*` environment variables, optionally seeded
//! from a `.env` file in the working directory.

use crate::error::{AppError, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Single-tenant placeholder user
pub const DEFAULT_USER_ID: &str = "default_user";

/// Symbols pushed over the price stream and used by the batch endpoint
/// when the caller does not name any
pub const DEFAULT_TRACKED_SYMBOLS: &[&str] = &["AAPL", "GOOGL", "MSFT", "TSLA", "AMZN"];

/// Which quote provider backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteProviderKind {
    Yahoo,
    Demo,
}

impl FromStr for QuoteProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "yahoo" => Ok(QuoteProviderKind::Yahoo),
            "demo" => Ok(QuoteProviderKind::Demo),
            other => Err(AppError::Config(format!("Unknown quote provider: {}", other))),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub quote_provider: QuoteProviderKind,
    /// How long a fetched quote is served from cache
    pub quote_cache_ttl: Duration,
    /// How long upstream is left alone after it answers 429
    pub rate_limit_cooldown: Duration,
    /// Upper bound on a quote lookup, retries included
    pub quote_timeout: Duration,
    /// Retries of a single-quote lookup after a transient upstream failure
    pub quote_retries: u32,
    /// Base backoff between retries; the n-th retry waits n times this
    pub retry_delay: Duration,
    /// Minimum gap between upstream quote calls; cache hits are not delayed
    pub upstream_spacing: Duration,
    pub api_rate_limit: u32,
    pub quote_rate_limit: u32,
    pub stream_interval: Duration,
    pub stream_symbols: Vec<String>,
    pub default_user: String,
    pub cors_allow_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            db_path: PathBuf::from("./data/stockdash.db"),
            quote_provider: QuoteProviderKind::Yahoo,
            quote_cache_ttl: Duration::from_secs(300),
            rate_limit_cooldown: Duration::from_secs(60),
            quote_timeout: Duration::from_secs(10),
            quote_retries: 2,
            retry_delay: Duration::from_secs(1),
            upstream_spacing: Duration::from_millis(300),
            api_rate_limit: 100,
            quote_rate_limit: 10,
            stream_interval: Duration::from_secs(30),
            stream_symbols: DEFAULT_TRACKED_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            default_user: DEFAULT_USER_ID.to_string(),
            cors_allow_origins: vec!["*".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from the environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Config::default();

        let stream_symbols = match std::env::var("STOCKDASH_STREAM_SYMBOLS") {
            Ok(raw) => split_list(&raw).into_iter().map(|s| s.to_uppercase()).collect(),
            Err(_) => defaults.stream_symbols,
        };
        let cors_allow_origins = match std::env::var("STOCKDASH_CORS_ALLOW_ORIGINS") {
            Ok(raw) => split_list(&raw),
            Err(_) => defaults.cors_allow_origins,
        };

        Ok(Self {
            host: env_or("STOCKDASH_HOST", defaults.host)?,
            port: env_or("STOCKDASH_PORT", defaults.port)?,
            db_path: env_or("STOCKDASH_DB_PATH", defaults.db_path)?,
            quote_provider: env_or("STOCKDASH_QUOTE_PROVIDER", defaults.quote_provider)?,
            quote_cache_ttl: Duration::from_secs(env_or(
                "STOCKDASH_QUOTE_CACHE_TTL_SECS",
                defaults.quote_cache_ttl.as_secs(),
            )?),
            rate_limit_cooldown: Duration::from_secs(env_or(
                "STOCKDASH_RATE_LIMIT_COOLDOWN_SECS",
                defaults.rate_limit_cooldown.as_secs(),
            )?),
            quote_timeout: Duration::from_millis(env_or(
                "STOCKDASH_QUOTE_TIMEOUT_MS",
                defaults.quote_timeout.as_millis() as u64,
            )?),
            quote_retries: env_or("STOCKDASH_QUOTE_RETRIES", defaults.quote_retries)?,
            retry_delay: Duration::from_millis(env_or(
                "STOCKDASH_RETRY_DELAY_MS",
                defaults.retry_delay.as_millis() as u64,
            )?),
            upstream_spacing: Duration::from_millis(env_or(
                "STOCKDASH_UPSTREAM_SPACING_MS",
                defaults.upstream_spacing.as_millis() as u64,
            )?),
            api_rate_limit: env_or("STOCKDASH_API_RATE_LIMIT", defaults.api_rate_limit)?,
            quote_rate_limit: env_or("STOCKDASH_QUOTE_RATE_LIMIT", defaults.quote_rate_limit)?,
            stream_interval: Duration::from_secs(env_or(
                "STOCKDASH_STREAM_INTERVAL_SECS",
                defaults.stream_interval.as_secs(),
            )?),
            stream_symbols,
            default_user: env_or("STOCKDASH_DEFAULT_USER", defaults.default_user)?,
            cors_allow_origins,
        })
    }

    /// Socket address the server binds to
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid address: {}", e)))
    }
}

/// Read and parse an environment variable, falling back to `default` when unset
pub fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{}: {}", key, e))),
        _ => Ok(default),
    }
}

/// Split a comma separated list, dropping blanks
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
