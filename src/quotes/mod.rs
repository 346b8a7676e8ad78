//! Quote provider adapters

pub mod types;
pub mod catalog;
pub mod cache;
pub mod demo;
pub mod yahoo;
pub mod retry;
#[cfg(test)]
pub(crate) mod testing;

use crate::config::{Config, QuoteProviderKind};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
pub use types::*;

/// Source of market data that all provider implementations must implement
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Provider ID (e.g., "yahoo", "demo")
    fn id(&self) -> &'static str;

    /// Current quote for a normalized symbol
    async fn get_quote(&self, symbol: &str) -> Result<Quote>;

    /// Symbol search
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;

    /// OHLCV history for an already validated period/interval pair
    async fn get_history(&self, symbol: &str, period: &str, interval: &str) -> Result<Vec<Candle>>;
}

/// Build the configured provider, wrapped in the quote cache
pub fn build_provider(config: &Config) -> Result<Arc<dyn QuoteProvider>> {
    let inner: Arc<dyn QuoteProvider> = match config.quote_provider {
        QuoteProviderKind::Yahoo => Arc::new(yahoo::YahooProvider::new(config.quote_timeout)?),
        QuoteProviderKind::Demo => Arc::new(demo::DemoProvider::new()),
    };
    // The demo provider answers locally and needs no spacing
    let spacing = match config.quote_provider {
        QuoteProviderKind::Yahoo => config.upstream_spacing,
        QuoteProviderKind::Demo => Duration::ZERO,
    };

    tracing::info!(
        "Using {} quote provider (cache ttl {:?}, cooldown {:?}, spacing {:?})",
        inner.id(),
        config.quote_cache_ttl,
        config.rate_limit_cooldown,
        spacing
    );

    Ok(Arc::new(
        cache::CachedQuoteProvider::new(inner, config.quote_cache_ttl, config.rate_limit_cooldown)
            .with_spacing(spacing),
    ))
}
