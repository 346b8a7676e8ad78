//! TTL quote cache with rate-limit cooldown
//!
//! Wraps any [`QuoteProvider`]. Fresh quotes are served from memory for the
//! configured TTL. When upstream answers with a rate-limit error, upstream is
//! left alone for the cooldown period; during that window a cached quote is
//! served even if it is past its TTL.
//!
//! Upstream quote calls can be spaced out; cache hits are never delayed.

use crate::error::{AppError, Result};
use crate::quotes::types::{Candle, Quote, SearchResult};
use crate::quotes::QuoteProvider;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct CachedQuote {
    quote: Quote,
    fetched_at: Instant,
}

/// Caching decorator around a quote provider
pub struct CachedQuoteProvider {
    inner: Arc<dyn QuoteProvider>,
    quotes: DashMap<String, CachedQuote>,
    ttl: Duration,
    cooldown: Duration,
    cooldown_until: Mutex<Option<Instant>>,
    /// Minimum gap between upstream quote calls
    spacing: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl CachedQuoteProvider {
    pub fn new(inner: Arc<dyn QuoteProvider>, ttl: Duration, cooldown: Duration) -> Self {
        Self {
            inner,
            quotes: DashMap::new(),
            ttl,
            cooldown,
            cooldown_until: Mutex::new(None),
            spacing: Duration::ZERO,
            next_slot: Mutex::new(None),
        }
    }

    /// Keep at least `spacing` between consecutive upstream quote calls
    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    /// Wait for the next free upstream slot
    async fn pace(&self) {
        if self.spacing.is_zero() {
            return;
        }

        let slot = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.spacing);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }

    /// Whether upstream is currently being left alone
    pub fn in_cooldown(&self) -> bool {
        let mut until = self.cooldown_until.lock();
        match *until {
            Some(deadline) if Instant::now() < deadline => true,
            Some(_) => {
                *until = None;
                false
            }
            None => false,
        }
    }

    fn start_cooldown(&self) {
        tracing::warn!("Quote provider rate limited, backing off for {:?}", self.cooldown);
        *self.cooldown_until.lock() = Some(Instant::now() + self.cooldown);
    }

    fn cached(&self, symbol: &str, allow_stale: bool) -> Option<Quote> {
        let entry = self.quotes.get(symbol)?;
        if allow_stale || entry.fetched_at.elapsed() < self.ttl {
            Some(entry.quote.clone())
        } else {
            None
        }
    }

    /// Number of cached symbols
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    fn cooldown_error(&self) -> AppError {
        AppError::RateLimited("Quote provider is cooling down after a rate limit".to_string())
    }

    /// Record the cooldown when upstream reports a rate limit
    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(AppError::RateLimited(_)) = &result {
            self.start_cooldown();
        }
        result
    }
}

#[async_trait]
impl QuoteProvider for CachedQuoteProvider {
    fn id(&self) -> &'static str {
        self.inner.id()
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        if let Some(quote) = self.cached(symbol, false) {
            tracing::debug!("Quote cache hit for {}", symbol);
            return Ok(quote);
        }

        if self.in_cooldown() {
            return self.cached(symbol, true).ok_or_else(|| self.cooldown_error());
        }

        self.pace().await;
        match self.observe(self.inner.get_quote(symbol).await) {
            Ok(quote) => {
                self.quotes.insert(
                    symbol.to_string(),
                    CachedQuote {
                        quote: quote.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(quote)
            }
            Err(AppError::RateLimited(msg)) => {
                self.cached(symbol, true).ok_or(AppError::RateLimited(msg))
            }
            Err(e) => Err(e),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        if self.in_cooldown() {
            return Err(self.cooldown_error());
        }
        self.observe(self.inner.search(query).await)
    }

    async fn get_history(&self, symbol: &str, period: &str, interval: &str) -> Result<Vec<Candle>> {
        if self.in_cooldown() {
            return Err(self.cooldown_error());
        }
        self.observe(self.inner.get_history(symbol, period, interval).await)
    }
}
