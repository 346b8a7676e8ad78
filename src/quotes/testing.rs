//! Scripted providers for unit tests

use crate::error::{AppError, Result};
use crate::quotes::types::{Candle, Quote, SearchResult};
use crate::quotes::QuoteProvider;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn quote(symbol: &str, price: f64) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        company_name: format!("{} Corp", symbol),
        price,
        change_percent: 1.5,
        volume: 1_000,
        market_cap: 1_000_000,
        previous_close: price,
        open: price,
        day_high: price,
        day_low: price,
        year_high: price,
        year_low: price,
        timestamp: Utc::now(),
    }
}

/// Answers from a fixed table; unknown symbols are `NotFound`
#[derive(Default)]
pub struct ScriptedProvider {
    prices: Mutex<HashMap<String, f64>>,
    failure: Mutex<Option<fn(String) -> AppError>>,
    /// Failures still to hand out before answering normally
    pending_failures: Mutex<Option<(usize, fn(String) -> AppError)>>,
    delay: Mutex<Option<Duration>>,
    pub calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn with_prices(prices: &[(&str, f64)]) -> Self {
        let provider = Self::default();
        provider.set_prices(prices);
        provider
    }

    pub fn set_prices(&self, prices: &[(&str, f64)]) {
        let mut map = self.prices.lock();
        for (symbol, price) in prices {
            map.insert(symbol.to_string(), *price);
        }
    }

    /// Every call fails with the given error kind
    pub fn fail_with(&self, make: fn(String) -> AppError) {
        *self.failure.lock() = Some(make);
    }

    /// The next `count` quote calls fail, later ones answer normally
    pub fn fail_first(&self, count: usize, make: fn(String) -> AppError) {
        *self.pending_failures.lock() = Some((count, make));
    }

    /// Every call sleeps before answering
    pub fn delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteProvider for ScriptedProvider {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = *self.failure.lock();
        if let Some(make) = failure {
            return Err(make(format!("scripted failure for {}", symbol)));
        }

        {
            let mut pending = self.pending_failures.lock();
            if let Some((count, make)) = *pending {
                if count > 0 {
                    *pending = Some((count - 1, make));
                    return Err(make(format!("scripted failure for {}", symbol)));
                }
            }
        }

        let price = self.prices.lock().get(symbol).copied();
        price
            .map(|p| quote(symbol, p))
            .ok_or_else(|| AppError::NotFound(format!("Unknown symbol: {}", symbol)))
    }

    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>> {
        let failure = *self.failure.lock();
        match failure {
            Some(make) => Err(make("scripted search failure".to_string())),
            None => Ok(vec![]),
        }
    }

    async fn get_history(&self, symbol: &str, _period: &str, _interval: &str) -> Result<Vec<Candle>> {
        let price = self
            .prices
            .lock()
            .get(symbol)
            .copied()
            .ok_or_else(|| AppError::NotFound(format!("Unknown symbol: {}", symbol)))?;

        Ok(vec![Candle {
            timestamp: Utc::now(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0,
        }])
    }
}

/// In-memory state around a scripted provider, called directly
pub fn test_state(provider: std::sync::Arc<ScriptedProvider>) -> crate::state::AppState {
    test_state_with(provider, crate::config::Config::default())
}

/// In-memory state around any provider and config
pub fn test_state_with(
    provider: std::sync::Arc<dyn QuoteProvider>,
    config: crate::config::Config,
) -> crate::state::AppState {
    let sqlite = crate::db::sqlite::SqliteDb::open_in_memory().unwrap();
    crate::state::AppState::with_parts(std::sync::Arc::new(sqlite), provider, config)
}
