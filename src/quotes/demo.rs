//! Offline provider backed by the reference catalog

use crate::error::{AppError, Result};
use crate::quotes::catalog::{self, ReferenceQuote};
use crate::quotes::types::{interval_duration, period_duration, round2, Candle, Quote, SearchResult};
use crate::quotes::QuoteProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upper bound on synthesized candles per request
const MAX_CANDLES: i64 = 500;

/// Demo provider implementation
#[derive(Debug, Default)]
pub struct DemoProvider;

impl DemoProvider {
    pub fn new() -> Self {
        Self
    }

    fn to_quote(reference: &ReferenceQuote, now: DateTime<Utc>) -> Quote {
        let price = reference.price;
        let previous_close = round2(price / (1.0 + reference.change_percent / 100.0));

        Quote {
            symbol: reference.symbol.to_string(),
            company_name: reference.company_name.to_string(),
            price,
            change_percent: reference.change_percent,
            volume: reference.volume,
            market_cap: reference.market_cap,
            previous_close,
            open: previous_close,
            day_high: round2(price.max(previous_close) * 1.01),
            day_low: round2(price.min(previous_close) * 0.99),
            year_high: round2(price * 1.25),
            year_low: round2(price * 0.75),
            timestamp: now,
        }
    }
}

fn seed_for(symbol: &str) -> u64 {
    symbol
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |hash, b| {
            (hash ^ b as u64).wrapping_mul(0x0100_0000_01b3)
        })
}

#[async_trait]
impl QuoteProvider for DemoProvider {
    fn id(&self) -> &'static str {
        "demo"
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        let reference = catalog::reference_quote(symbol)
            .ok_or_else(|| AppError::NotFound(format!("Unknown symbol: {}", symbol)))?;
        Ok(Self::to_quote(reference, Utc::now()))
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        Ok(catalog::search_common(query))
    }

    /// Seeded random walk ending at the reference price
    async fn get_history(&self, symbol: &str, period: &str, interval: &str) -> Result<Vec<Candle>> {
        let reference = catalog::reference_quote(symbol)
            .ok_or_else(|| AppError::NotFound(format!("Unknown symbol: {}", symbol)))?;

        let now = Utc::now();
        let span = period_duration(period, now)
            .ok_or_else(|| AppError::Validation(format!("Unsupported period '{}'", period)))?;
        let step = interval_duration(interval)
            .ok_or_else(|| AppError::Validation(format!("Unsupported interval '{}'", interval)))?;

        let bars = (span.num_seconds() / step.num_seconds().max(1)).clamp(1, MAX_CANDLES);
        let mut rng = StdRng::seed_from_u64(seed_for(symbol));

        // Walk backwards from the current price
        let mut close = reference.price;
        let mut candles = Vec::with_capacity(bars as usize);
        for i in 0..bars {
            let drift: f64 = rng.gen_range(-0.015..0.015);
            let open = (close / (1.0 + drift)).max(0.01);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.005));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.005));
            let volume = reference.volume / 10 + rng.gen_range(0..=reference.volume / 10);

            candles.push(Candle {
                timestamp: now - step * (i as i32),
                open: round2(open),
                high: round2(high),
                low: round2(low),
                close: round2(close),
                volume,
            });
            close = open;
        }

        candles.reverse();
        Ok(candles)
    }
}
