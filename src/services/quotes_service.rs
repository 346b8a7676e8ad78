//! Quotes Service
//!
//! Single and batch quotes, symbol search, price history and a rule-based
//! quote summary. Every quote obtained here is recorded in the price log.

use crate::db::sqlite::PriceObservation;
use crate::error::{AppError, Result};
use crate::quotes::retry::retry_with_backoff;
use crate::quotes::{catalog, normalize_symbol, validate_history_range, Candle, Quote, SearchResult};
use crate::state::AppState;
use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info, warn};

/// Most symbols accepted by one batch request
pub const MAX_BATCH_SYMBOLS: usize = 50;

/// Most observations returned by one history-of-observations request
pub const MAX_OBSERVATIONS: usize = 500;

/// Result of a batch quote request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchQuotes {
    pub quotes: Vec<Quote>,
    /// Requested symbols with no quote in this response
    pub missing: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

/// US equity session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Open,
    Closed,
}

/// Rule-based quote summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub symbol: String,
    pub company_name: String,
    pub price: f64,
    pub change_percent: f64,
    pub sentiment: String,
    pub market_status: MarketStatus,
    pub summary: String,
    pub generated_at: DateTime<Utc>,
}

/// Quotes service for business logic
pub struct QuotesService;

impl QuotesService {
    /// Current quote for one symbol; recorded as an observation.
    ///
    /// Transient upstream failures are retried with backoff, all within
    /// the quote timeout.
    pub async fn get_quote(state: &AppState, raw_symbol: &str) -> Result<Quote> {
        let symbol = normalize_symbol(raw_symbol)?;
        let (quotes, target) = (&state.quotes, symbol.as_str());
        let config = &state.config;
        let lookup = retry_with_backoff(config.quote_retries, config.retry_delay, move || {
            quotes.get_quote(target)
        });
        let quote = Self::within_timeout(state, &symbol, lookup).await?;
        Self::record(state, &quote);
        Ok(quote)
    }

    /// Quotes for several symbols, fetched one after another.
    ///
    /// Failures are absorbed: a symbol that cannot be priced is listed in
    /// `missing`, and is not retried within the batch. An empty request falls
    /// back to the configured stream symbols.
    pub async fn get_batch(state: &AppState, raw_symbols: &[String]) -> Result<BatchQuotes> {
        let requested: Vec<String> = if raw_symbols.iter().all(|s| s.trim().is_empty()) {
            state.config.stream_symbols.clone()
        } else {
            raw_symbols.to_vec()
        };

        let mut symbols: Vec<String> = Vec::with_capacity(requested.len());
        let mut missing = Vec::new();
        for raw in requested.iter().filter(|s| !s.trim().is_empty()) {
            match normalize_symbol(raw) {
                Ok(symbol) if !symbols.contains(&symbol) => symbols.push(symbol),
                Ok(_) => {}
                Err(_) => missing.push(raw.trim().to_string()),
            }
        }

        if symbols.len() > MAX_BATCH_SYMBOLS {
            return Err(AppError::Validation(format!(
                "At most {} symbols per batch, got {}",
                MAX_BATCH_SYMBOLS,
                symbols.len()
            )));
        }

        info!("QuotesService::get_batch - {} symbols", symbols.len());

        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match Self::within_timeout(state, &symbol, state.quotes.get_quote(&symbol)).await {
                Ok(quote) => {
                    Self::record(state, &quote);
                    quotes.push(quote);
                }
                Err(e) => {
                    warn!("Batch quote for {} unavailable: {}", symbol, e);
                    missing.push(symbol);
                }
            }
        }

        Ok(BatchQuotes {
            quotes,
            missing,
            fetched_at: Utc::now(),
        })
    }

    /// Symbol search, falling back to the built-in list when upstream has
    /// nothing or is unavailable
    pub async fn search(state: &AppState, query: &str) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("Search query must not be empty".to_string()));
        }

        match state.quotes.search(query).await {
            Ok(results) if !results.is_empty() => Ok(results),
            Ok(_) => Ok(catalog::search_common(query)),
            Err(e) => {
                warn!("Upstream search for '{}' failed, using local list: {}", query, e);
                Ok(catalog::search_common(query))
            }
        }
    }

    /// OHLCV candles for a symbol
    pub async fn history(
        state: &AppState,
        raw_symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Vec<Candle>> {
        validate_history_range(period, interval)?;
        let symbol = normalize_symbol(raw_symbol)?;

        info!("QuotesService::history - {} {} {}", symbol, period, interval);

        let timeout = state.config.quote_timeout;
        tokio::time::timeout(timeout, state.quotes.get_history(&symbol, period, interval))
            .await
            .map_err(|_| {
                AppError::UpstreamUnavailable(format!("History for {} timed out", symbol))
            })?
    }

    /// Rule-based summary of the current quote
    pub async fn summary(state: &AppState, raw_symbol: &str) -> Result<QuoteSummary> {
        let quote = Self::get_quote(state, raw_symbol).await?;
        let now = Utc::now();
        Ok(summarize(&quote, now))
    }

    /// Recorded observations for a symbol, newest first
    pub fn observations(state: &AppState, raw_symbol: &str, limit: usize) -> Result<Vec<PriceObservation>> {
        let symbol = normalize_symbol(raw_symbol)?;
        state
            .sqlite
            .recent_observations(&symbol, limit.clamp(1, MAX_OBSERVATIONS))
    }

    // ========================================================================
    // Private Helper Methods
    // ========================================================================

    async fn within_timeout<F>(state: &AppState, symbol: &str, lookup: F) -> Result<Quote>
    where
        F: Future<Output = Result<Quote>>,
    {
        tokio::time::timeout(state.config.quote_timeout, lookup)
            .await
            .map_err(|_| AppError::UpstreamUnavailable(format!("Quote for {} timed out", symbol)))?
    }

    fn record(state: &AppState, quote: &Quote) {
        match state.sqlite.record_observation(&quote.to_observation()) {
            Ok(true) => debug!("Recorded {} at {}", quote.symbol, quote.price),
            Ok(false) => debug!("Observation for {} already recorded", quote.symbol),
            Err(e) => warn!("Failed to record observation for {}: {}", quote.symbol, e),
        }
    }
}

/// Sentiment bucket for a daily change
pub fn sentiment(change_percent: f64) -> &'static str {
    if change_percent > 2.0 {
        "Strong upward momentum"
    } else if change_percent > 0.0 {
        "Slight positive movement"
    } else if change_percent > -2.0 {
        "Slight decline"
    } else {
        "Significant drop"
    }
}

/// Regular NYSE session: weekdays 09:30 to 16:00 New York time.
/// Exchange holidays are not taken into account.
pub fn market_status(now: DateTime<Utc>) -> MarketStatus {
    let local = now.with_timezone(&New_York);
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return MarketStatus::Closed;
    }

    let time = local.time();
    let open = NaiveTime::from_hms_opt(9, 30, 0);
    let close = NaiveTime::from_hms_opt(16, 0, 0);
    match (open, close) {
        (Some(open), Some(close)) if time >= open && time < close => MarketStatus::Open,
        _ => MarketStatus::Closed,
    }
}

fn summarize(quote: &Quote, now: DateTime<Utc>) -> QuoteSummary {
    let sentiment = sentiment(quote.change_percent);
    let status = market_status(now);
    let session = match status {
        MarketStatus::Open => "The market is open",
        MarketStatus::Closed => "The market is closed",
    };

    let summary = format!(
        "{} ({}) is trading at ${:.2}, {:+.2}% on the day. {}. {}; day range ${:.2} to ${:.2}.",
        quote.company_name,
        quote.symbol,
        quote.price,
        quote.change_percent,
        sentiment,
        session,
        quote.day_low,
        quote.day_high,
    );

    QuoteSummary {
        symbol: quote.symbol.clone(),
        company_name: quote.company_name.clone(),
        price: quote.price,
        change_percent: quote.change_percent,
        sentiment: sentiment.to_string(),
        market_status: status,
        summary,
        generated_at: now,
    }
}
