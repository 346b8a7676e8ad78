//! Watchlist Service
//!
//! Add, remove and list watchlist entries. Listing joins each entry with the
//! latest recorded price for its symbol. Adding is two independent steps: the
//! entry is created first, then a quote is fetched and recorded on a best
//! effort basis, so a slow or failing provider never blocks the add.

use crate::db::sqlite::{EnrichedEntry, ListOrder};
use crate::error::Result;
use crate::quotes::normalize_symbol;
use crate::state::AppState;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Whether the price lookup that follows an add succeeded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Enrichment {
    /// A fresh quote was fetched and recorded
    Fresh,
    /// The entry was created without a price
    Unavailable { reason: String },
}

/// Result of adding a symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddResult {
    pub entry: EnrichedEntry,
    pub enrichment: Enrichment,
}

/// Watchlist service for business logic
pub struct WatchlistService;

impl WatchlistService {
    /// Entries for a user, each with its latest observation
    pub fn list(state: &AppState, user_id: &str, order: ListOrder) -> Result<Vec<EnrichedEntry>> {
        state.sqlite.list_watchlist(user_id, order)
    }

    /// Add a symbol to a user's watchlist
    pub async fn add(state: &AppState, user_id: &str, raw_symbol: &str) -> Result<AddResult> {
        let symbol = normalize_symbol(raw_symbol)?;
        info!("WatchlistService::add - {} for {}", symbol, user_id);

        state
            .sqlite
            .insert_watchlist_entry(user_id, &symbol, Utc::now())?;

        let enrichment = match Self::fetch_and_record(state, &symbol).await {
            Ok(()) => Enrichment::Fresh,
            Err(reason) => {
                warn!("Added {} without a price: {}", symbol, reason);
                Enrichment::Unavailable { reason }
            }
        };

        let entry = state.sqlite.get_watchlist_entry(user_id, &symbol)?;

        Ok(AddResult { entry, enrichment })
    }

    /// Remove a symbol from a user's watchlist. Price history is kept.
    pub fn remove(state: &AppState, user_id: &str, raw_symbol: &str) -> Result<()> {
        let symbol = normalize_symbol(raw_symbol)?;
        info!("WatchlistService::remove - {} for {}", symbol, user_id);

        state.sqlite.delete_watchlist_entry(user_id, &symbol)
    }

    async fn fetch_and_record(state: &AppState, symbol: &str) -> std::result::Result<(), String> {
        let timeout = state.config.quote_timeout;

        let quote = match tokio::time::timeout(timeout, state.quotes.get_quote(symbol)).await {
            Ok(Ok(quote)) => quote,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => return Err(format!("quote lookup timed out after {:?}", timeout)),
        };

        state
            .sqlite
            .record_observation(&quote.to_observation())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::quotes::testing::{test_state, ScriptedProvider};
    use std::sync::Arc;
    use std::time::Duration;

    const USER: &str = "default_user";

    #[tokio::test]
    async fn test_add_then_duplicate_conflicts() {
        let provider = Arc::new(ScriptedProvider::with_prices(&[("AAPL", 178.5)]));
        let state = test_state(provider);

        let result = WatchlistService::add(&state, USER, "aapl").await.unwrap();
        assert_eq!(result.entry.symbol, "AAPL");
        assert_eq!(result.enrichment, Enrichment::Fresh);
        assert_eq!(result.entry.latest.as_ref().unwrap().price, 178.5);

        let again = WatchlistService::add(&state, USER, "AAPL").await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let entries = WatchlistService::list(&state, USER, ListOrder::Asc).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_add_survives_provider_failure() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.fail_with(AppError::UpstreamUnavailable);
        let state = test_state(provider);

        let result = WatchlistService::add(&state, USER, "NVDA").await.unwrap();
        assert!(matches!(result.enrichment, Enrichment::Unavailable { .. }));
        assert!(result.entry.latest.is_none());
        assert_eq!(state.sqlite.count_observations().unwrap(), 0);

        let entries = WatchlistService::list(&state, USER, ListOrder::Asc).unwrap();
        assert_eq!(entries[0].symbol, "NVDA");
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_times_out_slow_provider() {
        let provider = Arc::new(ScriptedProvider::with_prices(&[("TSLA", 250.0)]));
        provider.delay(Duration::from_secs(60));
        let state = test_state(provider);

        let result = WatchlistService::add(&state, USER, "TSLA").await.unwrap();
        match result.enrichment {
            Enrichment::Unavailable { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(state.sqlite.count_watchlist_entries(USER).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_keeps_price_history() {
        let provider = Arc::new(ScriptedProvider::with_prices(&[("MSFT", 385.0)]));
        let state = test_state(provider);

        WatchlistService::add(&state, USER, "MSFT").await.unwrap();
        WatchlistService::remove(&state, USER, " msft ").unwrap();

        assert!(WatchlistService::list(&state, USER, ListOrder::Asc).unwrap().is_empty());
        assert_eq!(state.sqlite.count_observations().unwrap(), 1);

        let again = WatchlistService::remove(&state, USER, "MSFT");
        assert!(matches!(again, Err(AppError::NotFound(_))));
        assert_eq!(state.sqlite.count_observations().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_readd_after_remove_gets_fresh_timestamp() {
        let provider = Arc::new(ScriptedProvider::with_prices(&[("AMZN", 158.2)]));
        let state = test_state(provider);

        let first = WatchlistService::add(&state, USER, "AMZN").await.unwrap();
        WatchlistService::remove(&state, USER, "AMZN").unwrap();
        let second = WatchlistService::add(&state, USER, "AMZN").await.unwrap();

        assert_ne!(first.entry.id, second.entry.id);
        assert!(second.entry.added_at >= first.entry.added_at);
    }

    #[tokio::test]
    async fn test_invalid_symbol_rejected_before_insert() {
        let state = test_state(Arc::new(ScriptedProvider::default()));

        let result = WatchlistService::add(&state, USER, "   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(state.sqlite.count_watchlist_entries(USER).unwrap(), 0);
    }
}
