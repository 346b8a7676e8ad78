//! Polling price synchronizer
//!
//! Keeps a [`DisplayState`] approximately fresh by re-fetching prices for all
//! tracked symbols on a fixed period. Large watchlists are fetched in
//! consecutive requests of at most [`MAX_BATCH_SYMBOLS`] symbols, each merged
//! as it arrives.
//!
//! State machine: `Idle -> Scheduled -> Fetching -> (Merged | Failed) -> Scheduled`,
//! with `Stopped` as the terminal state after [`Synchronizer::stop`].
//!
//! Every change of the tracked symbol set restarts the timer and bumps a
//! generation counter. Fetches capture the generation they started under and
//! their results are dropped if it no longer matches. Fetches run on their own
//! task, so stopping or restarting cancels the timer but never an in-flight
//! request.

use crate::client::display::DisplayState;
use crate::db::sqlite::EnrichedEntry;
use crate::error::{AppError, Result};
use crate::quotes::normalize_symbol;
use crate::services::quotes_service::MAX_BATCH_SYMBOLS;
use crate::services::{AddResult, BatchQuotes};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Server operations the synchronizer depends on
#[async_trait]
pub trait SyncBackend: Send + Sync {
    async fn list_watchlist(&self) -> Result<Vec<EnrichedEntry>>;

    async fn add_symbol(&self, symbol: &str) -> Result<AddResult>;

    async fn remove_symbol(&self, symbol: &str) -> Result<()>;

    /// One batched price request for the given symbols, never more than
    /// [`MAX_BATCH_SYMBOLS`] at a time
    async fn fetch_prices(&self, symbols: &[String]) -> Result<BatchQuotes>;
}

/// Synchronizer lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Waiting for the first watchlist load
    Idle,
    /// Timer armed, waiting for the next tick
    Scheduled,
    /// A fetch for the current generation is in flight
    Fetching,
    /// Last fetch merged; about to return to `Scheduled`
    Merged,
    /// Last fetch failed; about to return to `Scheduled`
    Failed,
    /// Torn down
    Stopped,
}

/// Counters for observing the synchronizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub fetches: u64,
    pub merges: u64,
    pub failures: u64,
    /// Results dropped because the generation moved on
    pub discarded: u64,
}

struct Inner {
    backend: Arc<dyn SyncBackend>,
    period: Duration,
    display: Mutex<DisplayState>,
    state: Mutex<SyncState>,
    stats: Mutex<SyncStats>,
    generation: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
    /// Bumped after every display change
    revision: watch::Sender<u64>,
}

/// Polling synchronizer handle. Dropping it tears the synchronizer down.
pub struct Synchronizer {
    inner: Arc<Inner>,
}

impl Synchronizer {
    pub fn new(backend: Arc<dyn SyncBackend>, period: Duration) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                backend,
                // tokio intervals reject a zero period
                period: period.max(Duration::from_millis(1)),
                display: Mutex::new(DisplayState::default()),
                state: Mutex::new(SyncState::Idle),
                stats: Mutex::new(SyncStats::default()),
                generation: AtomicU64::new(0),
                timer: Mutex::new(None),
                revision,
            }),
        }
    }

    /// Load the watchlist from the server and start polling
    pub async fn load(&self) -> Result<()> {
        if self.state() == SyncState::Stopped {
            return Err(AppError::Internal("Synchronizer is stopped".to_string()));
        }

        let entries = self.inner.backend.list_watchlist().await?;
        info!("Loaded watchlist with {} symbols", entries.len());

        *self.inner.display.lock() = DisplayState::from_entries(&entries);
        self.inner.notify();
        self.inner.restart();
        Ok(())
    }

    /// Add a symbol: shown immediately as pending, then confirmed by the server.
    ///
    /// On a server-side duplicate the row stays, as the server already tracks
    /// it. Any other failure rolls the row back.
    pub async fn add(&self, raw_symbol: &str) -> Result<AddResult> {
        let symbol = normalize_symbol(raw_symbol)?;

        let inserted = self.inner.display.lock().insert_pending(&symbol);
        if !inserted {
            return Err(AppError::Conflict(format!("{} is already in the watchlist", symbol)));
        }
        self.inner.notify();
        self.inner.restart();

        match self.inner.backend.add_symbol(&symbol).await {
            Ok(result) => {
                self.inner.display.lock().confirm(&result.entry);
                self.inner.notify();
                Ok(result)
            }
            Err(AppError::Conflict(msg)) => {
                self.inner.display.lock().mark_confirmed(&symbol);
                self.inner.notify();
                Err(AppError::Conflict(msg))
            }
            Err(e) => {
                warn!("Add of {} failed, rolling back: {}", symbol, e);
                self.inner.display.lock().remove(&symbol);
                self.inner.notify();
                self.inner.restart();
                Err(e)
            }
        }
    }

    /// Remove a symbol: dropped from display immediately, restored if the
    /// server call fails for any reason other than the entry being absent.
    pub async fn remove(&self, raw_symbol: &str) -> Result<()> {
        let symbol = normalize_symbol(raw_symbol)?;

        let removed = self.inner.display.lock().remove(&symbol);
        if removed.is_some() {
            self.inner.notify();
            self.inner.restart();
        }

        match self.inner.backend.remove_symbol(&symbol).await {
            Ok(()) => Ok(()),
            Err(AppError::NotFound(msg)) => Err(AppError::NotFound(msg)),
            Err(e) => {
                warn!("Remove of {} failed, restoring: {}", symbol, e);
                if let Some((index, row)) = removed {
                    self.inner.display.lock().restore(index, row);
                    self.inner.notify();
                    self.inner.restart();
                }
                Err(e)
            }
        }
    }

    /// Cancel the timer and discard any in-flight result
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn state(&self) -> SyncState {
        *self.inner.state.lock()
    }

    pub fn stats(&self) -> SyncStats {
        *self.inner.stats.lock()
    }

    /// Snapshot of the displayed rows
    pub fn display(&self) -> DisplayState {
        self.inner.display.lock().clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Receiver that changes whenever the display does
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl Inner {
    fn set_state(&self, state: SyncState) {
        let mut current = self.state.lock();
        if *current != SyncState::Stopped {
            *current = state;
        }
    }

    fn notify(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
            && *self.state.lock() != SyncState::Stopped
    }

    /// Cancel the pending timer and arm a fresh one under a new generation
    fn restart(self: &Arc<Self>) {
        if *self.state.lock() == SyncState::Stopped {
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let first_tick = tokio::time::Instant::now() + self.period;
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first_tick, inner.period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                inner.tick(generation);
            }
        });

        if let Some(previous) = self.timer.lock().replace(handle) {
            previous.abort();
        }

        self.set_state(SyncState::Scheduled);
        debug!("Synchronizer armed (generation {})", generation);
    }

    fn tick(self: &Arc<Self>, generation: u64) {
        if !self.is_current(generation) {
            return;
        }

        let symbols = self.display.lock().symbols();
        if symbols.is_empty() {
            return;
        }

        let chunks: Vec<Vec<String>> = symbols
            .chunks(MAX_BATCH_SYMBOLS)
            .map(|chunk| chunk.to_vec())
            .collect();

        self.set_state(SyncState::Fetching);
        self.stats.lock().fetches += chunks.len() as u64;

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            for chunk in chunks {
                let result = inner.backend.fetch_prices(&chunk).await;
                if !inner.complete(generation, result) {
                    break;
                }
            }
        });
    }

    /// Apply one fetch result; false once the generation has moved on
    fn complete(&self, generation: u64, result: Result<BatchQuotes>) -> bool {
        if !self.is_current(generation) {
            debug!("Discarding price fetch from generation {}", generation);
            self.stats.lock().discarded += 1;
            return false;
        }

        match result {
            Ok(batch) => {
                let updated = self.display.lock().merge_quotes(&batch.quotes, Utc::now());
                debug!(
                    "Merged {} quotes ({} missing)",
                    updated,
                    batch.missing.len()
                );
                self.stats.lock().merges += 1;
                self.set_state(SyncState::Merged);
                self.notify();
            }
            Err(e) => {
                warn!("Price refresh failed, keeping displayed prices: {}", e);
                self.stats.lock().failures += 1;
                self.set_state(SyncState::Failed);
            }
        }

        self.set_state(SyncState::Scheduled);
        true
    }

    fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state == SyncState::Stopped {
                return;
            }
            *state = SyncState::Stopped;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
        info!("Synchronizer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::testing::quote;
    use std::collections::HashMap;

    const PERIOD: Duration = Duration::from_secs(30);

    /// In-memory backend recording every batch request
    #[derive(Default)]
    struct FakeBackend {
        watchlist: Mutex<Vec<String>>,
        prices: Mutex<HashMap<String, f64>>,
        requests: Mutex<Vec<Vec<String>>>,
        fail_fetch: Mutex<bool>,
        fail_mutations: Mutex<bool>,
        fetch_delay: Mutex<Option<Duration>>,
    }

    impl FakeBackend {
        fn with_watchlist(symbols: &[&str]) -> Arc<Self> {
            let backend = Self::default();
            *backend.watchlist.lock() = symbols.iter().map(|s| s.to_string()).collect();
            Arc::new(backend)
        }

        fn set_price(&self, symbol: &str, price: f64) {
            self.prices.lock().insert(symbol.to_string(), price);
        }

        fn requests(&self) -> Vec<Vec<String>> {
            self.requests.lock().clone()
        }

        fn entry(symbol: &str) -> EnrichedEntry {
            EnrichedEntry {
                id: 1,
                user_id: "default_user".to_string(),
                symbol: symbol.to_string(),
                added_at: Utc::now(),
                latest: None,
            }
        }
    }

    #[async_trait]
    impl SyncBackend for FakeBackend {
        async fn list_watchlist(&self) -> Result<Vec<EnrichedEntry>> {
            Ok(self.watchlist.lock().iter().map(|s| Self::entry(s)).collect())
        }

        async fn add_symbol(&self, symbol: &str) -> Result<AddResult> {
            if *self.fail_mutations.lock() {
                return Err(AppError::Transport("connection refused".into()));
            }
            let mut list = self.watchlist.lock();
            if list.iter().any(|s| s == symbol) {
                return Err(AppError::Conflict(format!("{} exists", symbol)));
            }
            list.push(symbol.to_string());
            Ok(AddResult {
                entry: Self::entry(symbol),
                enrichment: crate::services::Enrichment::Fresh,
            })
        }

        async fn remove_symbol(&self, symbol: &str) -> Result<()> {
            if *self.fail_mutations.lock() {
                return Err(AppError::Transport("connection refused".into()));
            }
            let mut list = self.watchlist.lock();
            let before = list.len();
            list.retain(|s| s != symbol);
            if list.len() == before {
                return Err(AppError::NotFound(format!("{} missing", symbol)));
            }
            Ok(())
        }

        async fn fetch_prices(&self, symbols: &[String]) -> Result<BatchQuotes> {
            self.requests.lock().push(symbols.to_vec());
            if symbols.len() > MAX_BATCH_SYMBOLS {
                return Err(AppError::Validation("batch too large".into()));
            }

            let delay = *self.fetch_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if *self.fail_fetch.lock() {
                return Err(AppError::Transport("timed out".into()));
            }

            let prices = self.prices.lock();
            let mut quotes = Vec::new();
            let mut missing = Vec::new();
            for symbol in symbols {
                match prices.get(symbol) {
                    Some(price) => quotes.push(quote(symbol, *price)),
                    None => missing.push(symbol.clone()),
                }
            }
            Ok(BatchQuotes {
                quotes,
                missing,
                fetched_at: Utc::now(),
            })
        }
    }

    fn sync_with(backend: Arc<FakeBackend>) -> Synchronizer {
        Synchronizer::new(backend, PERIOD)
    }

    /// Let the timer fire and spawned fetches settle
    async fn advance(duration: Duration) {
        tokio::time::sleep(duration).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_until_first_load() {
        let backend = FakeBackend::with_watchlist(&["AAPL"]);
        let sync = sync_with(backend.clone());

        assert_eq!(sync.state(), SyncState::Idle);
        advance(PERIOD * 3).await;
        assert!(backend.requests().is_empty());

        sync.load().await.unwrap();
        assert_eq!(sync.state(), SyncState::Scheduled);

        advance(PERIOD + Duration::from_secs(1)).await;
        assert_eq!(backend.requests(), vec![vec!["AAPL".to_string()]]);
        assert_eq!(sync.state(), SyncState::Scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_batch_leaves_other_rows_untouched() {
        let backend = FakeBackend::with_watchlist(&["AAPL", "MSFT"]);
        backend.set_price("AAPL", 181.25);
        let sync = sync_with(backend.clone());
        sync.load().await.unwrap();

        let msft_before = sync.display().get("MSFT").cloned().unwrap();
        advance(PERIOD + Duration::from_secs(1)).await;

        let display = sync.display();
        assert_eq!(display.get("AAPL").unwrap().price, Some(181.25));
        assert_eq!(display.get("MSFT").unwrap(), &msft_before);
        assert_eq!(sync.stats().merges, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_watchlist_fetched_in_chunks() {
        let names: Vec<String> = (0..MAX_BATCH_SYMBOLS + 1).map(|i| format!("S{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let backend = FakeBackend::with_watchlist(&refs);
        for name in &names {
            backend.set_price(name, 10.0);
        }
        let sync = sync_with(backend.clone());
        sync.load().await.unwrap();

        advance(PERIOD + Duration::from_secs(1)).await;

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].len(), MAX_BATCH_SYMBOLS);
        assert_eq!(requests[1], vec![names[MAX_BATCH_SYMBOLS].clone()]);

        let display = sync.display();
        assert!(display.rows().iter().all(|row| row.price == Some(10.0)));
        let stats = sync.stats();
        assert_eq!((stats.fetches, stats.merges, stats.failures), (2, 2, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_state_and_timer() {
        let backend = FakeBackend::with_watchlist(&["AAPL"]);
        backend.set_price("AAPL", 180.0);
        let sync = sync_with(backend.clone());
        sync.load().await.unwrap();

        advance(PERIOD + Duration::from_secs(1)).await;
        let merged = sync.display();

        *backend.fail_fetch.lock() = true;
        advance(PERIOD).await;
        assert_eq!(sync.stats().failures, 1);
        assert!(sync.display().same_content(&merged));
        assert_eq!(sync.state(), SyncState::Scheduled);

        // Next tick retries
        *backend.fail_fetch.lock() = false;
        backend.set_price("AAPL", 182.0);
        advance(PERIOD).await;
        assert_eq!(backend.requests().len(), 3);
        assert_eq!(sync.display().get("AAPL").unwrap().price, Some(182.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_symbol_set_change_restarts_with_new_set() {
        let backend = FakeBackend::with_watchlist(&["AAPL"]);
        let sync = sync_with(backend.clone());
        sync.load().await.unwrap();
        let generation = sync.generation();

        // Part way into the period the set changes
        advance(Duration::from_secs(20)).await;
        sync.add("msft").await.unwrap();
        assert!(sync.generation() > generation);

        // The old deadline passes without a fetch
        advance(Duration::from_secs(15)).await;
        assert!(backend.requests().is_empty());

        // A full period after the change the new set is fetched
        advance(Duration::from_secs(16)).await;
        assert_eq!(
            backend.requests(),
            vec![vec!["AAPL".to_string(), "MSFT".to_string()]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_price_merges_do_not_restart() {
        let backend = FakeBackend::with_watchlist(&["AAPL"]);
        backend.set_price("AAPL", 180.0);
        let sync = sync_with(backend.clone());
        sync.load().await.unwrap();
        let generation = sync.generation();

        advance(PERIOD * 2 + Duration::from_secs(1)).await;
        assert_eq!(sync.stats().merges, 2);
        assert_eq!(sync.generation(), generation);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_discarded_after_set_change() {
        let backend = FakeBackend::with_watchlist(&["AAPL"]);
        backend.set_price("AAPL", 999.0);
        *backend.fetch_delay.lock() = Some(Duration::from_secs(10));
        let sync = sync_with(backend.clone());
        sync.load().await.unwrap();

        // Fetch starts at t=30 and resolves at t=40
        advance(PERIOD + Duration::from_secs(1)).await;
        assert_eq!(sync.state(), SyncState::Fetching);
        sync.remove("AAPL").await.unwrap();
        sync.add("TSLA").await.unwrap();

        advance(Duration::from_secs(10)).await;
        assert_eq!(sync.stats().discarded, 1);
        assert_eq!(sync.stats().merges, 0);
        assert!(sync.display().get("AAPL").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer_and_drops_in_flight() {
        let backend = FakeBackend::with_watchlist(&["AAPL"]);
        backend.set_price("AAPL", 180.0);
        *backend.fetch_delay.lock() = Some(Duration::from_secs(5));
        let sync = sync_with(backend.clone());
        sync.load().await.unwrap();

        advance(PERIOD + Duration::from_secs(1)).await;
        sync.stop();
        assert_eq!(sync.state(), SyncState::Stopped);

        advance(PERIOD * 3).await;
        assert_eq!(backend.requests().len(), 1);
        assert_eq!(sync.stats().discarded, 1);
        assert_eq!(sync.display().get("AAPL").unwrap().price, None);
        assert_eq!(sync.state(), SyncState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_watchlist_does_not_fetch() {
        let backend = FakeBackend::with_watchlist(&[]);
        let sync = sync_with(backend.clone());
        sync.load().await.unwrap();

        advance(PERIOD * 3).await;
        assert!(backend.requests().is_empty());
        assert_eq!(sync.state(), SyncState::Scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimistic_add_and_remove() {
        let backend = FakeBackend::with_watchlist(&["AAPL"]);
        let sync = sync_with(backend.clone());
        sync.load().await.unwrap();

        sync.add("nvda").await.unwrap();
        assert!(!sync.display().get("NVDA").unwrap().pending);

        let duplicate = sync.add("NVDA").await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        sync.remove("AAPL").await.unwrap();
        assert_eq!(sync.display().symbols(), vec!["NVDA"]);

        let again = sync.remove("AAPL").await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_mutations_roll_back() {
        let backend = FakeBackend::with_watchlist(&["AAPL", "MSFT"]);
        let sync = sync_with(backend.clone());
        sync.load().await.unwrap();
        *backend.fail_mutations.lock() = true;

        assert!(matches!(sync.add("TSLA").await, Err(AppError::Transport(_))));
        assert!(!sync.display().contains("TSLA"));

        assert!(matches!(sync.remove("AAPL").await, Err(AppError::Transport(_))));
        assert_eq!(sync.display().symbols(), vec!["AAPL", "MSFT"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_tears_down() {
        let backend = FakeBackend::with_watchlist(&["AAPL"]);
        {
            let sync = sync_with(backend.clone());
            sync.load().await.unwrap();
        }

        advance(PERIOD * 2).await;
        assert!(backend.requests().is_empty());
    }
}
