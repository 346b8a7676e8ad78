//! SQLite database module

pub mod models;
mod migrations;
mod prices;
mod watchlist;
mod chat;

use crate::error::Result;
use chrono::{DateTime, Utc};
pub use models::*;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Open (or create) the database file and run migrations
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    /// In-memory database, used by tests and the demo mode
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Price Methods ==========

    /// Append a price observation; `false` if it was already recorded
    pub fn record_observation(&self, obs: &NewPriceObservation) -> Result<bool> {
        let conn = self.conn.lock();
        prices::record_observation(&conn, obs)
    }

    /// Latest observation for a symbol
    pub fn latest_observation(&self, symbol: &str) -> Result<Option<PriceObservation>> {
        let conn = self.conn.lock();
        prices::latest_observation(&conn, symbol)
    }

    /// Most recent observations for a symbol, newest first
    pub fn recent_observations(&self, symbol: &str, limit: usize) -> Result<Vec<PriceObservation>> {
        let conn = self.conn.lock();
        prices::recent_observations(&conn, symbol, limit)
    }

    /// Total observation count
    pub fn count_observations(&self) -> Result<i64> {
        let conn = self.conn.lock();
        prices::count_observations(&conn)
    }

    // ========== Watchlist Methods ==========

    /// Insert a watchlist entry (Conflict on duplicate)
    pub fn insert_watchlist_entry(
        &self,
        user_id: &str,
        symbol: &str,
        added_at: DateTime<Utc>,
    ) -> Result<WatchlistEntry> {
        let conn = self.conn.lock();
        watchlist::insert_entry(&conn, user_id, symbol, added_at)
    }

    /// Delete a watchlist entry (NotFound if absent)
    pub fn delete_watchlist_entry(&self, user_id: &str, symbol: &str) -> Result<()> {
        let conn = self.conn.lock();
        watchlist::delete_entry(&conn, user_id, symbol)
    }

    /// Enriched watchlist for a user
    pub fn list_watchlist(&self, user_id: &str, order: ListOrder) -> Result<Vec<EnrichedEntry>> {
        let conn = self.conn.lock();
        watchlist::list_enriched(&conn, user_id, order)
    }

    /// Single enriched watchlist entry
    pub fn get_watchlist_entry(&self, user_id: &str, symbol: &str) -> Result<EnrichedEntry> {
        let conn = self.conn.lock();
        watchlist::get_enriched(&conn, user_id, symbol)
    }

    /// Number of watchlist entries for a user
    pub fn count_watchlist_entries(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn.lock();
        watchlist::count_entries(&conn, user_id)
    }

    // ========== Chat Methods ==========

    /// Log a chat turn
    pub fn insert_chat_turn(&self, turn: &NewChatTurn) -> Result<ChatTurn> {
        let conn = self.conn.lock();
        chat::insert_turn(&conn, turn)
    }

    /// Chat history for a session, oldest first
    pub fn get_chat_history(&self, session_id: &str, limit: Option<usize>) -> Result<Vec<ChatTurn>> {
        let conn = self.conn.lock();
        chat::session_history(&conn, session_id, limit)
    }
}
