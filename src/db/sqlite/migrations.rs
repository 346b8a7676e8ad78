//! SQLite database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Create migrations table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_stock_prices", CREATE_STOCK_PRICES_TABLE)?;
    run_migration(conn, "002_watchlist", CREATE_WATCHLIST_TABLE)?;
    run_migration(conn, "003_chat_history", CREATE_CHAT_HISTORY_TABLE)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_STOCK_PRICES_TABLE: &str = r#"
CREATE TABLE stock_prices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    company_name TEXT,
    price REAL NOT NULL CHECK (price >= 0),
    change_percent REAL NOT NULL DEFAULT 0,
    volume INTEGER NOT NULL DEFAULT 0 CHECK (volume >= 0),
    market_cap INTEGER NOT NULL DEFAULT 0 CHECK (market_cap >= 0),
    observed_at TEXT NOT NULL,
    UNIQUE(symbol, observed_at)
);
CREATE INDEX IF NOT EXISTS idx_stock_prices_symbol_observed ON stock_prices(symbol, observed_at);
"#;

const CREATE_WATCHLIST_TABLE: &str = r#"
CREATE TABLE watchlist (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL DEFAULT 'default_user',
    symbol TEXT NOT NULL,
    added_at TEXT NOT NULL,
    UNIQUE(user_id, symbol)
);
CREATE INDEX IF NOT EXISTS idx_watchlist_user ON watchlist(user_id);
"#;

const CREATE_CHAT_HISTORY_TABLE: &str = r#"
CREATE TABLE chat_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    user_message TEXT NOT NULL,
    ai_response TEXT NOT NULL,
    stock_symbol TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chat_history_session ON chat_history(session_id);
"#;
