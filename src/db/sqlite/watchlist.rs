//! Watchlist storage

use crate::db::sqlite::models::{
    format_timestamp, timestamp_column, EnrichedEntry, ListOrder, WatchlistEntry,
};
use crate::db::sqlite::prices::observation_from_row;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, Row};

/// Join each watchlist row with the newest observation of its symbol
const ENRICHED_SELECT: &str = "
    SELECT w.id, w.user_id, w.symbol, w.added_at,
           p.id, p.symbol, p.company_name, p.price, p.change_percent,
           p.volume, p.market_cap, p.observed_at
    FROM watchlist w
    LEFT JOIN stock_prices p ON p.id = (
        SELECT p2.id FROM stock_prices p2
        WHERE p2.symbol = w.symbol
        ORDER BY p2.observed_at DESC, p2.id DESC
        LIMIT 1
    )";

fn enriched_from_row(row: &Row<'_>) -> rusqlite::Result<EnrichedEntry> {
    let price_id: Option<i64> = row.get(4)?;
    let latest = match price_id {
        Some(_) => Some(observation_from_row(row, 4)?),
        None => None,
    };

    Ok(EnrichedEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        symbol: row.get(2)?,
        added_at: timestamp_column(row, 3)?,
        latest,
    })
}

/// Insert a watchlist entry.
///
/// The (user_id, symbol) UNIQUE constraint makes the check-and-insert atomic:
/// a duplicate surfaces as [`AppError::Conflict`].
pub fn insert_entry(
    conn: &Connection,
    user_id: &str,
    symbol: &str,
    added_at: DateTime<Utc>,
) -> Result<WatchlistEntry> {
    let inserted = conn.execute(
        "INSERT INTO watchlist (user_id, symbol, added_at) VALUES (?, ?, ?)",
        rusqlite::params![user_id, symbol, format_timestamp(&added_at)],
    );

    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            return Err(AppError::Conflict(format!(
                "{} is already in the watchlist",
                symbol
            )));
        }
        Err(e) => return Err(e.into()),
    }

    Ok(WatchlistEntry {
        id: conn.last_insert_rowid(),
        user_id: user_id.to_string(),
        symbol: symbol.to_string(),
        added_at,
    })
}

/// Delete a watchlist entry. Price history is not touched.
pub fn delete_entry(conn: &Connection, user_id: &str, symbol: &str) -> Result<()> {
    let rows = conn.execute(
        "DELETE FROM watchlist WHERE user_id = ? AND symbol = ?",
        [user_id, symbol],
    )?;

    if rows == 0 {
        return Err(AppError::NotFound(format!(
            "{} is not in the watchlist",
            symbol
        )));
    }

    Ok(())
}

/// All entries for a user, enriched with their latest observation
pub fn list_enriched(conn: &Connection, user_id: &str, order: ListOrder) -> Result<Vec<EnrichedEntry>> {
    let sql = format!(
        "{} WHERE w.user_id = ? ORDER BY w.added_at {dir}, w.id {dir}",
        ENRICHED_SELECT,
        dir = order.as_sql()
    );

    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map([user_id], enriched_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(entries)
}

/// Single enriched entry
pub fn get_enriched(conn: &Connection, user_id: &str, symbol: &str) -> Result<EnrichedEntry> {
    let sql = format!("{} WHERE w.user_id = ? AND w.symbol = ?", ENRICHED_SELECT);

    conn.query_row(&sql, [user_id, symbol], enriched_from_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NotFound(format!("{} is not in the watchlist", symbol))
            }
            _ => e.into(),
        })
}

/// Number of entries a user has
pub fn count_entries(conn: &Connection, user_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM watchlist WHERE user_id = ?",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
