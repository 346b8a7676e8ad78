//! Price observation log

use crate::db::sqlite::models::{format_timestamp, timestamp_column, NewPriceObservation, PriceObservation};
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row};

pub(crate) const OBSERVATION_COLUMNS: &str =
    "id, symbol, company_name, price, change_percent, volume, market_cap, observed_at";

pub(crate) fn observation_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<PriceObservation> {
    Ok(PriceObservation {
        id: row.get(offset)?,
        symbol: row.get(offset + 1)?,
        company_name: row.get(offset + 2)?,
        price: row.get(offset + 3)?,
        change_percent: row.get(offset + 4)?,
        volume: row.get(offset + 5)?,
        market_cap: row.get(offset + 6)?,
        observed_at: timestamp_column(row, offset + 7)?,
    })
}

/// Append an observation.
///
/// Returns `false` when an observation with the same symbol and timestamp
/// already exists; the log is left unchanged in that case.
pub fn record_observation(conn: &Connection, obs: &NewPriceObservation) -> Result<bool> {
    let rows = conn.execute(
        "INSERT OR IGNORE INTO stock_prices
            (symbol, company_name, price, change_percent, volume, market_cap, observed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            obs.symbol,
            obs.company_name,
            obs.price.max(0.0),
            obs.change_percent,
            obs.volume.max(0),
            obs.market_cap.max(0),
            format_timestamp(&obs.observed_at),
        ],
    )?;

    Ok(rows > 0)
}

/// Latest observation for a symbol
pub fn latest_observation(conn: &Connection, symbol: &str) -> Result<Option<PriceObservation>> {
    let sql = format!(
        "SELECT {} FROM stock_prices WHERE symbol = ?
         ORDER BY observed_at DESC, id DESC LIMIT 1",
        OBSERVATION_COLUMNS
    );

    let obs = conn
        .query_row(&sql, [symbol], |row| observation_from_row(row, 0))
        .optional()?;

    Ok(obs)
}

/// Most recent observations for a symbol, newest first
pub fn recent_observations(conn: &Connection, symbol: &str, limit: usize) -> Result<Vec<PriceObservation>> {
    let sql = format!(
        "SELECT {} FROM stock_prices WHERE symbol = ?
         ORDER BY observed_at DESC, id DESC LIMIT ?",
        OBSERVATION_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let observations = stmt
        .query_map(rusqlite::params![symbol, limit as i64], |row| observation_from_row(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(observations)
}

/// Total number of observations across all symbols
pub fn count_observations(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM stock_prices", [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::migrations::run_migrations;
    use chrono::{Duration, Utc};

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn observation(symbol: &str, price: f64, minutes_ago: i64) -> NewPriceObservation {
        NewPriceObservation {
            symbol: symbol.to_string(),
            company_name: Some(format!("{} Inc.", symbol)),
            price,
            change_percent: 0.5,
            volume: 5_000_000_000,
            market_cap: 2_800_000_000_000,
            observed_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_latest_is_max_observed_at_not_last_inserted() {
        let conn = create_test_db();

        record_observation(&conn, &observation("AAPL", 170.0, 5)).unwrap();
        record_observation(&conn, &observation("AAPL", 180.0, 1)).unwrap();
        // Inserted last but observed earliest
        record_observation(&conn, &observation("AAPL", 160.0, 30)).unwrap();

        let latest = latest_observation(&conn, "AAPL").unwrap().unwrap();
        assert_eq!(latest.price, 180.0);
        assert_eq!(latest.volume, 5_000_000_000);
    }

    #[test]
    fn test_duplicate_observation_is_ignored() {
        let conn = create_test_db();
        let obs = observation("MSFT", 385.0, 0);

        assert!(record_observation(&conn, &obs).unwrap());
        assert!(!record_observation(&conn, &obs).unwrap());
        assert_eq!(count_observations(&conn).unwrap(), 1);
    }

    #[test]
    fn test_latest_for_unknown_symbol() {
        let conn = create_test_db();
        assert!(latest_observation(&conn, "ZZZZ").unwrap().is_none());
    }

    #[test]
    fn test_recent_observations_newest_first() {
        let conn = create_test_db();
        for (i, price) in [100.0, 101.0, 102.0].iter().enumerate() {
            record_observation(&conn, &observation("TSLA", *price, 10 - i as i64)).unwrap();
        }

        let recent = recent_observations(&conn, "TSLA", 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].price, 102.0);
        assert_eq!(recent[1].price, 101.0);
    }
}
