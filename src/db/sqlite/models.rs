//! SQLite database models

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time price observation (append-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub id: i64,
    pub symbol: String,
    pub company_name: Option<String>,
    pub price: f64,
    pub change_percent: f64,
    pub volume: i64,
    pub market_cap: i64,
    pub observed_at: DateTime<Utc>,
}

/// Observation to be recorded
#[derive(Debug, Clone)]
pub struct NewPriceObservation {
    pub symbol: String,
    pub company_name: Option<String>,
    pub price: f64,
    pub change_percent: f64,
    pub volume: i64,
    pub market_cap: i64,
    pub observed_at: DateTime<Utc>,
}

/// Watchlist row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub id: i64,
    pub user_id: String,
    pub symbol: String,
    pub added_at: DateTime<Utc>,
}

/// Watchlist row joined with the latest known observation for its symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEntry {
    pub id: i64,
    pub user_id: String,
    pub symbol: String,
    pub added_at: DateTime<Utc>,
    pub latest: Option<PriceObservation>,
}

/// Ordering of watchlist listings by `added_at`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListOrder {
    #[default]
    Asc,
    Desc,
}

impl ListOrder {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            ListOrder::Asc => "ASC",
            ListOrder::Desc => "DESC",
        }
    }
}

/// Logged chat exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: i64,
    pub session_id: String,
    pub user_message: String,
    pub ai_response: String,
    pub stock_symbol: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Chat exchange to be logged
#[derive(Debug, Clone)]
pub struct NewChatTurn {
    pub session_id: String,
    pub user_message: String,
    pub ai_response: String,
    pub stock_symbol: Option<String>,
}

/// Timestamps are stored as fixed-width RFC 3339 text so that string order
/// matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Read a timestamp column written by [`format_timestamp`]
pub(crate) fn timestamp_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
