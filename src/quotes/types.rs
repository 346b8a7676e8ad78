//! Common quote types

use crate::db::sqlite::NewPriceObservation;
use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Current quote for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub company_name: String,
    pub price: f64,
    pub change_percent: f64,
    pub volume: i64,
    pub market_cap: i64,
    pub previous_close: f64,
    pub open: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub year_high: f64,
    pub year_low: f64,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Observation row for the price log
    pub fn to_observation(&self) -> NewPriceObservation {
        NewPriceObservation {
            symbol: self.symbol.clone(),
            company_name: Some(self.company_name.clone()).filter(|n| !n.is_empty()),
            price: self.price,
            change_percent: self.change_percent,
            volume: self.volume,
            market_cap: self.market_cap,
            observed_at: self.timestamp,
        }
    }
}

/// Symbol search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub symbol: String,
    pub name: String,
}

/// OHLCV candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Supported history ranges
pub const HISTORY_PERIODS: &[&str] = &[
    "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max",
];

/// Supported candle widths
pub const HISTORY_INTERVALS: &[&str] = &[
    "1m", "2m", "5m", "15m", "30m", "60m", "90m", "1h", "1d", "5d", "1wk", "1mo", "3mo",
];

/// Approximate span of a history period
pub fn period_duration(period: &str, now: DateTime<Utc>) -> Option<Duration> {
    let days = match period {
        "1d" => 1,
        "5d" => 5,
        "1mo" => 30,
        "3mo" => 91,
        "6mo" => 182,
        "1y" => 365,
        "2y" => 730,
        "5y" => 1826,
        "10y" => 3652,
        "max" => 36525,
        "ytd" => {
            use chrono::Datelike;
            return Some(Duration::days(now.ordinal0() as i64 + 1));
        }
        _ => return None,
    };
    Some(Duration::days(days))
}

/// Width of a history interval
pub fn interval_duration(interval: &str) -> Option<Duration> {
    let duration = match interval {
        "1m" => Duration::minutes(1),
        "2m" => Duration::minutes(2),
        "5m" => Duration::minutes(5),
        "15m" => Duration::minutes(15),
        "30m" => Duration::minutes(30),
        "60m" | "1h" => Duration::hours(1),
        "90m" => Duration::minutes(90),
        "1d" => Duration::days(1),
        "5d" => Duration::days(5),
        "1wk" => Duration::weeks(1),
        "1mo" => Duration::days(30),
        "3mo" => Duration::days(91),
        _ => return None,
    };
    Some(duration)
}

/// Reject unknown period/interval combinations before calling upstream
pub fn validate_history_range(period: &str, interval: &str) -> Result<()> {
    if !HISTORY_PERIODS.contains(&period) {
        return Err(AppError::Validation(format!(
            "Unsupported period '{}', expected one of {}",
            period,
            HISTORY_PERIODS.join(", ")
        )));
    }
    if !HISTORY_INTERVALS.contains(&interval) {
        return Err(AppError::Validation(format!(
            "Unsupported interval '{}', expected one of {}",
            interval,
            HISTORY_INTERVALS.join(", ")
        )));
    }
    Ok(())
}

/// Trim, uppercase and validate a ticker symbol
pub fn normalize_symbol(raw: &str) -> Result<String> {
    let symbol = raw.trim().to_uppercase();

    if symbol.is_empty() {
        return Err(AppError::Validation("Symbol must not be empty".to_string()));
    }
    if symbol.len() > 10 {
        return Err(AppError::Validation(format!(
            "Symbol '{}' is longer than 10 characters",
            symbol
        )));
    }
    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
    {
        return Err(AppError::Validation(format!(
            "Symbol '{}' contains invalid characters",
            symbol
        )));
    }

    Ok(symbol)
}

/// Round to cents
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("  aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("brk.b").unwrap(), "BRK.B");
        assert_eq!(normalize_symbol("^gspc").unwrap(), "^GSPC");
        assert!(normalize_symbol("   ").is_err());
        assert!(normalize_symbol("AA PL").is_err());
        assert!(normalize_symbol("ABCDEFGHIJK").is_err());
    }

    #[test]
    fn test_validate_history_range() {
        assert!(validate_history_range("1d", "5m").is_ok());
        assert!(validate_history_range("ytd", "1wk").is_ok());
        assert!(matches!(
            validate_history_range("2d", "5m"),
            Err(AppError::Validation(_))
        ));
        assert!(validate_history_range("1d", "7m").is_err());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(178.456), 178.46);
        assert_eq!(round2(-0.804), -0.8);
    }

    #[test]
    fn test_observation_drops_empty_name() {
        let quote = Quote {
            symbol: "AAPL".into(),
            company_name: String::new(),
            price: 1.0,
            change_percent: 0.0,
            volume: 0,
            market_cap: 0,
            previous_close: 0.0,
            open: 0.0,
            day_high: 0.0,
            day_low: 0.0,
            year_high: 0.0,
            year_low: 0.0,
            timestamp: Utc::now(),
        };
        assert!(quote.to_observation().company_name.is_none());
    }
}
