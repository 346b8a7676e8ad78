//! Client-side display state
//!
//! Rows are keyed by symbol and kept in the order they were loaded or added.

use crate::db::sqlite::EnrichedEntry;
use crate::quotes::Quote;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One displayed watchlist row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    pub symbol: String,
    pub company_name: Option<String>,
    pub price: Option<f64>,
    pub change_percent: Option<f64>,
    pub volume: Option<i64>,
    pub market_cap: Option<i64>,
    pub added_at: Option<DateTime<Utc>>,
    /// Added locally, not yet confirmed by the server
    pub pending: bool,
    /// When prices were last merged into this row
    pub updated_at: Option<DateTime<Utc>>,
}

impl DisplayRow {
    fn pending(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            company_name: None,
            price: None,
            change_percent: None,
            volume: None,
            market_cap: None,
            added_at: None,
            pending: true,
            updated_at: None,
        }
    }

    fn from_entry(entry: &EnrichedEntry) -> Self {
        let mut row = Self::pending(&entry.symbol);
        row.pending = false;
        row.added_at = Some(entry.added_at);
        if let Some(latest) = &entry.latest {
            row.company_name = latest.company_name.clone();
            row.price = Some(latest.price);
            row.change_percent = Some(latest.change_percent);
            row.volume = Some(latest.volume);
            row.market_cap = Some(latest.market_cap);
            row.updated_at = Some(latest.observed_at);
        }
        row
    }

    fn apply(&mut self, quote: &Quote, at: DateTime<Utc>) {
        if !quote.company_name.is_empty() {
            self.company_name = Some(quote.company_name.clone());
        }
        self.price = Some(quote.price);
        self.change_percent = Some(quote.change_percent);
        self.volume = Some(quote.volume);
        // Providers without market cap data report 0; keep what we had
        if quote.market_cap > 0 || self.market_cap.is_none() {
            self.market_cap = Some(quote.market_cap);
        }
        self.updated_at = Some(at);
    }

    /// Same row ignoring `updated_at`
    pub fn same_content(&self, other: &DisplayRow) -> bool {
        DisplayRow {
            updated_at: None,
            ..self.clone()
        } == DisplayRow {
            updated_at: None,
            ..other.clone()
        }
    }
}

/// Displayed watchlist
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayState {
    rows: Vec<DisplayRow>,
}

impl DisplayState {
    /// State from a server listing
    pub fn from_entries(entries: &[EnrichedEntry]) -> Self {
        Self {
            rows: entries.iter().map(DisplayRow::from_entry).collect(),
        }
    }

    pub fn rows(&self) -> &[DisplayRow] {
        &self.rows
    }

    pub fn get(&self, symbol: &str) -> Option<&DisplayRow> {
        self.rows.iter().find(|r| r.symbol == symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.get(symbol).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Tracked symbols in display order
    pub fn symbols(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.symbol.clone()).collect()
    }

    /// Merge quotes by symbol. Rows without a quote are left untouched and
    /// quotes for untracked symbols are ignored. Returns the number of rows
    /// updated.
    pub fn merge_quotes(&mut self, quotes: &[Quote], at: DateTime<Utc>) -> usize {
        let mut updated = 0;
        for quote in quotes {
            if let Some(row) = self.rows.iter_mut().find(|r| r.symbol == quote.symbol) {
                row.apply(quote, at);
                updated += 1;
            }
        }
        updated
    }

    /// Insert a pending row; `false` if the symbol is already shown
    pub fn insert_pending(&mut self, symbol: &str) -> bool {
        if self.contains(symbol) {
            return false;
        }
        self.rows.push(DisplayRow::pending(symbol));
        true
    }

    /// Replace a pending row with the server's entry, or append it
    pub fn confirm(&mut self, entry: &EnrichedEntry) {
        match self.rows.iter_mut().find(|r| r.symbol == entry.symbol) {
            // Without a server price, keep whatever was merged locally
            Some(row) if entry.latest.is_none() => {
                row.pending = false;
                row.added_at = Some(entry.added_at);
            }
            Some(row) => *row = DisplayRow::from_entry(entry),
            None => self.rows.push(DisplayRow::from_entry(entry)),
        }
    }

    /// Mark a row as confirmed without new data
    pub fn mark_confirmed(&mut self, symbol: &str) {
        if let Some(row) = self.rows.iter_mut().find(|r| r.symbol == symbol) {
            row.pending = false;
        }
    }

    /// Drop a row, returning it with its position
    pub fn remove(&mut self, symbol: &str) -> Option<(usize, DisplayRow)> {
        let index = self.rows.iter().position(|r| r.symbol == symbol)?;
        Some((index, self.rows.remove(index)))
    }

    /// Put a previously removed row back
    pub fn restore(&mut self, index: usize, row: DisplayRow) {
        if self.contains(&row.symbol) {
            return;
        }
        let index = index.min(self.rows.len());
        self.rows.insert(index, row);
    }

    /// Same rows ignoring merge timestamps
    pub fn same_content(&self, other: &DisplayState) -> bool {
        self.rows.len() == other.rows.len()
            && self.rows.iter().zip(&other.rows).all(|(a, b)| a.same_content(b))
    }
}
