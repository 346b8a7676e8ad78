//! Static reference data
//!
//! Used by the demo provider and as the offline fallback for symbol search.

use crate::quotes::types::SearchResult;

/// Reference quote used when no live data source is configured
#[derive(Debug, Clone, Copy)]
pub struct ReferenceQuote {
    pub symbol: &'static str,
    pub company_name: &'static str,
    pub price: f64,
    pub change_percent: f64,
    pub volume: i64,
    pub market_cap: i64,
}

const fn rq(
    symbol: &'static str,
    company_name: &'static str,
    price: f64,
    change_percent: f64,
    volume: i64,
    market_cap: i64,
) -> ReferenceQuote {
    ReferenceQuote {
        symbol,
        company_name,
        price,
        change_percent,
        volume,
        market_cap,
    }
}

pub const REFERENCE_QUOTES: &[ReferenceQuote] = &[
    rq("AAPL", "Apple Inc.", 178.50, 1.25, 50_000_000, 2_800_000_000_000),
    rq("GOOGL", "Alphabet Inc.", 142.30, -0.80, 25_000_000, 1_800_000_000_000),
    rq("GOOG", "Alphabet Inc. Class C", 143.50, -0.75, 20_000_000, 1_790_000_000_000),
    rq("MSFT", "Microsoft Corporation", 385.00, 2.10, 30_000_000, 2_900_000_000_000),
    rq("TSLA", "Tesla Inc.", 248.75, -1.50, 100_000_000, 790_000_000_000),
    rq("AMZN", "Amazon.com Inc.", 158.20, 0.95, 40_000_000, 1_650_000_000_000),
    rq("META", "Meta Platforms Inc.", 505.00, 1.80, 20_000_000, 1_300_000_000_000),
    rq("NVDA", "NVIDIA Corporation", 875.50, 3.20, 45_000_000, 2_150_000_000_000),
    rq("JPM", "JPMorgan Chase & Co.", 198.25, 0.45, 12_000_000, 570_000_000_000),
    rq("V", "Visa Inc.", 280.50, 0.65, 8_000_000, 580_000_000_000),
    rq("WMT", "Walmart Inc.", 165.30, -0.25, 10_000_000, 450_000_000_000),
    rq("KO", "The Coca-Cola Company", 62.80, 0.55, 15_000_000, 270_000_000_000),
    rq("DIS", "The Walt Disney Company", 112.40, 0.85, 12_000_000, 205_000_000_000),
    rq("NFLX", "Netflix Inc.", 485.20, 1.45, 8_000_000, 215_000_000_000),
    rq("BA", "The Boeing Company", 215.60, -1.20, 6_000_000, 130_000_000_000),
    rq("INTC", "Intel Corporation", 45.30, -0.65, 25_000_000, 190_000_000_000),
    rq("AMD", "Advanced Micro Devices Inc.", 165.80, 2.35, 50_000_000, 270_000_000_000),
    rq("CRM", "Salesforce Inc.", 275.30, 1.15, 5_000_000, 265_000_000_000),
    rq("UBER", "Uber Technologies Inc.", 72.50, 1.85, 20_000_000, 150_000_000_000),
    rq("XOM", "Exxon Mobil Corporation", 105.40, -0.85, 18_000_000, 420_000_000_000),
    rq("BAC", "Bank of America Corporation", 35.80, 0.55, 45_000_000, 280_000_000_000),
    rq("PFE", "Pfizer Inc.", 28.90, -0.35, 40_000_000, 165_000_000_000),
    rq("JNJ", "Johnson & Johnson", 158.40, 0.45, 8_000_000, 385_000_000_000),
    rq("F", "Ford Motor Company", 12.40, 0.65, 55_000_000, 50_000_000_000),
    rq("PLTR", "Palantir Technologies Inc.", 22.40, 2.85, 45_000_000, 48_000_000_000),
    rq("COIN", "Coinbase Global Inc.", 145.30, 3.25, 12_000_000, 35_000_000_000),
];

/// Popular symbols for offline search
pub const COMMON_STOCKS: &[(&str, &str)] = &[
    ("AAPL", "Apple Inc."),
    ("GOOGL", "Alphabet Inc."),
    ("GOOG", "Alphabet Inc. Class C"),
    ("MSFT", "Microsoft Corporation"),
    ("AMZN", "Amazon.com Inc."),
    ("TSLA", "Tesla Inc."),
    ("META", "Meta Platforms Inc."),
    ("NVDA", "NVIDIA Corporation"),
    ("AMD", "Advanced Micro Devices"),
    ("INTC", "Intel Corporation"),
    ("CRM", "Salesforce Inc."),
    ("ORCL", "Oracle Corporation"),
    ("ADBE", "Adobe Inc."),
    ("NFLX", "Netflix Inc."),
    ("PYPL", "PayPal Holdings Inc."),
    ("UBER", "Uber Technologies"),
    ("SHOP", "Shopify Inc."),
    ("SPOT", "Spotify Technology"),
    ("JPM", "JPMorgan Chase & Co."),
    ("BAC", "Bank of America"),
    ("WFC", "Wells Fargo & Company"),
    ("GS", "Goldman Sachs Group"),
    ("MS", "Morgan Stanley"),
    ("V", "Visa Inc."),
    ("MA", "Mastercard Inc."),
    ("WMT", "Walmart Inc."),
    ("COST", "Costco Wholesale"),
    ("HD", "Home Depot Inc."),
    ("NKE", "Nike Inc."),
    ("SBUX", "Starbucks Corporation"),
    ("MCD", "McDonalds Corporation"),
    ("KO", "Coca-Cola Company"),
    ("PEP", "PepsiCo Inc."),
    ("JNJ", "Johnson & Johnson"),
    ("UNH", "UnitedHealth Group"),
    ("PFE", "Pfizer Inc."),
    ("LLY", "Eli Lilly and Company"),
    ("XOM", "Exxon Mobil Corporation"),
    ("CVX", "Chevron Corporation"),
    ("BA", "Boeing Company"),
    ("CAT", "Caterpillar Inc."),
    ("DIS", "Walt Disney Company"),
    ("F", "Ford Motor Company"),
    ("GM", "General Motors"),
    ("COIN", "Coinbase Global"),
    ("SPY", "SPDR S&P 500 ETF"),
    ("QQQ", "Invesco QQQ Trust"),
    ("VOO", "Vanguard S&P 500 ETF"),
    ("^GSPC", "S&P 500 Index"),
    ("^DJI", "Dow Jones Industrial Average"),
    ("^IXIC", "NASDAQ Composite"),
];

/// Maximum number of search hits returned
pub const MAX_SEARCH_RESULTS: usize = 8;

/// Reference quote for a symbol
pub fn reference_quote(symbol: &str) -> Option<&'static ReferenceQuote> {
    REFERENCE_QUOTES.iter().find(|q| q.symbol == symbol)
}

/// Case-insensitive substring search over [`COMMON_STOCKS`].
///
/// A short purely alphabetic query with no hits is echoed back as a custom
/// symbol so users can still add tickers that are not in the list.
pub fn search_common(query: &str) -> Vec<SearchResult> {
    let query = query.trim();
    if query.is_empty() {
        return vec![];
    }
    let needle = query.to_lowercase();

    let mut results: Vec<SearchResult> = COMMON_STOCKS
        .iter()
        .filter(|(symbol, name)| {
            symbol.to_lowercase().contains(&needle) || name.to_lowercase().contains(&needle)
        })
        .map(|(symbol, name)| SearchResult {
            symbol: symbol.to_string(),
            name: name.to_string(),
        })
        .take(MAX_SEARCH_RESULTS)
        .collect();

    if results.is_empty() && query.len() <= 5 && query.chars().all(|c| c.is_ascii_alphabetic()) {
        let symbol = query.to_uppercase();
        results.push(SearchResult {
            name: format!("{} (Custom)", symbol),
            symbol,
        });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_by_name_and_symbol() {
        let hits = search_common("micro");
        assert!(hits.iter().any(|h| h.symbol == "MSFT"));
        assert!(hits.iter().any(|h| h.symbol == "AMD"));

        let hits = search_common("nvda");
        assert_eq!(hits[0].symbol, "NVDA");
    }

    #[test]
    fn test_search_caps_results() {
        assert!(search_common("a").len() <= MAX_SEARCH_RESULTS);
    }

    #[test]
    fn test_unknown_short_query_echoed() {
        let hits = search_common("zqxj");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].symbol, "ZQXJ");
        assert!(search_common("zqxj123").is_empty());
    }

    #[test]
    fn test_reference_lookup() {
        assert_eq!(reference_quote("AAPL").unwrap().company_name, "Apple Inc.");
        assert!(reference_quote("ZZZZ").is_none());
    }
}
