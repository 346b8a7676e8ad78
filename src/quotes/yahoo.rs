//! Yahoo Finance adapter
//!
//! Talks to the public chart and search endpoints directly. Quotes come from
//! the chart `meta` block, which carries no market capitalisation, so
//! `market_cap` is always reported as 0 by this provider.

#![allow(non_snake_case)]

use crate::error::{AppError, Result};
use crate::quotes::types::{round2, Candle, Quote, SearchResult};
use crate::quotes::QuoteProvider;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Yahoo Finance provider implementation
pub struct YahooProvider {
    client: Client,
}

impl YahooProvider {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    async fn fetch_chart(&self, symbol: &str, range: &str, interval: &str) -> Result<ChartResponse> {
        let url = format!("{}/{}", CHART_URL, urlencoding::encode(symbol));

        let response = self
            .client
            .get(&url)
            .query(&[("range", range), ("interval", interval)])
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Yahoo request failed: {}", e)))?;

        let status = response.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(AppError::RateLimited("Yahoo Finance returned 429".to_string()))
            }
            StatusCode::NOT_FOUND => {
                return Err(AppError::NotFound(format!("Unknown symbol: {}", symbol)))
            }
            s if !s.is_success() => {
                return Err(AppError::UpstreamUnavailable(format!(
                    "Yahoo Finance returned {}",
                    s
                )))
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Yahoo response unreadable: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| AppError::UpstreamUnavailable(format!("Unexpected chart payload: {}", e)))
    }
}

#[async_trait]
impl QuoteProvider for YahooProvider {
    fn id(&self) -> &'static str {
        "yahoo"
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        let chart = self.fetch_chart(symbol, "1d", "1d").await?;
        parse_chart_quote(symbol, chart)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[("q", query), ("quotesCount", "8"), ("newsCount", "0")])
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Yahoo search failed: {}", e)))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(AppError::RateLimited("Yahoo Finance returned 429".to_string()))
            }
            s if !s.is_success() => {
                return Err(AppError::UpstreamUnavailable(format!(
                    "Yahoo search returned {}",
                    s
                )))
            }
            _ => {}
        }

        let data: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Unexpected search payload: {}", e)))?;

        Ok(parse_search(data))
    }

    async fn get_history(&self, symbol: &str, period: &str, interval: &str) -> Result<Vec<Candle>> {
        let chart = self.fetch_chart(symbol, period, interval).await?;
        parse_chart_candles(symbol, chart)
    }
}

// ========== Wire types ==========

#[derive(Debug, Deserialize)]
pub(crate) struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    regularMarketPrice: Option<f64>,
    chartPreviousClose: Option<f64>,
    previousClose: Option<f64>,
    regularMarketVolume: Option<i64>,
    regularMarketDayHigh: Option<f64>,
    regularMarketDayLow: Option<f64>,
    fiftyTwoWeekHigh: Option<f64>,
    fiftyTwoWeekLow: Option<f64>,
    regularMarketTime: Option<i64>,
    longName: Option<String>,
    shortName: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<IndicatorQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct IndicatorQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
struct SearchQuote {
    symbol: Option<String>,
    shortname: Option<String>,
    longname: Option<String>,
    quoteType: Option<String>,
}

// ========== Parsing ==========

fn first_result(symbol: &str, response: ChartResponse) -> Result<ChartResult> {
    if let Some(err) = response.chart.error {
        let description = err.description.unwrap_or_default();
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Err(AppError::NotFound(format!("Unknown symbol {}: {}", symbol, description)));
        }
        return Err(AppError::UpstreamUnavailable(format!("{}: {}", err.code, description)));
    }

    response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| AppError::NotFound(format!("No data for {}", symbol)))
}

fn epoch_to_utc(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

/// Build a [`Quote`] from a chart response
pub(crate) fn parse_chart_quote(symbol: &str, response: ChartResponse) -> Result<Quote> {
    let result = first_result(symbol, response)?;
    let meta = result.meta;

    let price = meta
        .regularMarketPrice
        .ok_or_else(|| AppError::NotFound(format!("No price for {}", symbol)))?;
    let previous_close = meta.chartPreviousClose.or(meta.previousClose).unwrap_or(price);

    let change_percent = if previous_close > 0.0 {
        (price - previous_close) / previous_close * 100.0
    } else {
        0.0
    };

    let open = result
        .indicators
        .as_ref()
        .and_then(|ind| ind.quote.first())
        .and_then(|q| q.open.iter().flatten().next().copied())
        .unwrap_or(previous_close);

    let company_name = meta
        .longName
        .or(meta.shortName)
        .unwrap_or_else(|| symbol.to_string());

    let timestamp = meta
        .regularMarketTime
        .and_then(epoch_to_utc)
        .unwrap_or_else(Utc::now);

    Ok(Quote {
        // Keyed on the requested ticker; upstream may canonicalise it
        symbol: symbol.to_string(),
        company_name,
        price: round2(price),
        change_percent: round2(change_percent),
        volume: meta.regularMarketVolume.unwrap_or(0).max(0),
        market_cap: 0,
        previous_close: round2(previous_close),
        open: round2(open),
        day_high: round2(meta.regularMarketDayHigh.unwrap_or(price)),
        day_low: round2(meta.regularMarketDayLow.unwrap_or(price)),
        year_high: round2(meta.fiftyTwoWeekHigh.unwrap_or(price)),
        year_low: round2(meta.fiftyTwoWeekLow.unwrap_or(price)),
        timestamp,
    })
}

/// Build candles from a chart response, skipping incomplete bars
pub(crate) fn parse_chart_candles(symbol: &str, response: ChartResponse) -> Result<Vec<Candle>> {
    let result = first_result(symbol, response)?;
    let quote = result
        .indicators
        .and_then(|ind| ind.quote.into_iter().next())
        .unwrap_or_default();

    let candles = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let open = quote.open.get(i).copied().flatten()?;
            let high = quote.high.get(i).copied().flatten()?;
            let low = quote.low.get(i).copied().flatten()?;
            let close = quote.close.get(i).copied().flatten()?;
            let volume = quote.volume.get(i).copied().flatten().unwrap_or(0);

            Some(Candle {
                timestamp: epoch_to_utc(*ts)?,
                open: round2(open),
                high: round2(high),
                low: round2(low),
                close: round2(close),
                volume,
            })
        })
        .collect();

    Ok(candles)
}

/// Keep tradable instruments only
pub(crate) fn parse_search(response: SearchResponse) -> Vec<SearchResult> {
    response
        .quotes
        .into_iter()
        .filter(|q| {
            matches!(
                q.quoteType.as_deref(),
                Some("EQUITY") | Some("ETF") | Some("INDEX")
            )
        })
        .filter_map(|q| {
            let symbol = q.symbol?;
            let name = q.longname.or(q.shortname).unwrap_or_else(|| symbol.clone());
            Some(SearchResult { symbol, name })
        })
        .take(crate::quotes::catalog::MAX_SEARCH_RESULTS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const AAPL_CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "currency": "USD",
                    "symbol": "AAPL",
                    "regularMarketPrice": 182.314,
                    "chartPreviousClose": 180.0,
                    "regularMarketVolume": 51234567,
                    "regularMarketDayHigh": 183.1,
                    "regularMarketDayLow": 179.55,
                    "fiftyTwoWeekHigh": 199.62,
                    "fiftyTwoWeekLow": 164.08,
                    "regularMarketTime": 1717000000,
                    "longName": "Apple Inc.",
                    "shortName": "Apple"
                },
                "timestamp": [1716990000, 1716993600, 1716997200],
                "indicators": {
                    "quote": [{
                        "open": [180.5, null, 181.9],
                        "high": [181.2, 182.0, 183.1],
                        "low": [179.55, 180.9, 181.5],
                        "close": [181.0, 181.8, 182.31],
                        "volume": [1000, 2000, null]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    const NOT_FOUND_CHART: &str = r#"{
        "chart": {
            "result": null,
            "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
        }
    }"#;

    fn chart(raw: &str) -> ChartResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_parse_chart_quote() {
        let quote = parse_chart_quote("AAPL", chart(AAPL_CHART)).unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.company_name, "Apple Inc.");
        assert_eq!(quote.price, 182.31);
        assert_eq!(quote.change_percent, 1.29);
        assert_eq!(quote.volume, 51_234_567);
        assert_eq!(quote.market_cap, 0);
        assert_eq!(quote.open, 180.5);
        assert_eq!(quote.timestamp.timestamp(), 1_717_000_000);
    }

    #[test]
    fn test_quote_keeps_requested_symbol() {
        let renamed = AAPL_CHART.replace(r#""symbol": "AAPL""#, r#""symbol": "AAPL.O""#);
        let quote = parse_chart_quote("AAPL", chart(&renamed)).unwrap();
        assert_eq!(quote.symbol, "AAPL");
    }

    #[test]
    fn test_parse_chart_not_found() {
        let result = parse_chart_quote("ZZZZZ", chart(NOT_FOUND_CHART));
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_parse_candles_skips_incomplete_bars() {
        let candles = parse_chart_candles("AAPL", chart(AAPL_CHART)).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 181.0);
        assert_eq!(candles[1].close, 182.31);
        assert_eq!(candles[1].volume, 0);
    }

    #[test]
    fn test_parse_search_filters_instrument_types() {
        let raw = r#"{
            "quotes": [
                {"symbol": "AAPL", "shortname": "Apple Inc.", "longname": "Apple Inc.", "quoteType": "EQUITY"},
                {"symbol": "AAPL240621C00100000", "shortname": "AAPL Call", "quoteType": "OPTION"},
                {"symbol": "SPY", "shortname": "SPDR S&P 500", "quoteType": "ETF"}
            ]
        }"#;
        let hits = parse_search(serde_json::from_str(raw).unwrap());
        let symbols: Vec<_> = hits.iter().map(|h| h.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "SPY"]);
        assert_eq!(hits[1].name, "SPDR S&P 500");
    }
}
