//! Services Layer
//!
//! Business logic shared between the REST handlers and the price stream.
//!
//! # Architecture
//!
//! ```text
//! REST API ────┐
//!              ├──> Services --> Quote Provider / SQLite
//! WS stream ───┘
//! ```
//!
//! # Services
//!
//! - `WatchlistService` - List, add, remove watchlist entries
//! - `QuotesService` - Quotes, batches, search, history, summaries
//! - `ChatService` - Chat turn log

pub mod watchlist_service;
pub mod quotes_service;
pub mod chat_service;

pub use watchlist_service::{AddResult, Enrichment, WatchlistService};
pub use quotes_service::{BatchQuotes, MarketStatus, QuoteSummary, QuotesService};
pub use chat_service::{ChatHistory, ChatService, LogTurnRequest};
