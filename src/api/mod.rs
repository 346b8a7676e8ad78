//! REST API server module
//!
//! Provides:
//! - Watchlist endpoints (/api/watchlist)
//! - Quote, search, history and summary endpoints (/api/stocks/*)
//! - Chat turn log (/api/chat/*)
//! - WebSocket price stream (/ws/stocks)

mod server;
pub mod handlers;
pub mod rate_limiter;
pub mod stream;
mod types;

pub use server::{router, ApiServer};
pub use types::{
    AddWatchlistRequest,
    ApiResponse,
    BatchQuery,
    Empty,
    HealthData,
    HistoryQuery,
    LimitQuery,
    ListWatchlistQuery,
    ServiceInfo,
    StreamMessage,
    UserQuery,
};
