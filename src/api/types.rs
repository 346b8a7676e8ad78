//! REST API types
//!
//! Every JSON response is wrapped in [`ApiResponse`]. Errors use
//! [`crate::error::ErrorResponse`], which shares the `status` field.

use crate::db::sqlite::ListOrder;
use crate::quotes::Quote;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Response Envelope
// ============================================================================

/// Standard API response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success_with_message(message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: Some(message.to_string()),
            data: None,
        }
    }

    pub fn success_with_data(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Empty data type for responses without data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Empty {}

// ============================================================================
// Request Types
// ============================================================================

/// POST /api/watchlist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddWatchlistRequest {
    pub symbol: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// GET /api/watchlist query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListWatchlistQuery {
    pub user_id: Option<String>,
    #[serde(default)]
    pub order: ListOrder,
}

/// Query carrying only an optional user
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

/// GET /api/stocks/batch query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchQuery {
    /// Comma separated symbols
    pub symbols: Option<String>,
}

fn default_period() -> String {
    "1mo".to_string()
}

fn default_interval() -> String {
    "1d".to_string()
}

/// GET /api/stocks/{symbol}/history query
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_period")]
    pub period: String,
    #[serde(default = "default_interval")]
    pub interval: String,
}

/// Query with an optional row limit
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

// ============================================================================
// Response Data
// ============================================================================

/// GET /health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthData {
    pub service: String,
    pub version: String,
    pub quote_provider: String,
}

/// GET /
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

/// Message pushed over the price stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    StockUpdate {
        data: Vec<Quote>,
        missing: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
}
