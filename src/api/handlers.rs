//! REST API endpoint handlers

use crate::api::types::*;
use crate::config::split_list;
use crate::db::sqlite::{ChatTurn, EnrichedEntry, PriceObservation};
use crate::error::Result;
use crate::quotes::{Candle, Quote, SearchResult};
use crate::services::{
    AddResult, BatchQuotes, ChatHistory, ChatService, Enrichment, LogTurnRequest, QuoteSummary,
    QuotesService, WatchlistService,
};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

type ApiResult<T> = Result<Json<ApiResponse<T>>>;

/// Routes listed by the index endpoint
pub const ENDPOINTS: &[&str] = &[
    "GET    /health",
    "GET    /api/watchlist",
    "POST   /api/watchlist",
    "DELETE /api/watchlist/{symbol}",
    "GET    /api/stocks/{symbol}",
    "GET    /api/stocks/batch?symbols=",
    "GET    /api/stocks/search/{query}",
    "GET    /api/stocks/{symbol}/history?period=&interval=",
    "GET    /api/stocks/{symbol}/summary",
    "GET    /api/stocks/{symbol}/observations?limit=",
    "POST   /api/chat/turns",
    "GET    /api/chat/history/{session_id}",
    "GET    /ws/stocks",
];

// ============================================================================
// Service
// ============================================================================

/// Health check endpoint - GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthData>> {
    Json(
        ApiResponse::success_with_data(HealthData {
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            quote_provider: state.quotes.id().to_string(),
        })
        .with_message("Stock dashboard API is running"),
    )
}

/// Service info - GET /
pub async fn index() -> Json<ApiResponse<ServiceInfo>> {
    Json(ApiResponse::success_with_data(ServiceInfo {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
    }))
}

// ============================================================================
// Watchlist
// ============================================================================

/// GET /api/watchlist
pub async fn list_watchlist(
    State(state): State<AppState>,
    Query(query): Query<ListWatchlistQuery>,
) -> ApiResult<Vec<EnrichedEntry>> {
    let user_id = state.resolve_user(query.user_id.as_deref());
    let entries = WatchlistService::list(&state, user_id, query.order)?;
    Ok(Json(ApiResponse::success_with_data(entries)))
}

/// POST /api/watchlist
pub async fn add_to_watchlist(
    State(state): State<AppState>,
    Json(request): Json<AddWatchlistRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AddResult>>)> {
    let user_id = state.resolve_user(request.user_id.as_deref());
    let result = WatchlistService::add(&state, user_id, &request.symbol).await?;

    let message = match &result.enrichment {
        Enrichment::Fresh => format!("Added {} to watchlist", result.entry.symbol),
        Enrichment::Unavailable { .. } => format!(
            "Added {} to watchlist; price unavailable",
            result.entry.symbol
        ),
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_data(result).with_message(message)),
    ))
}

/// DELETE /api/watchlist/{symbol}
pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Empty> {
    let user_id = state.resolve_user(query.user_id.as_deref());
    WatchlistService::remove(&state, user_id, &symbol)?;

    Ok(Json(ApiResponse::success_with_message(&format!(
        "Removed {} from watchlist",
        symbol.trim().to_uppercase()
    ))))
}

// ============================================================================
// Stocks
// ============================================================================

/// GET /api/stocks/{symbol}
pub async fn get_stock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> ApiResult<Quote> {
    let quote = QuotesService::get_quote(&state, &symbol).await?;
    Ok(Json(ApiResponse::success_with_data(quote)))
}

/// GET /api/stocks/batch?symbols=AAPL,MSFT
pub async fn get_batch(
    State(state): State<AppState>,
    Query(query): Query<BatchQuery>,
) -> ApiResult<BatchQuotes> {
    let symbols = query.symbols.as_deref().map(split_list).unwrap_or_default();
    let batch = QuotesService::get_batch(&state, &symbols).await?;
    Ok(Json(ApiResponse::success_with_data(batch)))
}

/// GET /api/stocks/search/{query}
pub async fn search_stocks(
    State(state): State<AppState>,
    Path(query): Path<String>,
) -> ApiResult<Vec<SearchResult>> {
    let results = QuotesService::search(&state, &query).await?;
    Ok(Json(ApiResponse::success_with_data(results)))
}

/// GET /api/stocks/{symbol}/history
pub async fn get_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<Candle>> {
    let candles = QuotesService::history(&state, &symbol, &query.period, &query.interval).await?;
    Ok(Json(ApiResponse::success_with_data(candles)))
}

/// GET /api/stocks/{symbol}/summary
pub async fn get_summary(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> ApiResult<QuoteSummary> {
    let summary = QuotesService::summary(&state, &symbol).await?;
    Ok(Json(ApiResponse::success_with_data(summary)))
}

/// GET /api/stocks/{symbol}/observations
pub async fn get_observations(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<PriceObservation>> {
    let observations = QuotesService::observations(&state, &symbol, query.limit.unwrap_or(100))?;
    Ok(Json(ApiResponse::success_with_data(observations)))
}

// ============================================================================
// Chat
// ============================================================================

/// POST /api/chat/turns
pub async fn log_chat_turn(
    State(state): State<AppState>,
    Json(request): Json<LogTurnRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ChatTurn>>)> {
    let turn = ChatService::log_turn(&state, request)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success_with_data(turn))))
}

/// GET /api/chat/history/{session_id}
pub async fn get_chat_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<ChatHistory> {
    let history = ChatService::history(&state, &session_id, query.limit)?;
    Ok(Json(ApiResponse::success_with_data(history)))
}
