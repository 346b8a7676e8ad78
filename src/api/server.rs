//! HTTP server for the REST API and price stream
//!
//! Provides:
//! - Watchlist, quote and chat endpoints under /api
//! - WebSocket price stream at /ws/stocks
//! - Rate limiting to keep clients from exhausting the quote provider

use crate::api::handlers;
use crate::api::rate_limiter::{rate_limit_middleware, RateLimiterState};
use crate::api::stream;
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Build the application router
pub fn router(state: AppState) -> Router {
    let rate_limiter = Arc::new(RateLimiterState::new(
        state.config.api_rate_limit,
        state.config.quote_rate_limit,
    ));

    info!(
        "Rate limits: API={}/s, Quote={}/s",
        state.config.api_rate_limit, state.config.quote_rate_limit
    );

    let cors = cors_layer(&state.config.cors_allow_origins);

    Router::new()
        // ================================================================
        // Service
        // ================================================================
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))

        // ================================================================
        // Watchlist
        // ================================================================
        .route(
            "/api/watchlist",
            get(handlers::list_watchlist).post(handlers::add_to_watchlist),
        )
        .route("/api/watchlist/:symbol", delete(handlers::remove_from_watchlist))

        // ================================================================
        // Stocks
        // ================================================================
        .route("/api/stocks/batch", get(handlers::get_batch))
        .route("/api/stocks/search/:query", get(handlers::search_stocks))
        .route("/api/stocks/:symbol", get(handlers::get_stock))
        .route("/api/stocks/:symbol/history", get(handlers::get_history))
        .route("/api/stocks/:symbol/summary", get(handlers::get_summary))
        .route("/api/stocks/:symbol/observations", get(handlers::get_observations))

        // ================================================================
        // Chat log
        // ================================================================
        .route("/api/chat/turns", post(handlers::log_chat_turn))
        .route("/api/chat/history/:session_id", get(handlers::get_chat_history))

        // ================================================================
        // Price stream
        // ================================================================
        .route("/ws/stocks", get(stream::stock_stream))

        .with_state(state)
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {}: {}", origin, e);
                None
            }
        })
        .collect();

    layer.allow_origin(allowed)
}

/// API server manager
pub struct ApiServer {
    state: AppState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            shutdown_tx: None,
            handle: None,
        }
    }

    /// Bind and start serving in the background; returns the bound address
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let addr = self.state.config.listen_addr()?;
        let app = router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind to {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        info!("Starting stock dashboard API server on {}", local_addr);

        self.handle = Some(tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            });

            if let Err(e) = server.await {
                error!("API server error: {}", e);
            }
        }));

        info!("");
        info!("=== Endpoints ===");
        for endpoint in handlers::ENDPOINTS {
            info!("  {}", endpoint);
        }

        Ok(local_addr)
    }

    /// Signal shutdown and wait for in-flight requests to finish
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("API server task failed: {}", e);
            }
        }
    }

    /// Send the stop signal
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("API server stop signal sent");
        }
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop();
    }
}
