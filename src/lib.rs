//! Stock Dashboard - watchlist and quote service
//!
//! A REST service that looks up stock quotes, keeps a per-user watchlist
//! enriched with the latest recorded price, and logs chat turns. The
//! [`client`] module holds the typed API client and the polling synchronizer
//! that keeps a displayed watchlist fresh.

pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod quotes;
pub mod services;
pub mod state;

use api::ApiServer;
use config::Config;
use state::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockdash=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the API server until Ctrl-C
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    tracing::info!("Starting Stock Dashboard API...");

    let state = AppState::new(config)?;
    tracing::info!("Application state initialized");

    let mut server = ApiServer::new(state);
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    server.shutdown().await;

    Ok(())
}
