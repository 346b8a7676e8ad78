//! Application state management

use crate::config::Config;
use crate::db::sqlite::SqliteDb;
use crate::error::Result;
use crate::quotes::{self, QuoteProvider};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// SQLite database connection
    pub sqlite: Arc<SqliteDb>,

    /// Quote provider (cached)
    pub quotes: Arc<dyn QuoteProvider>,

    /// Runtime configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Open the database and build the configured quote provider
    pub fn new(config: Config) -> Result<Self> {
        tracing::info!("Database path: {:?}", config.db_path);

        let sqlite = Arc::new(SqliteDb::new(&config.db_path)?);
        let quotes = quotes::build_provider(&config)?;

        Ok(Self::with_parts(sqlite, quotes, config))
    }

    /// Assemble state from already constructed parts
    pub fn with_parts(sqlite: Arc<SqliteDb>, quotes: Arc<dyn QuoteProvider>, config: Config) -> Self {
        Self {
            sqlite,
            quotes,
            config: Arc::new(config),
        }
    }

    /// User id to act on when a request names none
    pub fn resolve_user<'a>(&'a self, user_id: Option<&'a str>) -> &'a str {
        match user_id.map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => &self.config.default_user,
        }
    }
}
