//! HTTP client for the REST API and the polling synchronizer built on it

pub mod display;
pub mod synchronizer;

use crate::api::{AddWatchlistRequest, ApiResponse};
use crate::db::sqlite::EnrichedEntry;
use crate::error::{AppError, Result};
use crate::services::{AddResult, BatchQuotes};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub use display::{DisplayRow, DisplayState};
pub use synchronizer::{SyncBackend, SyncState, SyncStats, Synchronizer};

/// Extra time allowed per symbol on top of the base timeout for batch
/// requests, covering the server's spacing of upstream calls
pub const BATCH_TIMEOUT_PER_SYMBOL: Duration = Duration::from_millis(500);

/// Error body returned by the API
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Typed client for the watchlist and quote endpoints
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
    user_id: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid API URL {}: {}", base_url, e)))?;
        // Url::join drops the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            timeout,
            user_id: None,
        })
    }

    /// Act on behalf of a specific user instead of the server default
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Config(format!("Invalid path {}: {}", path, e)))
    }

    fn user_query(&self) -> Vec<(&str, &str)> {
        self.user_id
            .as_deref()
            .map(|u| vec![("user_id", u)])
            .unwrap_or_default()
    }

    /// GET /api/watchlist
    pub async fn list_watchlist(&self) -> Result<Vec<EnrichedEntry>> {
        let response = self
            .client
            .get(self.url("api/watchlist")?)
            .query(&self.user_query())
            .send()
            .await
            .map_err(transport)?;
        read_data(response).await
    }

    /// POST /api/watchlist
    pub async fn add(&self, symbol: &str) -> Result<AddResult> {
        let body = AddWatchlistRequest {
            symbol: symbol.to_string(),
            user_id: self.user_id.clone(),
        };
        let response = self
            .client
            .post(self.url("api/watchlist")?)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        read_data(response).await
    }

    /// DELETE /api/watchlist/{symbol}
    pub async fn remove(&self, symbol: &str) -> Result<()> {
        let path = format!("api/watchlist/{}", urlencoding::encode(symbol));
        let response = self
            .client
            .delete(self.url(&path)?)
            .query(&self.user_query())
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await.map(|_| ())
    }

    /// GET /api/stocks/batch
    pub async fn get_batch(&self, symbols: &[String]) -> Result<BatchQuotes> {
        let joined = symbols.join(",");
        let response = self
            .client
            .get(self.url("api/stocks/batch")?)
            .query(&[("symbols", joined.as_str())])
            .timeout(batch_timeout(self.timeout, symbols.len()))
            .send()
            .await
            .map_err(transport)?;
        read_data(response).await
    }
}

#[async_trait]
impl SyncBackend for ApiClient {
    async fn list_watchlist(&self) -> Result<Vec<EnrichedEntry>> {
        ApiClient::list_watchlist(self).await
    }

    async fn add_symbol(&self, symbol: &str) -> Result<AddResult> {
        self.add(symbol).await
    }

    async fn remove_symbol(&self, symbol: &str) -> Result<()> {
        self.remove(symbol).await
    }

    async fn fetch_prices(&self, symbols: &[String]) -> Result<BatchQuotes> {
        self.get_batch(symbols).await
    }
}

/// Request timeout for a batch of `count` symbols
pub fn batch_timeout(base: Duration, count: usize) -> Duration {
    base + BATCH_TIMEOUT_PER_SYMBOL * count as u32
}

fn transport(err: reqwest::Error) -> AppError {
    AppError::Transport(err.to_string())
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let parsed: Option<ErrorBody> = serde_json::from_str(&body).ok();
    let (code, message) = match parsed {
        Some(err) => (err.code, err.message),
        None => (String::new(), body),
    };

    Err(error_from_response(status, &code, message))
}

async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check_status(response).await?;
    let envelope: ApiResponse<T> = response.json().await.map_err(transport)?;
    envelope
        .data
        .ok_or_else(|| AppError::Transport("Response carried no data".to_string()))
}

/// Map an API error response back onto the error kind that produced it
pub(crate) fn error_from_response(status: StatusCode, code: &str, message: String) -> AppError {
    match (status, code) {
        (_, "CONFLICT") | (StatusCode::CONFLICT, _) => AppError::Conflict(message),
        (_, "NOT_FOUND") | (StatusCode::NOT_FOUND, _) => AppError::NotFound(message),
        (_, "VALIDATION_ERROR") | (StatusCode::BAD_REQUEST, _) => AppError::Validation(message),
        (_, "UPSTREAM_UNAVAILABLE") | (StatusCode::SERVICE_UNAVAILABLE, _) => {
            AppError::UpstreamUnavailable(message)
        }
        (_, "RATE_LIMITED") | (StatusCode::TOO_MANY_REQUESTS, _) => AppError::RateLimited(message),
        _ => AppError::Transport(format!("{}: {}", status, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_keeps_prefix() {
        let client = ApiClient::new("http://localhost:8000/dash", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.url("api/watchlist").unwrap().as_str(),
            "http://localhost:8000/dash/api/watchlist"
        );
        assert!(ApiClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_batch_timeout_grows_with_size() {
        let base = Duration::from_secs(10);
        assert_eq!(batch_timeout(base, 0), base);
        // A full batch spaced at 300ms upstream still fits
        let full = batch_timeout(base, crate::services::quotes_service::MAX_BATCH_SYMBOLS);
        assert!(full >= base + Duration::from_millis(300) * 50);
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            error_from_response(StatusCode::CONFLICT, "CONFLICT", "dup".into()),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            error_from_response(StatusCode::NOT_FOUND, "", "gone".into()),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            error_from_response(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED", "slow".into()),
            AppError::RateLimited(_)
        ));
        assert!(matches!(
            error_from_response(StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", "x".into()),
            AppError::Transport(_)
        ));
    }
}
