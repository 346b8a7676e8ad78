//! Rate limiting middleware for the REST API
//!
//! Token bucket rate limiting in front of the handlers. Quote endpoints reach
//! the upstream provider and get their own, tighter bucket:
//! - General API: api_rate_limit (default 100/s)
//! - Quote lookups under /api/stocks: quote_rate_limit (default 10/s)

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rate limit type for different endpoint categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitType {
    /// Watchlist, chat, health
    General,
    /// Calls that may reach the quote provider
    Quote,
}

impl RateLimitType {
    fn label(&self) -> &'static str {
        match self {
            RateLimitType::General => "general",
            RateLimitType::Quote => "quote",
        }
    }
}

/// Token bucket rate limiter
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    tokens: f64,
    /// Tokens added per second
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_second: u32) -> Self {
        let rate = rate_per_second.max(1);
        Self {
            capacity: rate,
            tokens: rate as f64,
            refill_rate: rate as f64,
            last_refill: Instant::now(),
        }
    }

    /// Try to consume a token, returns true if allowed
    pub fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);

        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity as f64);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until a token will be available
    pub fn time_until_available(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate)
        }
    }
}

/// Shared rate limiter state
#[derive(Debug)]
pub struct RateLimiterState {
    limiters: Mutex<HashMap<RateLimitType, TokenBucket>>,
}

impl RateLimiterState {
    pub fn new(api_rate: u32, quote_rate: u32) -> Self {
        let mut limiters = HashMap::new();
        limiters.insert(RateLimitType::General, TokenBucket::new(api_rate));
        limiters.insert(RateLimitType::Quote, TokenBucket::new(quote_rate));

        Self {
            limiters: Mutex::new(limiters),
        }
    }

    /// Try to acquire a token; on refusal returns how long to wait
    pub fn try_acquire(&self, rate_type: RateLimitType) -> Result<(), Duration> {
        let mut limiters = self.limiters.lock();
        match limiters.get_mut(&rate_type) {
            Some(limiter) => {
                if !limiter.try_acquire() {
                    Err(limiter.time_until_available())
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }
}

/// Determine rate limit type based on request path
pub fn get_rate_limit_type(path: &str) -> RateLimitType {
    if path.starts_with("/api/stocks") || path.starts_with("/ws/") {
        RateLimitType::Quote
    } else {
        RateLimitType::General
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let rate_type = get_rate_limit_type(&path);

    if let Err(wait_time) = state.try_acquire(rate_type) {
        tracing::warn!(
            "Rate limit exceeded for {:?}, path: {}, retry after {}ms",
            rate_type,
            path,
            wait_time.as_millis()
        );
        return rate_limit_response(wait_time, rate_type);
    }

    next.run(request).await
}

fn rate_limit_response(retry_after: Duration, rate_type: RateLimitType) -> Response {
    let retry_seconds = (retry_after.as_secs_f64().ceil() as u64).max(1);

    let body = Json(json!({
        "status": "error",
        "code": "RATE_LIMIT_EXCEEDED",
        "message": format!(
            "Rate limit exceeded for {} requests. Please retry after {} seconds.",
            rate_type.label(),
            retry_seconds
        ),
        "retry_after_ms": retry_after.as_millis() as u64,
    }));

    let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    let headers = response.headers_mut();
    headers.insert("Retry-After", HeaderValue::from(retry_seconds));
    headers.insert("X-RateLimit-Type", HeaderValue::from_static(rate_type.label()));

    response
}
