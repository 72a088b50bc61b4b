//! Fixed-window request rate limiting.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// Requests allowed per key and window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub limit: u32,
    pub period: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            period: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

pub trait RateLimiter: Send + Sync {
    /// Count one request for `key` and decide whether it may proceed.
    fn check(&self, key: &str) -> RateDecision;
}

/// Lets every request through.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRateLimit;

impl RateLimiter for NoRateLimit {
    fn check(&self, _key: &str) -> RateDecision {
        RateDecision::Allowed {
            remaining: u32::MAX,
        }
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// In-process fixed-window counter per key.
#[derive(Debug)]
pub struct MemoryRateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Drop expired windows so idle keys do not accumulate.
        let period = self.config.period;
        windows.retain(|_, w| now.duration_since(w.started) < period);

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if window.count >= self.config.limit {
            let elapsed = now.duration_since(window.started);
            return RateDecision::Limited {
                retry_after: period.saturating_sub(elapsed),
            };
        }

        window.count += 1;
        RateDecision::Allowed {
            remaining: self.config.limit - window.count,
        }
    }
}

impl RateLimiter for MemoryRateLimiter {
    fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }
}

/// Middleware gate keyed on client address and path.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let key = format!("{}:{}", client_key(req.headers()), req.uri().path());

    match state.rate_limiter.check(&key) {
        RateDecision::Allowed { .. } => next.run(req).await,
        RateDecision::Limited { retry_after } => {
            tracing::info!("Rate limited {}", key);
            ApiError::RateLimited { retry_after }.into_response()
        }
    }
}

fn client_key(headers: &axum::http::HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}
