//! HTTP error responses.

use std::time::Duration;

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors answered by the API.
///
/// Messages are short and fixed; the cause is logged where the error is
/// raised.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Queue is not available")]
    QueueUnavailable,
    #[error("Failed to create task")]
    TaskCreation,
    #[error("Failed to read task")]
    TaskLookup,
    #[error("Search is not available")]
    SearchUnavailable,
    #[error("Search engine request failed")]
    SearchFailed,
    #[error("Too many requests")]
    RateLimited { retry_after: Duration },
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::QueueUnavailable | ApiError::SearchUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            ApiError::TaskCreation | ApiError::TaskLookup => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
            ApiError::SearchFailed => (StatusCode::BAD_GATEWAY, "search_error"),
            ApiError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let mut response = json_error(status, code, self.to_string());
        if let ApiError::RateLimited { retry_after } = self
            && let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
