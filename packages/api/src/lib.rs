//! HTTP surface of the task system.
//!
//! - `/health`: liveness and broker state
//! - `/api/v1/tasks/...`: submit the document task and poll its status
//! - `/api/v1/search`, `/docs`, `/doc/{n}` and the stats routes: corpus views
//!   over the search engine

mod config;
mod error;
pub mod rate_limit;
mod routes;
mod state;
mod view;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

pub use config::{ApiConfig, ConfigError, DEFAULT_BIND};
pub use error::{ApiError, json_error};
pub use rate_limit::{MemoryRateLimiter, NoRateLimit, RateDecision, RateLimitConfig, RateLimiter};
pub use state::AppState;
pub use view::JobView;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .nest("/api/v1", routes::api_router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
