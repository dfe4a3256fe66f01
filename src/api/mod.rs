//! HTTP API
//!
//! An axum router exposing the engine operations as JSON endpoints.
//!
//! # Endpoints
//!
//! - `POST /api/v1/metrics/put` - PutMetricData
//! - `POST /api/v1/metrics/statistics` - GetMetricStatistics
//! - `POST /api/v1/metrics/list` - ListMetrics
//! - `GET /api/v1/stats` - Store, catalog and aggregator counters
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics

pub mod handlers;
pub mod types;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::engine::MetricsEngine;

pub use handlers::ApiError;

// =============================================================================
// Application State
// =============================================================================

/// Shared state of every handler
pub struct AppState {
    /// The engine serving all operations
    pub engine: Arc<MetricsEngine>,
    /// Serve `/metrics`
    pub metrics_enabled: bool,
}

impl AppState {
    /// State around an engine, with metrics enabled
    pub fn new(engine: Arc<MetricsEngine>) -> Self {
        Self {
            engine,
            metrics_enabled: true,
        }
    }
}

// =============================================================================
// Router
// =============================================================================

/// Build CORS layer from configuration
pub fn build_cors_layer(cors_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if cors_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        // Metric operations
        .route("/api/v1/metrics/put", post(handlers::put_metric_data))
        .route(
            "/api/v1/metrics/statistics",
            post(handlers::get_metric_statistics),
        )
        .route("/api/v1/metrics/list", post(handlers::list_metrics))
        // Stats
        .route("/api/v1/stats", get(handlers::get_stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
}
