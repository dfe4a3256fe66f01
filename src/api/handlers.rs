//! HTTP handlers
//!
//! Engine errors are rendered as `{"error": {"code", "message"}}` with 400
//! for client errors and 500 for everything else.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, error};

use super::types::*;
use super::AppState;
use crate::catalog::ListMetricsFilter;
use crate::engine::EngineStats;
use crate::error::Error;
use crate::metrics::gather_metrics;

// =============================================================================
// Errors
// =============================================================================

/// An engine error on its way to the client
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            debug!(error = %self.0, "Request rejected");
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self.0, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.0.code().to_string(),
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// =============================================================================
// Health & Stats Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Engine statistics
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<EngineStats> {
    Json(state.engine.stats())
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    if !state.metrics_enabled {
        return (StatusCode::NOT_FOUND, "metrics disabled").into_response();
    }

    match gather_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to gather metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

// =============================================================================
// Metric Handlers
// =============================================================================

/// PutMetricData
pub async fn put_metric_data(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<PutMetricDataBody>, JsonRejection>,
) -> ApiResult<PutMetricDataResponse> {
    let Json(body) = body.map_err(|e| Error::invalid_input(e.body_text()))?;
    let outcome = state.engine.put_metric_data(body.into_request()?)?;

    Ok(Json(PutMetricDataResponse {
        datums_accepted: outcome.datums_accepted,
    }))
}

/// GetMetricStatistics
pub async fn get_metric_statistics(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<GetMetricStatisticsBody>, JsonRejection>,
) -> ApiResult<GetMetricStatisticsResponse> {
    let Json(body) = body.map_err(|e| Error::invalid_query(e.body_text()))?;
    let request = body.into_request()?;
    let label = request.metric_name.clone();
    let datapoints = state.engine.get_metric_statistics(request)?;

    Ok(Json(GetMetricStatisticsResponse { label, datapoints }))
}

/// ListMetrics
pub async fn list_metrics(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ListMetricsFilter>, JsonRejection>,
) -> ApiResult<ListMetricsResponse> {
    let Json(filter) = body.map_err(|e| Error::invalid_query(e.body_text()))?;
    let metrics = state
        .engine
        .list_metrics(&filter)
        .into_iter()
        .map(MetricSummary::from)
        .collect();

    Ok(Json(ListMetricsResponse { metrics }))
}
