//! Request and response bodies of the HTTP API
//!
//! Field names are camelCase. Timestamps are accepted as epoch
//! milliseconds, RFC 3339 strings or plain `YYYY-MM-DD` dates (midnight UTC).

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::engine::{GetMetricStatisticsRequest, MetricDatumInput, PutMetricDataRequest};
use crate::error::{Error, Result};
use crate::types::{Datapoint, Dimension, MetricIdentity, StandardUnit, StatisticSet};

// =============================================================================
// Timestamps
// =============================================================================

/// A timestamp as written by a client
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TimestampInput {
    /// Unix milliseconds
    Millis(i64),
    /// RFC 3339, `YYYY-MM-DD`, or a numeric string of milliseconds
    Text(String),
}

impl TimestampInput {
    /// Resolve to Unix milliseconds
    pub fn to_millis(&self) -> std::result::Result<i64, String> {
        match self {
            TimestampInput::Millis(ms) => Ok(*ms),
            TimestampInput::Text(raw) => parse_timestamp(raw),
        }
    }
}

/// Parse a textual timestamp into Unix milliseconds
pub fn parse_timestamp(raw: &str) -> std::result::Result<i64, String> {
    let raw = raw.trim();

    if let Ok(ms) = raw.parse::<i64>() {
        return Ok(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp_millis());
        }
    }

    Err(format!("Unrecognized timestamp '{}'", raw))
}

// =============================================================================
// PutMetricData
// =============================================================================

/// Body of `POST /api/v1/metrics/put`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PutMetricDataBody {
    /// Namespace of every datum
    pub namespace: String,
    /// Datums to ingest
    #[serde(default)]
    pub metric_data: Vec<MetricDatumBody>,
}

/// One datum in a put body
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDatumBody {
    /// Metric name
    pub metric_name: String,
    /// Qualifying dimensions
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    /// Defaults to the time of receipt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<TimestampInput>,
    /// A single raw value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// A pre-aggregated statistic set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistic_values: Option<StatisticSet>,
    /// Raw values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
    /// Repeat counts for `values`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<Vec<f64>>,
    /// Unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<StandardUnit>,
}

impl PutMetricDataBody {
    /// Convert into an engine request
    pub fn into_request(self) -> Result<PutMetricDataRequest> {
        let metric_data = self
            .metric_data
            .into_iter()
            .map(|d| {
                let timestamp = d
                    .timestamp
                    .as_ref()
                    .map(TimestampInput::to_millis)
                    .transpose()
                    .map_err(Error::invalid_input)?;
                Ok(MetricDatumInput {
                    metric_name: d.metric_name,
                    dimensions: d.dimensions,
                    timestamp,
                    value: d.value,
                    statistic_set: d.statistic_values,
                    values: d.values,
                    counts: d.counts,
                    unit: d.unit,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PutMetricDataRequest::new(self.namespace, metric_data))
    }
}

/// Response of a successful put
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PutMetricDataResponse {
    /// Datums stored
    pub datums_accepted: usize,
}

// =============================================================================
// GetMetricStatistics
// =============================================================================

/// Body of `POST /api/v1/metrics/statistics`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMetricStatisticsBody {
    /// Namespace
    pub namespace: String,
    /// Metric name
    pub metric_name: String,
    /// Dimensions to match
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    /// Window start, inclusive
    pub start_time: TimestampInput,
    /// Window end, exclusive
    pub end_time: TimestampInput,
    /// Bucket width in seconds
    pub period: i64,
    /// Standard statistics
    #[serde(default)]
    pub statistics: Vec<String>,
    /// Percentiles
    #[serde(default)]
    pub extended_statistics: Vec<String>,
    /// Only datums in this unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<StandardUnit>,
}

impl GetMetricStatisticsBody {
    /// Convert into an engine request
    pub fn into_request(self) -> Result<GetMetricStatisticsRequest> {
        let start_time = self.start_time.to_millis().map_err(Error::invalid_query)?;
        let end_time = self.end_time.to_millis().map_err(Error::invalid_query)?;

        Ok(GetMetricStatisticsRequest {
            namespace: self.namespace,
            metric_name: self.metric_name,
            dimensions: self.dimensions,
            start_time,
            end_time,
            period: self.period,
            statistics: self.statistics,
            extended_statistics: self.extended_statistics,
            unit: self.unit,
        })
    }
}

/// Response of a statistics query
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMetricStatisticsResponse {
    /// The metric name queried
    pub label: String,
    /// One entry per reported bucket, by time
    pub datapoints: Vec<Datapoint>,
}

// =============================================================================
// ListMetrics
// =============================================================================

/// A metric identity in a list response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    /// Namespace
    pub namespace: String,
    /// Metric name
    pub metric_name: String,
    /// Dimensions, sorted by name
    pub dimensions: Vec<Dimension>,
}

impl From<MetricIdentity> for MetricSummary {
    fn from(identity: MetricIdentity) -> Self {
        Self {
            dimensions: identity.dimensions.to_dimensions(),
            namespace: identity.namespace,
            metric_name: identity.metric_name,
        }
    }
}

/// Response of `POST /api/v1/metrics/list`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListMetricsResponse {
    /// Matching metrics
    pub metrics: Vec<MetricSummary>,
}

// =============================================================================
// Health & Errors
// =============================================================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while serving
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Error body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error code and message
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorDetail {
    /// `InvalidInput`, `InvalidQuery`, ...
    pub code: String,
    /// Human readable cause
    pub message: String,
}
