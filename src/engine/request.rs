//! Request and response shapes of the three engine operations

use serde::Serialize;

use crate::types::{Dimension, StandardUnit, StatisticSet};

// =============================================================================
// PutMetricData
// =============================================================================

/// One datum as submitted by a caller, before normalization
///
/// Exactly one of `value`, `statistic_set` or `values` (with optional
/// `counts`) must be set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricDatumInput {
    /// Metric name
    pub metric_name: String,
    /// Dimensions qualifying the metric
    pub dimensions: Vec<Dimension>,
    /// Unix milliseconds; the current time when absent
    pub timestamp: Option<i64>,
    /// A single raw value
    pub value: Option<f64>,
    /// A pre-aggregated statistic set
    pub statistic_set: Option<StatisticSet>,
    /// Raw values observed in the same period
    pub values: Option<Vec<f64>>,
    /// How often each of `values` was observed
    pub counts: Option<Vec<f64>>,
    /// Unit; `None` when absent
    pub unit: Option<StandardUnit>,
}

impl MetricDatumInput {
    /// A raw value datum
    pub fn value(metric_name: impl Into<String>, value: f64) -> Self {
        Self {
            metric_name: metric_name.into(),
            value: Some(value),
            ..Self::default()
        }
    }

    /// A statistic set datum
    pub fn statistic_set(metric_name: impl Into<String>, set: StatisticSet) -> Self {
        Self {
            metric_name: metric_name.into(),
            statistic_set: Some(set),
            ..Self::default()
        }
    }

    /// A values/counts datum
    pub fn values(
        metric_name: impl Into<String>,
        values: Vec<f64>,
        counts: Option<Vec<f64>>,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            values: Some(values),
            counts,
            ..Self::default()
        }
    }

    /// Add a dimension
    pub fn with_dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.push(Dimension::new(name, value));
        self
    }

    /// Set the timestamp (Unix milliseconds)
    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the unit
    pub fn with_unit(mut self, unit: StandardUnit) -> Self {
        self.unit = Some(unit);
        self
    }
}

/// A batch of datums for one namespace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutMetricDataRequest {
    /// Namespace of every datum in the batch
    pub namespace: String,
    /// Datums to ingest
    pub metric_data: Vec<MetricDatumInput>,
}

impl PutMetricDataRequest {
    /// Create a request
    pub fn new(namespace: impl Into<String>, metric_data: Vec<MetricDatumInput>) -> Self {
        Self {
            namespace: namespace.into(),
            metric_data,
        }
    }
}

/// Result of an accepted put
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PutMetricDataOutcome {
    /// Datums stored
    pub datums_accepted: usize,
    /// Identities seen for the first time
    pub new_metrics: usize,
}

// =============================================================================
// GetMetricStatistics
// =============================================================================

/// A statistics query over one metric
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetMetricStatisticsRequest {
    /// Namespace
    pub namespace: String,
    /// Metric name
    pub metric_name: String,
    /// Dimensions to match
    pub dimensions: Vec<Dimension>,
    /// Window start, inclusive, Unix milliseconds
    pub start_time: i64,
    /// Window end, exclusive, Unix milliseconds
    pub end_time: i64,
    /// Bucket width in seconds
    pub period: i64,
    /// Standard statistic names
    pub statistics: Vec<String>,
    /// Percentile names such as `p99`
    pub extended_statistics: Vec<String>,
    /// Only datums recorded in this unit
    pub unit: Option<StandardUnit>,
}

impl GetMetricStatisticsRequest {
    /// Query `metric_name` over `[start_time, end_time)` in `period`-second buckets
    pub fn new(
        namespace: impl Into<String>,
        metric_name: impl Into<String>,
        start_time: i64,
        end_time: i64,
        period: i64,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            metric_name: metric_name.into(),
            start_time,
            end_time,
            period,
            ..Self::default()
        }
    }

    /// Add a dimension to match
    pub fn with_dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.push(Dimension::new(name, value));
        self
    }

    /// Request standard statistics
    pub fn with_statistics<I, S>(mut self, statistics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statistics.extend(statistics.into_iter().map(Into::into));
        self
    }

    /// Request percentiles
    pub fn with_extended_statistics<I, S>(mut self, percentiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extended_statistics
            .extend(percentiles.into_iter().map(Into::into));
        self
    }

    /// Restrict to a unit
    pub fn with_unit(mut self, unit: StandardUnit) -> Self {
        self.unit = Some(unit);
        self
    }
}
