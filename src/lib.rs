//! Kuba Metrics - metric ingestion and statistics query engine
//!
//! This library accepts timestamped, dimensioned metric data (raw values,
//! pre-aggregated statistic sets or values/counts arrays) and answers
//! statistical range queries bucketed by period:
//! - `PutMetricData`: validate, normalize and store a batch of datums
//! - `GetMetricStatistics`: minimum, maximum, sum, sample count, average
//!   or percentiles per period bucket
//! - `ListMetrics`: distinct metrics ever observed
//!
//! # Example
//!
//! ```rust
//! use kuba_metrics::{GetMetricStatisticsRequest, MetricDatumInput, MetricsEngine, PutMetricDataRequest};
//!
//! let engine = MetricsEngine::in_memory();
//! engine.put_metric_data(PutMetricDataRequest::new(
//!     "Acme/Web",
//!     vec![MetricDatumInput::value("Latency", 120.0).at(1_000)],
//! )).unwrap();
//!
//! let points = engine.get_metric_statistics(
//!     GetMetricStatisticsRequest::new("Acme/Web", "Latency", 0, 60_000, 60)
//!         .with_statistics(["Average", "Maximum"]),
//! ).unwrap();
//! assert_eq!(points[0].maximum, Some(120.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod normalize;
pub mod storage;
pub mod types;

/// Prometheus metrics and telemetry
pub mod metrics;

/// Configuration management with TOML support
pub mod config;

/// Period bucketing and statistic computation
pub mod aggregation;

/// Registry of observed metric identities
pub mod catalog;

/// Engine facade and pluggable store trait
pub mod engine;

/// JSON HTTP API over the engine
pub mod api;

// Re-export main types
pub use catalog::{DimensionFilter, ListMetricsFilter, MetricCatalog};
pub use config::{Config, EngineConfig};
pub use engine::{
    GetMetricStatisticsRequest, MetricDatumInput, MetricsEngine, MetricsEngineBuilder,
    PutMetricDataOutcome, PutMetricDataRequest,
};
pub use error::{Error, Result};
pub use types::{
    Datapoint, Dimension, DimensionSet, MetricDatum, MetricIdentity, StandardUnit, Statistic,
    StatisticSet, TimeRange,
};
