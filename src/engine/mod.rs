//! Metrics engine: the three public operations over a pluggable store

pub mod builder;
pub mod request;
pub mod traits;

pub use builder::{EngineStats, MetricsEngine, MetricsEngineBuilder};
pub use request::{
    GetMetricStatisticsRequest, MetricDatumInput, PutMetricDataOutcome, PutMetricDataRequest,
};
pub use traits::MetricStore;
