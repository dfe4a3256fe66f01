//! Aggregation Engine
//!
//! Turns the datums a query selected into per-period datapoints.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │      Datums from the Metric Store   │
//! │  any order, any number of series    │
//! └─────────────────────────────────────┘
//!                  ↓
//! ┌─────────────────────────────────────┐
//! │          Period Buckets             │
//! │  [start, start+period), ... , end   │
//! └─────────────────────────────────────┘
//!                  ↓
//! ┌─────────────────────────────────────┐
//! │        Aggregate State              │
//! │  min/max/sum/count (+ samples)      │
//! └─────────────────────────────────────┘
//!                  ↓
//! ┌─────────────────────────────────────┐
//! │           Datapoints                │
//! │  requested statistics, by time      │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Key Components
//!
//! - [`PeriodBuckets`]: partition of the query window into fixed periods
//! - [`AggregateState`]: associative combination of statistic sets
//! - [`StatisticsSelection`]: standard statistics or percentiles, never both
//! - [`Aggregator`]: drives the above and tracks [`AggregatorStats`]

pub mod aggregator;
pub mod selection;
pub mod state;
pub mod window;

pub use aggregator::{
    Aggregator, AggregatorConfig, AggregatorStats, AggregatorStatsSnapshot, EmptyBucketPolicy,
    DEFAULT_MAX_BUCKETS,
};
pub use selection::{StatisticsSelection, MAX_STATISTICS_PER_QUERY};
pub use state::AggregateState;
pub use window::{BucketIter, PeriodBuckets};
