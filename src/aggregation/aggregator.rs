//! Period aggregation of datums into datapoints

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::selection::StatisticsSelection;
use super::state::AggregateState;
use super::window::PeriodBuckets;
use crate::error::{Error, Result};
use crate::types::{Datapoint, MetricDatum, Statistic, TimeRange};

/// Default limit on buckets a single query may span
pub const DEFAULT_MAX_BUCKETS: u64 = 1440;

/// What to emit for buckets holding no datums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyBucketPolicy {
    /// Skip empty buckets
    #[default]
    Omit,
    /// Emit a datapoint with zero-valued statistics
    ZeroFill,
}

/// Aggregator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Empty bucket handling
    pub empty_buckets: EmptyBucketPolicy,
    /// Maximum number of buckets per query
    pub max_buckets: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            empty_buckets: EmptyBucketPolicy::default(),
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }
}

// ============================================================================
// Aggregator Statistics
// ============================================================================

/// Running counters of aggregation work
#[derive(Debug, Default)]
pub struct AggregatorStats {
    /// Total queries aggregated
    pub queries: AtomicU64,

    /// Total datums folded into buckets
    pub datums_processed: AtomicU64,

    /// Total datapoints emitted
    pub buckets_emitted: AtomicU64,

    /// Queries that produced no datapoints
    pub empty_results: AtomicU64,
}

impl AggregatorStats {
    /// Get a snapshot of current statistics
    pub fn snapshot(&self) -> AggregatorStatsSnapshot {
        AggregatorStatsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            datums_processed: self.datums_processed.load(Ordering::Relaxed),
            buckets_emitted: self.buckets_emitted.load(Ordering::Relaxed),
            empty_results: self.empty_results.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of aggregator statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AggregatorStatsSnapshot {
    /// Total queries aggregated
    pub queries: u64,
    /// Total datums folded into buckets
    pub datums_processed: u64,
    /// Total datapoints emitted
    pub buckets_emitted: u64,
    /// Empty result count
    pub empty_results: u64,
}

// ============================================================================
// Aggregator
// ============================================================================

/// Buckets datums by period and computes the requested statistics
///
/// # Example
///
/// ```rust
/// use kuba_metrics::aggregation::{Aggregator, StatisticsSelection};
/// use kuba_metrics::types::*;
///
/// let id = MetricIdentity::new("NS", "Latency", DimensionSet::new());
/// let datums: Vec<MetricDatum> = [5.0, 7.0]
///     .iter()
///     .enumerate()
///     .map(|(i, v)| MetricDatum {
///         identity: id.clone(),
///         timestamp: i as i64 * 1_000,
///         unit: StandardUnit::Milliseconds,
///         aggregate: StatisticSet::from_value(*v),
///     })
///     .collect();
///
/// let aggregator = Aggregator::default();
/// let selection = StatisticsSelection::standard([Statistic::Sum]);
/// let points = aggregator
///     .aggregate(&datums, &TimeRange::new(0, 60_000), 60, &selection)
///     .unwrap();
/// assert_eq!(points.len(), 1);
/// assert_eq!(points[0].sum, Some(12.0));
/// ```
#[derive(Debug, Default)]
pub struct Aggregator {
    config: AggregatorConfig,
    stats: AggregatorStats,
}

impl Aggregator {
    /// Create an aggregator with the given settings
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            stats: AggregatorStats::default(),
        }
    }

    /// Current settings
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Aggregation counters
    pub fn stats(&self) -> AggregatorStatsSnapshot {
        self.stats.snapshot()
    }

    /// Check a query's period and bucket count without aggregating
    pub fn plan(&self, range: &TimeRange, period_seconds: i64) -> Result<PeriodBuckets> {
        let buckets = PeriodBuckets::new(*range, period_seconds)?;
        let count = buckets.count();
        if count > self.config.max_buckets {
            return Err(Error::invalid_query(format!(
                "Query spans {} periods, the limit is {}; use a larger period or a shorter range",
                count, self.config.max_buckets
            )));
        }
        Ok(buckets)
    }

    /// Aggregate `datums` into one datapoint per period bucket
    ///
    /// Datums outside `range` are ignored. The output is sorted by bucket
    /// start and carries only the statistics in `selection`.
    pub fn aggregate(
        &self,
        datums: &[MetricDatum],
        range: &TimeRange,
        period_seconds: i64,
        selection: &StatisticsSelection,
    ) -> Result<Vec<Datapoint>> {
        let buckets = self.plan(range, period_seconds)?;
        self.stats.queries.fetch_add(1, Ordering::Relaxed);

        if range.is_empty() {
            self.stats.empty_results.fetch_add(1, Ordering::Relaxed);
            return Ok(Vec::new());
        }

        let needs_samples = selection.needs_samples();
        let mut states: BTreeMap<u64, AggregateState> = BTreeMap::new();
        let mut processed = 0u64;

        for datum in datums {
            let Some(idx) = buckets.index_of(datum.timestamp) else {
                continue;
            };
            states
                .entry(idx)
                .or_insert_with(|| {
                    if needs_samples {
                        AggregateState::with_samples()
                    } else {
                        AggregateState::new()
                    }
                })
                .add(&datum.aggregate, datum.unit);
            processed += 1;
        }
        self.stats
            .datums_processed
            .fetch_add(processed, Ordering::Relaxed);

        let datapoints: Vec<Datapoint> = match self.config.empty_buckets {
            EmptyBucketPolicy::Omit => states
                .iter()
                .map(|(idx, state)| Self::finalize(buckets.start_of(*idx), state, selection))
                .collect(),
            EmptyBucketPolicy::ZeroFill => (0..buckets.count())
                .map(|idx| match states.get(&idx) {
                    Some(state) => Self::finalize(buckets.start_of(idx), state, selection),
                    None => Self::zero(buckets.start_of(idx), selection),
                })
                .collect(),
        };

        if datapoints.is_empty() {
            self.stats.empty_results.fetch_add(1, Ordering::Relaxed);
        }
        self.stats
            .buckets_emitted
            .fetch_add(datapoints.len() as u64, Ordering::Relaxed);

        Ok(datapoints)
    }

    fn finalize(
        timestamp: i64,
        state: &AggregateState,
        selection: &StatisticsSelection,
    ) -> Datapoint {
        let mut point = Datapoint {
            timestamp,
            unit: state.unit().unwrap_or_default(),
            ..Datapoint::default()
        };

        match selection {
            StatisticsSelection::Standard(statistics) => {
                for statistic in statistics {
                    set_statistic(&mut point, *statistic, state.finalize(*statistic));
                }
            }
            StatisticsSelection::Extended(percentiles) => {
                for p in percentiles {
                    if let Some(value) = state.percentile(p.rank()) {
                        point.extended_statistics.insert(p.label().to_string(), value);
                    }
                }
            }
        }
        point
    }

    fn zero(timestamp: i64, selection: &StatisticsSelection) -> Datapoint {
        let mut point = Datapoint {
            timestamp,
            ..Datapoint::default()
        };
        if let StatisticsSelection::Standard(statistics) = selection {
            for statistic in statistics {
                set_statistic(&mut point, *statistic, Some(0.0));
            }
        }
        point
    }
}

fn set_statistic(point: &mut Datapoint, statistic: Statistic, value: Option<f64>) {
    match statistic {
        Statistic::SampleCount => point.sample_count = value,
        Statistic::Average => point.average = value,
        Statistic::Sum => point.sum = value,
        Statistic::Minimum => point.minimum = value,
        Statistic::Maximum => point.maximum = value,
    }
}
