//! Metrics engine with a pluggable store
//!
//! [`MetricsEngine`] ties the normalizer, the store, the aggregator and the
//! catalog together behind the three public operations.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::request::{
    GetMetricStatisticsRequest, MetricDatumInput, PutMetricDataOutcome, PutMetricDataRequest,
};
use super::traits::MetricStore;
use crate::aggregation::{
    Aggregator, AggregatorConfig, AggregatorStatsSnapshot, StatisticsSelection,
};
use crate::catalog::{ListMetricsFilter, MetricCatalog};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::metrics;
use crate::normalize::{normalize, normalize_values};
use crate::storage::{snapshot, InMemoryMetricStore, MetricFilter, StoreStats};
use crate::types::{
    now_millis, Datapoint, DimensionSet, MetricDatum, MetricIdentity, StandardUnit, TimeRange,
};

/// Builder for configuring the engine with a custom store
#[derive(Default)]
pub struct MetricsEngineBuilder {
    store: Option<Arc<dyn MetricStore>>,
    config: EngineConfig,
}

impl MetricsEngineBuilder {
    /// Create a new engine builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom store implementation
    pub fn with_store<S>(mut self, store: S) -> Self
    where
        S: MetricStore,
    {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set a custom store from an existing Arc
    pub fn with_store_arc(mut self, store: Arc<dyn MetricStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set engine configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine
    ///
    /// Without a custom store an [`InMemoryMetricStore`] is created using
    /// the configured dimension match mode.
    pub fn build(self) -> Result<MetricsEngine> {
        self.config.validate()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryMetricStore::new(self.config.dimension_match)));

        let aggregator = Aggregator::new(AggregatorConfig {
            empty_buckets: self.config.empty_buckets,
            max_buckets: self.config.max_buckets_per_query,
        });

        debug!(store = store.store_id(), "Metrics engine built");

        Ok(MetricsEngine {
            store,
            catalog: MetricCatalog::new(),
            aggregator,
            config: self.config,
        })
    }
}

/// Ingestion and query engine
///
/// Safe to share across threads behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use kuba_metrics::engine::{GetMetricStatisticsRequest, MetricDatumInput, MetricsEngine, PutMetricDataRequest};
/// use kuba_metrics::catalog::ListMetricsFilter;
///
/// let engine = MetricsEngine::in_memory();
/// engine.put_metric_data(PutMetricDataRequest::new(
///     "SITE/TRAFFIC",
///     vec![MetricDatumInput::value("PAGES_VISITED", 3.0).with_dimension("PAGE", "/").at(60_000)],
/// )).unwrap();
///
/// let points = engine.get_metric_statistics(
///     GetMetricStatisticsRequest::new("SITE/TRAFFIC", "PAGES_VISITED", 0, 3_600_000, 3600)
///         .with_dimension("PAGE", "/")
///         .with_statistics(["Sum"]),
/// ).unwrap();
/// assert_eq!(points[0].sum, Some(3.0));
/// assert_eq!(engine.list_metrics(&ListMetricsFilter::all()).len(), 1);
/// ```
pub struct MetricsEngine {
    store: Arc<dyn MetricStore>,
    catalog: MetricCatalog,
    aggregator: Aggregator,
    config: EngineConfig,
}

impl MetricsEngine {
    /// Engine with the default in-memory store and configuration
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemoryMetricStore::default()),
            catalog: MetricCatalog::new(),
            aggregator: Aggregator::default(),
            config: EngineConfig::default(),
        }
    }

    /// Start building an engine
    pub fn builder() -> MetricsEngineBuilder {
        MetricsEngineBuilder::new()
    }

    /// Get reference to the store
    pub fn store(&self) -> &Arc<dyn MetricStore> {
        &self.store
    }

    /// Get reference to the catalog
    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Get engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // PutMetricData
    // =========================================================================

    /// Validate, normalize and store a batch of datums
    ///
    /// All datums are validated before any is stored; a rejected request
    /// leaves the store and catalog unchanged.
    pub fn put_metric_data(&self, request: PutMetricDataRequest) -> Result<PutMetricDataOutcome> {
        let result = self.put_inner(request);
        match &result {
            Ok(outcome) => metrics::record_put(outcome.datums_accepted, true),
            Err(e) => {
                metrics::record_put(0, false);
                debug!(error = %e, "PutMetricData rejected");
            }
        }
        result
    }

    fn put_inner(&self, request: PutMetricDataRequest) -> Result<PutMetricDataOutcome> {
        let PutMetricDataRequest {
            namespace,
            metric_data,
        } = request;

        if metric_data.is_empty() {
            return Err(Error::invalid_input("MetricData must contain at least one datum"));
        }
        if metric_data.len() > self.config.max_datums_per_put {
            return Err(Error::invalid_input(format!(
                "MetricData has {} datums, the limit is {}",
                metric_data.len(),
                self.config.max_datums_per_put
            )));
        }

        let now = now_millis();
        let datums = metric_data
            .into_iter()
            .map(|input| to_datum(&namespace, input, now))
            .collect::<Result<Vec<_>>>()?;

        // Validation done, nothing below rejects a datum
        let identities: Vec<MetricIdentity> = datums.iter().map(|d| d.identity.clone()).collect();
        let accepted = datums.len();
        self.store.put_batch(datums)?;

        let new_metrics = identities
            .iter()
            .filter(|id| self.catalog.register(id))
            .count();
        self.refresh_gauges();

        debug!(
            namespace = %namespace,
            datums = accepted,
            new_metrics = new_metrics,
            "PutMetricData accepted"
        );

        Ok(PutMetricDataOutcome {
            datums_accepted: accepted,
            new_metrics,
        })
    }

    // =========================================================================
    // GetMetricStatistics
    // =========================================================================

    /// Aggregate one metric's datums into per-period datapoints
    pub fn get_metric_statistics(
        &self,
        request: GetMetricStatisticsRequest,
    ) -> Result<Vec<Datapoint>> {
        let started = Instant::now();
        let result = self.statistics_inner(request);
        metrics::record_query(
            "get_metric_statistics",
            started.elapsed().as_secs_f64(),
            result.is_ok(),
        );
        result
    }

    fn statistics_inner(&self, request: GetMetricStatisticsRequest) -> Result<Vec<Datapoint>> {
        let selection = StatisticsSelection::from_lists(
            request.statistics.as_slice(),
            request.extended_statistics.as_slice(),
        )?;

        let dimensions = DimensionSet::from_dimensions(request.dimensions)
            .map_err(|e| Error::invalid_query(e.to_string()))?;
        let identity = MetricIdentity::new(request.namespace, request.metric_name, dimensions);
        identity
            .validate()
            .map_err(|e| Error::invalid_query(e.to_string()))?;

        let range = TimeRange::new(request.start_time, request.end_time);

        // Reject a bad period or bucket count before touching the store
        self.aggregator.plan(&range, request.period)?;

        let mut filter = MetricFilter::new(identity);
        if let Some(unit) = request.unit {
            filter = filter.with_unit(unit);
        }

        let datums = self.store.query(&filter, &range)?;
        let points = self
            .aggregator
            .aggregate(&datums, &range, request.period, &selection)?;

        debug!(
            metric = %filter.identity,
            datums = datums.len(),
            datapoints = points.len(),
            "GetMetricStatistics"
        );
        Ok(points)
    }

    // =========================================================================
    // ListMetrics
    // =========================================================================

    /// Distinct identities matching `filter`
    pub fn list_metrics(&self, filter: &ListMetricsFilter) -> Vec<MetricIdentity> {
        let started = Instant::now();
        let metrics = self.catalog.list(filter);
        metrics::record_query("list_metrics", started.elapsed().as_secs_f64(), true);
        metrics
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write every stored datum to a snapshot file
    pub fn save_snapshot(&self, path: &Path) -> Result<usize> {
        let datums = self.store.snapshot()?;
        snapshot::write_snapshot(path, datums)
    }

    /// Load datums from a snapshot file and re-register their identities
    ///
    /// Only valid at startup: a store that already holds datums is left
    /// untouched and `Configuration` is returned. A missing file loads
    /// nothing.
    pub fn load_snapshot(&self, path: &Path) -> Result<usize> {
        let held = self.store.stats().datum_count;
        if held > 0 {
            return Err(Error::Configuration(format!(
                "Cannot load snapshot {} into a store holding {} datums",
                path.display(),
                held
            )));
        }

        let datums = snapshot::read_snapshot(path)?;
        if datums.is_empty() {
            return Ok(0);
        }

        let identities: Vec<MetricIdentity> =
            datums.iter().map(|d| d.identity.clone()).collect();
        let restored = self.store.restore(datums)?;
        for identity in &identities {
            self.catalog.register(identity);
        }
        self.refresh_gauges();

        info!(
            path = %path.display(),
            datums = restored,
            metrics = self.catalog.len(),
            "Restored metrics snapshot"
        );
        Ok(restored)
    }

    // =========================================================================
    // Stats
    // =========================================================================

    /// Engine-wide counters
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            store_id: self.store.store_id().to_string(),
            store: self.store.stats(),
            catalog_metrics: self.catalog.len(),
            aggregator: self.aggregator.stats(),
        }
    }

    fn refresh_gauges(&self) {
        metrics::update_sizes(self.catalog.len(), self.store.stats().datum_count);
    }
}

/// Normalize one caller datum
fn to_datum(namespace: &str, input: MetricDatumInput, now: i64) -> Result<MetricDatum> {
    let MetricDatumInput {
        metric_name,
        dimensions,
        timestamp,
        value,
        statistic_set,
        values,
        counts,
        unit,
    } = input;

    let dimensions = DimensionSet::from_dimensions(dimensions)?;
    let identity = MetricIdentity::new(namespace, metric_name, dimensions);
    identity.validate()?;

    let timestamp = timestamp.unwrap_or(now);
    let unit = unit.unwrap_or(StandardUnit::None);

    match values {
        Some(values) => {
            if value.is_some() || statistic_set.is_some() {
                return Err(Error::invalid_input(format!(
                    "Datum for {} combines Values with Value or StatisticValues",
                    identity.metric_name
                )));
            }
            normalize_values(&values, counts.as_deref(), timestamp, identity, unit)
        }
        None => {
            if counts.is_some() {
                return Err(Error::invalid_input(format!(
                    "Datum for {} has Counts without Values",
                    identity.metric_name
                )));
            }
            normalize(value, statistic_set, timestamp, identity, unit)
        }
    }
}

/// Engine statistics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    /// Store backend identifier
    pub store_id: String,
    /// Store counters
    pub store: StoreStats,
    /// Distinct metrics in the catalog
    pub catalog_metrics: usize,
    /// Aggregation counters
    pub aggregator: AggregatorStatsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::EmptyBucketPolicy;
    use crate::storage::DimensionMatch;
    use crate::types::StatisticSet;

    fn put(engine: &MetricsEngine, data: Vec<MetricDatumInput>) -> Result<PutMetricDataOutcome> {
        engine.put_metric_data(PutMetricDataRequest::new("NS", data))
    }

    #[test]
    fn test_builder_defaults() {
        let engine = MetricsEngine::builder().build().unwrap();
        assert_eq!(engine.store().store_id(), "memory");
        assert_eq!(engine.config().max_datums_per_put, 1000);
    }

    #[test]
    fn test_builder_rejects_bad_config() {
        let config = EngineConfig {
            max_datums_per_put: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            MetricsEngine::builder().with_config(config).build(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_put_counts_new_metrics() {
        let engine = MetricsEngine::in_memory();
        let outcome = put(
            &engine,
            vec![
                MetricDatumInput::value("a", 1.0).at(1_000),
                MetricDatumInput::value("a", 2.0).at(2_000),
                MetricDatumInput::value("b", 3.0).at(1_000),
            ],
        )
        .unwrap();

        assert_eq!(outcome.datums_accepted, 3);
        assert_eq!(outcome.new_metrics, 2);
        assert_eq!(engine.stats().store.datum_count, 3);

        let again = put(&engine, vec![MetricDatumInput::value("a", 1.0).at(3_000)]).unwrap();
        assert_eq!(again.new_metrics, 0);
    }

    #[test]
    fn test_rejected_batch_stores_nothing() {
        let engine = MetricsEngine::in_memory();
        let err = put(
            &engine,
            vec![
                MetricDatumInput::value("ok", 1.0).at(1_000),
                MetricDatumInput::statistic_set("bad", StatisticSet::new(5.0, 1.0, 6.0, 2.0))
                    .at(1_000),
            ],
        )
        .unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(engine.stats().store.datum_count, 0);
        assert!(engine.list_metrics(&ListMetricsFilter::all()).is_empty());
    }

    #[test]
    fn test_put_validation() {
        let engine = MetricsEngine::builder()
            .with_config(EngineConfig {
                max_datums_per_put: 2,
                ..EngineConfig::default()
            })
            .build()
            .unwrap();

        assert!(put(&engine, vec![]).is_err());
        assert!(put(
            &engine,
            vec![
                MetricDatumInput::value("m", 1.0),
                MetricDatumInput::value("m", 1.0),
                MetricDatumInput::value("m", 1.0),
            ]
        )
        .is_err());

        // empty namespace
        assert!(engine
            .put_metric_data(PutMetricDataRequest::new(
                "",
                vec![MetricDatumInput::value("m", 1.0)]
            ))
            .is_err());

        // neither value nor statistic set
        let empty = MetricDatumInput {
            metric_name: "m".into(),
            ..Default::default()
        };
        assert!(put(&engine, vec![empty]).is_err());

        // counts without values
        let mut orphan = MetricDatumInput::value("m", 1.0);
        orphan.counts = Some(vec![1.0]);
        assert!(put(&engine, vec![orphan]).is_err());

        // values combined with a value
        let mut mixed = MetricDatumInput::values("m", vec![1.0], None);
        mixed.value = Some(1.0);
        assert!(put(&engine, vec![mixed]).is_err());
    }

    #[test]
    fn test_missing_timestamp_uses_now() {
        let engine = MetricsEngine::in_memory();
        let before = now_millis();
        put(&engine, vec![MetricDatumInput::value("m", 1.0)]).unwrap();
        let after = now_millis();

        let stored = engine.store().snapshot().unwrap();
        assert!(stored[0].timestamp >= before && stored[0].timestamp <= after);
    }

    #[test]
    fn test_values_counts_ingest() {
        let engine = MetricsEngine::in_memory();
        put(
            &engine,
            vec![MetricDatumInput::values("m", vec![1.0, 4.0], Some(vec![3.0, 1.0])).at(0)],
        )
        .unwrap();

        let points = engine
            .get_metric_statistics(
                GetMetricStatisticsRequest::new("NS", "m", 0, 60_000, 60)
                    .with_statistics(["Sum", "SampleCount", "Maximum"]),
            )
            .unwrap();
        assert_eq!(points[0].sum, Some(7.0));
        assert_eq!(points[0].sample_count, Some(4.0));
        assert_eq!(points[0].maximum, Some(4.0));
    }

    #[test]
    fn test_query_validation() {
        let engine = MetricsEngine::in_memory();
        let base = GetMetricStatisticsRequest::new("NS", "m", 0, 60_000, 60);

        let both = base.clone().with_statistics(["Sum"]).with_extended_statistics(["p99"]);
        assert!(matches!(engine.get_metric_statistics(both), Err(Error::InvalidQuery(_))));

        assert!(matches!(
            engine.get_metric_statistics(base.clone()),
            Err(Error::InvalidQuery(_))
        ));

        let mut bad_period = base.clone().with_statistics(["Sum"]);
        bad_period.period = 0;
        assert!(matches!(engine.get_metric_statistics(bad_period), Err(Error::InvalidQuery(_))));

        let mut too_many = base.clone().with_statistics(["Sum"]);
        too_many.end_time = 60_000 * 1441;
        assert!(matches!(engine.get_metric_statistics(too_many), Err(Error::InvalidQuery(_))));

        let bad_dims = base.with_statistics(["Sum"]).with_dimension("", "v");
        assert!(matches!(engine.get_metric_statistics(bad_dims), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_unit_filter() {
        let engine = MetricsEngine::in_memory();
        put(
            &engine,
            vec![
                MetricDatumInput::value("m", 1.0).at(0).with_unit(StandardUnit::Bytes),
                MetricDatumInput::value("m", 2.0).at(0).with_unit(StandardUnit::Count),
            ],
        )
        .unwrap();

        let points = engine
            .get_metric_statistics(
                GetMetricStatisticsRequest::new("NS", "m", 0, 60_000, 60)
                    .with_statistics(["Sum"])
                    .with_unit(StandardUnit::Bytes),
            )
            .unwrap();
        assert_eq!(points[0].sum, Some(1.0));
        assert_eq!(points[0].unit, StandardUnit::Bytes);
    }

    #[test]
    fn test_subset_and_zero_fill_config() {
        let engine = MetricsEngine::builder()
            .with_config(EngineConfig {
                dimension_match: DimensionMatch::Subset,
                empty_buckets: EmptyBucketPolicy::ZeroFill,
                ..EngineConfig::default()
            })
            .build()
            .unwrap();

        put(
            &engine,
            vec![
                MetricDatumInput::value("m", 1.0).at(0).with_dimension("host", "a"),
                MetricDatumInput::value("m", 2.0)
                    .at(0)
                    .with_dimension("host", "a")
                    .with_dimension("dc", "x"),
            ],
        )
        .unwrap();

        let points = engine
            .get_metric_statistics(
                GetMetricStatisticsRequest::new("NS", "m", 0, 180_000, 60)
                    .with_dimension("host", "a")
                    .with_statistics(["Sum"]),
            )
            .unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].sum, Some(3.0));
        assert_eq!(points[1].sum, Some(0.0));
    }

    #[test]
    fn test_stats() {
        let engine = MetricsEngine::in_memory();
        put(&engine, vec![MetricDatumInput::value("m", 1.0).at(0)]).unwrap();
        engine
            .get_metric_statistics(
                GetMetricStatisticsRequest::new("NS", "m", 0, 60_000, 60).with_statistics(["Sum"]),
            )
            .unwrap();

        let stats = engine.stats();
        assert_eq!(stats.store_id, "memory");
        assert_eq!(stats.catalog_metrics, 1);
        assert_eq!(stats.store.series_count, 1);
        assert_eq!(stats.aggregator.queries, 1);
    }
}
