//! In-memory metric store
//!
//! A `DashMap` from identity to a per-series `RwLock<SeriesDatums>`. The
//! map's sharded locks guard series creation; each series has its own
//! write lock, so concurrent puts to different series never contend and
//! puts to the same series are serialized without losing datums.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::series::SeriesDatums;
use super::{DimensionMatch, MetricFilter, StoreStats};
use crate::engine::traits::MetricStore;
use crate::error::Result;
use crate::types::{MetricDatum, MetricIdentity, TimeRange};

/// Concurrent in-memory store of metric datums
///
/// # Example
///
/// ```rust
/// use kuba_metrics::engine::traits::MetricStore;
/// use kuba_metrics::storage::{DimensionMatch, InMemoryMetricStore, MetricFilter};
/// use kuba_metrics::types::*;
///
/// let store = InMemoryMetricStore::new(DimensionMatch::Exact);
/// let id = MetricIdentity::new("NS", "Requests", DimensionSet::new());
/// store.put(MetricDatum {
///     identity: id.clone(),
///     timestamp: 1_000,
///     unit: StandardUnit::Count,
///     aggregate: StatisticSet::from_value(3.0),
/// }).unwrap();
///
/// let hits = store.query(&MetricFilter::new(id), &TimeRange::new(0, 2_000)).unwrap();
/// assert_eq!(hits.len(), 1);
/// ```
pub struct InMemoryMetricStore {
    /// Series data: identity -> ordered datums
    series: DashMap<MetricIdentity, RwLock<SeriesDatums>>,
    /// How query dimensions select series
    match_mode: DimensionMatch,
    /// Total datums held
    datum_count: AtomicU64,
    /// Total out-of-order insertions
    out_of_order: AtomicU64,
}

impl InMemoryMetricStore {
    /// Create an empty store
    pub fn new(match_mode: DimensionMatch) -> Self {
        Self {
            series: DashMap::new(),
            match_mode,
            datum_count: AtomicU64::new(0),
            out_of_order: AtomicU64::new(0),
        }
    }

    /// Dimension matching mode used by queries
    pub fn match_mode(&self) -> DimensionMatch {
        self.match_mode
    }

    /// Number of distinct series
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    fn collect_series(
        identity: &MetricIdentity,
        series: &RwLock<SeriesDatums>,
        filter: &MetricFilter,
        range: &TimeRange,
        out: &mut Vec<MetricDatum>,
    ) {
        let guard = series.read();
        out.extend(
            guard
                .range(range)
                .iter()
                .filter(|d| filter.matches_unit(d.unit))
                .map(|d| MetricDatum {
                    identity: identity.clone(),
                    timestamp: d.timestamp,
                    unit: d.unit,
                    aggregate: d.aggregate,
                }),
        );
    }
}

impl Default for InMemoryMetricStore {
    fn default() -> Self {
        Self::new(DimensionMatch::default())
    }
}

impl MetricStore for InMemoryMetricStore {
    fn store_id(&self) -> &str {
        "memory"
    }

    fn put(&self, datum: MetricDatum) -> Result<()> {
        let MetricDatum {
            identity,
            timestamp,
            unit,
            aggregate,
        } = datum;

        let out_of_order = match self.series.get(&identity) {
            Some(series) => series.write().push(timestamp, unit, aggregate),
            None => {
                debug!(metric = %identity, "Creating series");
                self.series
                    .entry(identity)
                    .or_default()
                    .write()
                    .push(timestamp, unit, aggregate)
            }
        };

        self.datum_count.fetch_add(1, Ordering::Relaxed);
        if out_of_order {
            self.out_of_order.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn query(&self, filter: &MetricFilter, range: &TimeRange) -> Result<Vec<MetricDatum>> {
        let mut out = Vec::new();
        if range.is_empty() {
            return Ok(out);
        }

        match self.match_mode {
            DimensionMatch::Exact if !filter.identity.dimensions.is_empty() => {
                if let Some(series) = self.series.get(&filter.identity) {
                    Self::collect_series(series.key(), series.value(), filter, range, &mut out);
                }
            }
            _ => {
                for entry in self.series.iter() {
                    if filter.matches_series(entry.key(), self.match_mode) {
                        Self::collect_series(entry.key(), entry.value(), filter, range, &mut out);
                    }
                }
            }
        }

        Ok(out)
    }

    fn snapshot(&self) -> Result<Vec<MetricDatum>> {
        let mut out = Vec::with_capacity(self.datum_count.load(Ordering::Relaxed) as usize);
        for entry in self.series.iter() {
            let guard = entry.value().read();
            out.extend(guard.all().iter().map(|d| MetricDatum {
                identity: entry.key().clone(),
                timestamp: d.timestamp,
                unit: d.unit,
                aggregate: d.aggregate,
            }));
        }
        Ok(out)
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            series_count: self.series.len(),
            datum_count: self.datum_count.load(Ordering::Relaxed),
            out_of_order_inserts: self.out_of_order.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DimensionSet, StandardUnit, StatisticSet};
    use std::sync::Arc;

    fn identity(dims: &[(&str, &str)]) -> MetricIdentity {
        MetricIdentity::new(
            "Acme/Monitoring",
            "Example",
            DimensionSet::from_pairs(dims.iter().copied()).unwrap(),
        )
    }

    fn datum(id: &MetricIdentity, ts: i64, v: f64) -> MetricDatum {
        MetricDatum {
            identity: id.clone(),
            timestamp: ts,
            unit: StandardUnit::None,
            aggregate: StatisticSet::from_value(v),
        }
    }

    #[test]
    fn test_put_and_query_exact() {
        let store = InMemoryMetricStore::new(DimensionMatch::Exact);
        let a = identity(&[("host", "a")]);
        let b = identity(&[("host", "a"), ("dc", "x")]);

        store.put(datum(&a, 1000, 1.0)).unwrap();
        store.put(datum(&b, 1000, 2.0)).unwrap();

        let hits = store
            .query(&MetricFilter::new(a.clone()), &TimeRange::new(0, 5000))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].identity, a);

        let stats = store.stats();
        assert_eq!(stats.series_count, 2);
        assert_eq!(stats.datum_count, 2);
    }

    #[test]
    fn test_exact_query_without_dimensions_spans_series() {
        let store = InMemoryMetricStore::new(DimensionMatch::Exact);
        store.put(datum(&identity(&[("host", "a")]), 1000, 1.0)).unwrap();
        store.put(datum(&identity(&[("host", "b")]), 1000, 2.0)).unwrap();
        store.put(datum(&identity(&[]), 1000, 4.0)).unwrap();

        let hits = store
            .query(&MetricFilter::new(identity(&[])), &TimeRange::new(0, 5000))
            .unwrap();
        let total: f64 = hits.iter().map(|d| d.aggregate.sum).sum();
        assert_eq!(hits.len(), 3);
        assert_eq!(total, 7.0);
    }

    #[test]
    fn test_query_subset() {
        let store = InMemoryMetricStore::new(DimensionMatch::Subset);
        store.put(datum(&identity(&[("host", "a")]), 1000, 1.0)).unwrap();
        store
            .put(datum(&identity(&[("host", "a"), ("dc", "x")]), 1000, 2.0))
            .unwrap();
        store.put(datum(&identity(&[("host", "b")]), 1000, 4.0)).unwrap();

        let hits = store
            .query(
                &MetricFilter::new(identity(&[("host", "a")])),
                &TimeRange::new(0, 5000),
            )
            .unwrap();
        let total: f64 = hits.iter().map(|d| d.aggregate.sum).sum();
        assert_eq!(hits.len(), 2);
        assert_eq!(total, 3.0);
    }

    #[test]
    fn test_query_window_and_unit() {
        let store = InMemoryMetricStore::default();
        let id = identity(&[]);
        store.put(datum(&id, 1000, 1.0)).unwrap();
        store
            .put(MetricDatum {
                unit: StandardUnit::Bytes,
                ..datum(&id, 2000, 2.0)
            })
            .unwrap();
        store.put(datum(&id, 3000, 3.0)).unwrap();

        let window = TimeRange::new(1000, 3000);
        assert_eq!(store.query(&MetricFilter::new(id.clone()), &window).unwrap().len(), 2);

        let bytes = MetricFilter::new(id.clone()).with_unit(StandardUnit::Bytes);
        let hits = store.query(&bytes, &window).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].timestamp, 2000);

        let empty = TimeRange::new(3000, 3000);
        assert!(store.query(&MetricFilter::new(id), &empty).unwrap().is_empty());
    }

    #[test]
    fn test_never_merges() {
        let store = InMemoryMetricStore::default();
        let id = identity(&[]);
        for _ in 0..5 {
            store.put(datum(&id, 1000, 1.0)).unwrap();
        }
        let hits = store
            .query(&MetricFilter::new(id), &TimeRange::new(1000, 1001))
            .unwrap();
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn test_snapshot_contains_everything() {
        let store = InMemoryMetricStore::default();
        store.put(datum(&identity(&[("a", "1")]), 3000, 1.0)).unwrap();
        store.put(datum(&identity(&[("a", "1")]), 1000, 1.0)).unwrap();
        store.put(datum(&identity(&[("a", "2")]), 2000, 1.0)).unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(store.stats().out_of_order_inserts, 1);
    }

    #[test]
    fn test_concurrent_puts() {
        let store = Arc::new(InMemoryMetricStore::default());
        let id = identity(&[("host", "shared")]);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                let id = id.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        store.put(datum(&id, (t * 500 + i) as i64, 1.0)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let hits = store
            .query(&MetricFilter::new(id), &TimeRange::new(0, i64::MAX))
            .unwrap();
        assert_eq!(hits.len(), 4000);
        assert!(hits.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
