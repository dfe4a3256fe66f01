//! Metric storage
//!
//! Append-only storage of normalized datums, indexed by [`MetricIdentity`].
//!
//! - [`SeriesDatums`]: timestamp-ordered datums of one series
//! - [`InMemoryMetricStore`]: concurrent map of series, the default
//!   [`MetricStore`](crate::engine::traits::MetricStore) backend
//! - [`snapshot`]: JSON snapshot persistence for restarts

pub mod memory;
pub mod series;
pub mod snapshot;

pub use memory::InMemoryMetricStore;
pub use series::{SeriesDatums, StoredDatum};

use serde::{Deserialize, Serialize};

use crate::types::{MetricIdentity, StandardUnit};

/// How a query's dimensions are matched against stored series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionMatch {
    /// The series' dimension set must equal the query's; a query without
    /// dimensions matches every series of the metric
    #[default]
    Exact,
    /// The query's dimensions must all be present on the series
    Subset,
}

/// Selects stored series and datums for a query
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFilter {
    /// Namespace, metric name and dimensions to match
    pub identity: MetricIdentity,
    /// Only datums recorded in this unit
    pub unit: Option<StandardUnit>,
}

impl MetricFilter {
    /// Filter on an identity, any unit
    pub fn new(identity: MetricIdentity) -> Self {
        Self {
            identity,
            unit: None,
        }
    }

    /// Restrict to datums recorded in `unit`
    pub fn with_unit(mut self, unit: StandardUnit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Does a stored series match under the given mode
    pub fn matches_series(&self, series: &MetricIdentity, mode: DimensionMatch) -> bool {
        if series.namespace != self.identity.namespace
            || series.metric_name != self.identity.metric_name
        {
            return false;
        }
        match mode {
            DimensionMatch::Exact => {
                self.identity.dimensions.is_empty()
                    || series.dimensions == self.identity.dimensions
            }
            DimensionMatch::Subset => self.identity.dimensions.is_subset_of(&series.dimensions),
        }
    }

    /// Does a stored datum's unit pass the filter
    pub fn matches_unit(&self, unit: StandardUnit) -> bool {
        self.unit.map_or(true, |u| u == unit)
    }
}

/// Store-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Distinct series held
    pub series_count: usize,
    /// Datums held
    pub datum_count: u64,
    /// Datums that arrived out of timestamp order
    pub out_of_order_inserts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DimensionSet;

    fn identity(dims: &[(&str, &str)]) -> MetricIdentity {
        MetricIdentity::new(
            "NS",
            "M",
            DimensionSet::from_pairs(dims.iter().copied()).unwrap(),
        )
    }

    #[test]
    fn test_exact_match() {
        let filter = MetricFilter::new(identity(&[("a", "1")]));
        assert!(filter.matches_series(&identity(&[("a", "1")]), DimensionMatch::Exact));
        assert!(!filter.matches_series(
            &identity(&[("a", "1"), ("b", "2")]),
            DimensionMatch::Exact
        ));
        assert!(!filter.matches_series(&identity(&[]), DimensionMatch::Exact));
    }

    #[test]
    fn test_exact_match_without_dimensions() {
        let filter = MetricFilter::new(identity(&[]));
        assert!(filter.matches_series(&identity(&[]), DimensionMatch::Exact));
        assert!(filter.matches_series(&identity(&[("a", "1")]), DimensionMatch::Exact));

        let other_metric = MetricIdentity::new("NS", "Other", DimensionSet::new());
        assert!(!filter.matches_series(&other_metric, DimensionMatch::Exact));
    }

    #[test]
    fn test_subset_match() {
        let filter = MetricFilter::new(identity(&[("a", "1")]));
        assert!(filter.matches_series(
            &identity(&[("a", "1"), ("b", "2")]),
            DimensionMatch::Subset
        ));
        assert!(!filter.matches_series(&identity(&[("b", "2")]), DimensionMatch::Subset));

        let other_metric = MetricIdentity::new("NS", "Other", DimensionSet::new());
        let any = MetricFilter::new(identity(&[]));
        assert!(!any.matches_series(&other_metric, DimensionMatch::Subset));
    }

    #[test]
    fn test_unit_filter() {
        let any = MetricFilter::new(identity(&[]));
        assert!(any.matches_unit(StandardUnit::Bytes));

        let bytes = any.with_unit(StandardUnit::Bytes);
        assert!(bytes.matches_unit(StandardUnit::Bytes));
        assert!(!bytes.matches_unit(StandardUnit::None));
    }
}
