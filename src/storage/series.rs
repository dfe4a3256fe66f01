//! Per-series datum buffer
//!
//! Holds every datum of one metric identity ordered by timestamp.
//! Time-series data is mostly in order, so the common case is a plain
//! append; late arrivals are inserted at their sorted position found by
//! binary search. Datums sharing a timestamp are all kept, in arrival order.

use crate::types::{StandardUnit, StatisticSet, TimeRange};

/// One stored datum without its identity (the series owns that)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredDatum {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Unit the datum was recorded in
    pub unit: StandardUnit,
    /// Normalized aggregate
    pub aggregate: StatisticSet,
}

/// Timestamp-ordered datums of a single series
///
/// # Example
///
/// ```rust
/// use kuba_metrics::storage::SeriesDatums;
/// use kuba_metrics::types::{StandardUnit, StatisticSet, TimeRange};
///
/// let mut series = SeriesDatums::new();
/// series.push(2000, StandardUnit::None, StatisticSet::from_value(2.0));
/// series.push(1000, StandardUnit::None, StatisticSet::from_value(1.0));
///
/// let hits = series.range(&TimeRange::new(0, 1500));
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].timestamp, 1000);
/// ```
#[derive(Debug, Default)]
pub struct SeriesDatums {
    /// Sorted by timestamp, stable for equal timestamps
    datums: Vec<StoredDatum>,
    /// Count of out-of-order insertions (for monitoring)
    out_of_order_count: u64,
}

impl SeriesDatums {
    /// Create an empty series
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a datum, keeping timestamp order
    ///
    /// Returns `true` if the datum arrived out of order.
    pub fn push(&mut self, timestamp: i64, unit: StandardUnit, aggregate: StatisticSet) -> bool {
        let datum = StoredDatum {
            timestamp,
            unit,
            aggregate,
        };

        // Fast path: in-order arrival
        match self.datums.last() {
            None => {
                self.datums.push(datum);
                false
            }
            Some(last) if last.timestamp <= timestamp => {
                self.datums.push(datum);
                false
            }
            Some(_) => {
                // After any existing datums with the same timestamp
                let pos = self.datums.partition_point(|d| d.timestamp <= timestamp);
                self.datums.insert(pos, datum);
                self.out_of_order_count += 1;
                true
            }
        }
    }

    /// Datums whose timestamp lies in `[range.start, range.end)`
    pub fn range(&self, range: &TimeRange) -> &[StoredDatum] {
        if range.is_empty() {
            return &[];
        }
        let lo = self.datums.partition_point(|d| d.timestamp < range.start);
        let hi = self.datums.partition_point(|d| d.timestamp < range.end);
        &self.datums[lo..hi]
    }

    /// All datums in timestamp order
    pub fn all(&self) -> &[StoredDatum] {
        &self.datums
    }

    /// Number of datums
    pub fn len(&self) -> usize {
        self.datums.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.datums.is_empty()
    }

    /// Out-of-order insertions seen so far
    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order_count
    }
}
