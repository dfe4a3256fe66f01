//! Core trait definitions for pluggable storage backends

use crate::error::Result;
use crate::storage::{MetricFilter, StoreStats};
use crate::types::{MetricDatum, TimeRange};

// =============================================================================
// Metric Store Trait
// =============================================================================

/// Storage backend for normalized datums
///
/// Implementations must be safe under concurrent `put` from many callers:
/// no datum may be lost, merged or partially written. Queries may run
/// concurrently with ingestion and observe a consistent snapshot of each
/// series at call time.
pub trait MetricStore: Send + Sync + 'static {
    /// Unique identifier for this backend
    fn store_id(&self) -> &str;

    /// Append one datum to its series
    fn put(&self, datum: MetricDatum) -> Result<()>;

    /// Append a batch of already validated datums
    fn put_batch(&self, datums: Vec<MetricDatum>) -> Result<()> {
        for datum in datums {
            self.put(datum)?;
        }
        Ok(())
    }

    /// All datums of matching series with timestamps in `[start, end)`
    fn query(&self, filter: &MetricFilter, range: &TimeRange) -> Result<Vec<MetricDatum>>;

    /// Every stored datum, for persistence
    fn snapshot(&self) -> Result<Vec<MetricDatum>>;

    /// Reload datums previously returned by [`snapshot`](Self::snapshot)
    fn restore(&self, datums: Vec<MetricDatum>) -> Result<usize> {
        let count = datums.len();
        self.put_batch(datums)?;
        Ok(count)
    }

    /// Store-wide counters
    fn stats(&self) -> StoreStats;
}
