//! Period buckets over a query window

use crate::error::{Error, Result};
use crate::types::{TimeRange, MILLIS_PER_SECOND};

/// Consecutive fixed-width buckets partitioning `[start, end)`
///
/// The first bucket starts exactly at `start`; the last one may be cut
/// short by `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodBuckets {
    range: TimeRange,
    period_ms: i64,
}

impl PeriodBuckets {
    /// Create buckets of `period_seconds` over `range`
    ///
    /// Fails with `InvalidQuery` for a non-positive or overflowing period.
    pub fn new(range: TimeRange, period_seconds: i64) -> Result<Self> {
        if period_seconds <= 0 {
            return Err(Error::invalid_query(format!(
                "Period must be a positive number of seconds, got {}",
                period_seconds
            )));
        }
        let period_ms = period_seconds
            .checked_mul(MILLIS_PER_SECOND)
            .ok_or_else(|| {
                Error::invalid_query(format!("Period {}s is too large", period_seconds))
            })?;

        Ok(Self { range, period_ms })
    }

    /// Bucket width in milliseconds
    pub fn period_ms(&self) -> i64 {
        self.period_ms
    }

    /// Number of buckets, zero for an empty range
    pub fn count(&self) -> u64 {
        let duration = self.range.duration_ms() as u64;
        let period = self.period_ms as u64;
        duration / period + u64::from(duration % period != 0)
    }

    /// Index of the bucket holding `timestamp`, if inside the range
    pub fn index_of(&self, timestamp: i64) -> Option<u64> {
        if !self.range.contains(timestamp) {
            return None;
        }
        // contains() guarantees timestamp >= start, so the difference fits u64
        let offset = (timestamp as i128 - self.range.start as i128) as u64;
        Some(offset / self.period_ms as u64)
    }

    /// Start timestamp of bucket `index`
    pub fn start_of(&self, index: u64) -> i64 {
        let start = self.range.start as i128 + index as i128 * self.period_ms as i128;
        start.min(i64::MAX as i128) as i64
    }

    /// Iterate `(bucket_start, bucket_end)` pairs
    pub fn iter(&self) -> BucketIter {
        BucketIter {
            current: self.range.start,
            end: self.range.end,
            period_ms: self.period_ms,
        }
    }
}

/// Iterator over bucket bounds
pub struct BucketIter {
    current: i64,
    end: i64,
    period_ms: i64,
}

impl Iterator for BucketIter {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.end {
            return None;
        }

        let bucket_start = self.current;
        let bucket_end = bucket_start.saturating_add(self.period_ms).min(self.end);
        self.current = bucket_end;

        Some((bucket_start, bucket_end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_iteration() {
        let buckets = PeriodBuckets::new(TimeRange::new(0, 10_000), 2).unwrap();
        let bounds: Vec<_> = buckets.iter().collect();

        assert_eq!(bounds.len(), 5);
        assert_eq!(bounds[0], (0, 2000));
        assert_eq!(bounds[4], (8000, 10_000));
        assert_eq!(buckets.count(), 5);
    }

    #[test]
    fn test_partial_last_bucket() {
        let buckets = PeriodBuckets::new(TimeRange::new(1000, 6500), 2).unwrap();
        let bounds: Vec<_> = buckets.iter().collect();
        assert_eq!(bounds, vec![(1000, 3000), (3000, 5000), (5000, 6500)]);
        assert_eq!(buckets.count(), 3);
    }

    #[test]
    fn test_index_of() {
        let buckets = PeriodBuckets::new(TimeRange::new(1000, 7000), 2).unwrap();
        assert_eq!(buckets.index_of(1000), Some(0));
        assert_eq!(buckets.index_of(2999), Some(0));
        assert_eq!(buckets.index_of(3000), Some(1));
        assert_eq!(buckets.index_of(6999), Some(2));
        assert_eq!(buckets.index_of(7000), None);
        assert_eq!(buckets.index_of(999), None);
        assert_eq!(buckets.start_of(2), 5000);
    }

    #[test]
    fn test_empty_range() {
        let buckets = PeriodBuckets::new(TimeRange::new(5000, 5000), 60).unwrap();
        assert_eq!(buckets.count(), 0);
        assert_eq!(buckets.iter().count(), 0);

        let inverted = PeriodBuckets::new(TimeRange::new(9000, 1000), 60).unwrap();
        assert_eq!(inverted.count(), 0);
    }

    #[test]
    fn test_invalid_period() {
        let range = TimeRange::new(0, 1000);
        assert!(matches!(PeriodBuckets::new(range, 0), Err(Error::InvalidQuery(_))));
        assert!(matches!(PeriodBuckets::new(range, -60), Err(Error::InvalidQuery(_))));
        assert!(matches!(PeriodBuckets::new(range, i64::MAX), Err(Error::InvalidQuery(_))));
    }
}
