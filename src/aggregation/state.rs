//! Incremental per-bucket aggregation state

use crate::types::{StandardUnit, Statistic, StatisticSet};

/// Running combination of the statistic sets falling into one bucket
///
/// Combining is associative: minimum of minimums, maximum of maximums,
/// sum of sums and sum of sample counts. Single samples are optionally
/// retained so percentiles can be computed at finalize time.
#[derive(Debug, Clone)]
pub struct AggregateState {
    /// Smallest minimum seen
    min: f64,
    /// Largest maximum seen
    max: f64,
    /// Sum of sums
    sum: f64,
    /// Sum of sample counts
    count: f64,
    /// Number of datums combined
    datums: u64,
    /// Unit of the first datum combined
    unit: Option<StandardUnit>,
    /// Single-sample values (for percentiles - uses more memory)
    samples: Option<Vec<f64>>,
}

impl AggregateState {
    /// Create new empty state
    pub fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0.0,
            datums: 0,
            unit: None,
            samples: None,
        }
    }

    /// Create state that keeps single samples (for percentiles)
    pub fn with_samples() -> Self {
        Self {
            samples: Some(Vec::new()),
            ..Self::new()
        }
    }

    /// Combine one datum's aggregate into the state
    pub fn add(&mut self, aggregate: &StatisticSet, unit: StandardUnit) {
        if aggregate.minimum < self.min {
            self.min = aggregate.minimum;
        }
        if aggregate.maximum > self.max {
            self.max = aggregate.maximum;
        }
        self.sum += aggregate.sum;
        self.count += aggregate.sample_count;
        self.datums += 1;

        if self.unit.is_none() {
            self.unit = Some(unit);
        }

        // A pre-aggregated set hides its individual samples
        if let Some(ref mut samples) = self.samples {
            if aggregate.is_single_sample() {
                samples.push(aggregate.minimum);
            }
        }
    }

    /// Merge another state into this one
    pub fn merge(&mut self, other: &AggregateState) {
        if other.datums == 0 {
            return;
        }

        if other.min < self.min {
            self.min = other.min;
        }
        if other.max > self.max {
            self.max = other.max;
        }
        self.sum += other.sum;
        self.count += other.count;
        self.datums += other.datums;

        if self.unit.is_none() {
            self.unit = other.unit;
        }

        if let (Some(ref mut mine), Some(ref theirs)) = (&mut self.samples, &other.samples) {
            mine.extend(theirs);
        }
    }

    /// Number of datums combined so far
    pub fn datums(&self) -> u64 {
        self.datums
    }

    /// True if nothing has been combined
    pub fn is_empty(&self) -> bool {
        self.datums == 0
    }

    /// Unit of the combined datums
    pub fn unit(&self) -> Option<StandardUnit> {
        self.unit
    }

    /// The combined aggregate, if any datum was added
    pub fn to_statistic_set(&self) -> Option<StatisticSet> {
        if self.is_empty() {
            return None;
        }
        Some(StatisticSet::new(self.min, self.max, self.sum, self.count))
    }

    /// Finalize and get result for the given statistic
    pub fn finalize(&self, statistic: Statistic) -> Option<f64> {
        if self.is_empty() {
            return None;
        }

        Some(match statistic {
            Statistic::SampleCount => self.count,
            Statistic::Average => self.sum / self.count,
            Statistic::Sum => self.sum,
            Statistic::Minimum => self.min,
            Statistic::Maximum => self.max,
        })
    }

    /// Nearest-rank percentile over the retained single samples
    ///
    /// The smallest sample with at least `rank` percent of the samples at
    /// or below it; `p0` is the minimum. `None` when samples are not
    /// tracked or none were single samples.
    pub fn percentile(&self, rank: f64) -> Option<f64> {
        let samples = self.samples.as_ref()?;
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let ordinal = (rank * sorted.len() as f64 / 100.0).ceil().max(1.0) as usize;
        sorted.get(ordinal.min(sorted.len()) - 1).copied()
    }
}

impl Default for AggregateState {
    fn default() -> Self {
        Self::new()
    }
}
