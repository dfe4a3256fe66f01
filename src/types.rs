//! Core data types used throughout the metrics engine
//!
//! # Key Types
//!
//! - **`Dimension`** / **`DimensionSet`**: name/value tags qualifying a metric.
//!   A dimension set is unordered; it is backed by a sorted map so two sets
//!   holding the same pairs compare and hash equal.
//! - **`MetricIdentity`**: namespace + metric name + dimension set, the index key
//!   for stored datums and catalog entries.
//! - **`StatisticSet`**: the canonical {minimum, maximum, sum, sample count}
//!   aggregate every ingested datum is normalized into.
//! - **`MetricDatum`**: one stored, immutable observation.
//! - **`TimeRange`**: half-open query window `[start, end)` in milliseconds.
//! - **`Statistic`** / **`Percentile`**: what a query asks for.
//! - **`Datapoint`**: one bucket of a query result.
//!
//! # Example
//!
//! ```rust
//! use kuba_metrics::types::{DimensionSet, MetricIdentity, TimeRange};
//!
//! let mut a = DimensionSet::new();
//! a.insert("host", "web-01").unwrap();
//! a.insert("dc", "us-east").unwrap();
//!
//! let b = DimensionSet::from_pairs([("dc", "us-east"), ("host", "web-01")]).unwrap();
//! assert_eq!(a, b);
//!
//! let id = MetricIdentity::new("Acme/Web", "Latency", a);
//! assert_eq!(id.dimensions.len(), 2);
//!
//! let range = TimeRange::new(1000, 2000);
//! assert!(range.contains(1000));
//! assert!(!range.contains(2000));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Maximum number of dimensions on a single metric
pub const MAX_DIMENSIONS: usize = 30;

/// Maximum length of namespaces, metric names, and dimension names/values
pub const MAX_NAME_LENGTH: usize = 255;

/// Milliseconds in one second
pub const MILLIS_PER_SECOND: i64 = 1000;

/// Current wall-clock time as Unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_input(format!("{} must not be empty", kind)));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(Error::invalid_input(format!(
            "{} exceeds {} characters",
            kind, MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

// ============================================================================
// Dimensions
// ============================================================================

/// A single name/value pair qualifying a metric
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dimension {
    /// Dimension name (e.g. "InstanceId")
    pub name: String,
    /// Dimension value (e.g. "i-1234")
    pub value: String,
}

impl Dimension {
    /// Create a new dimension
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Unordered set of dimensions
///
/// Backed by a `BTreeMap` keyed by dimension name, so iteration order,
/// equality and hashing do not depend on insertion order. A name may appear
/// at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionSet {
    dims: BTreeMap<String, String>,
}

impl DimensionSet {
    /// Create an empty dimension set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from name/value pairs
    ///
    /// Exact duplicate pairs collapse into one; the same name with two
    /// different values is rejected.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut set = Self::new();
        for (name, value) in pairs {
            set.insert(name, value)?;
        }
        Ok(set)
    }

    /// Build a set from a list of [`Dimension`]s
    pub fn from_dimensions(dimensions: impl IntoIterator<Item = Dimension>) -> Result<Self> {
        Self::from_pairs(dimensions.into_iter().map(|d| (d.name, d.value)))
    }

    /// Insert a dimension, validating its name and value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        validate_name("Dimension name", &name)?;
        validate_name("Dimension value", &value)?;

        match self.dims.get(&name) {
            Some(existing) if *existing == value => Ok(()),
            Some(existing) => Err(Error::invalid_input(format!(
                "Dimension '{}' given twice with different values ('{}', '{}')",
                name, existing, value
            ))),
            None => {
                if self.dims.len() >= MAX_DIMENSIONS {
                    return Err(Error::invalid_input(format!(
                        "More than {} dimensions",
                        MAX_DIMENSIONS
                    )));
                }
                self.dims.insert(name, value);
                Ok(())
            }
        }
    }

    /// Get the value of a dimension by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.dims.get(name).map(String::as_str)
    }

    /// True if every pair of `self` is also present in `other`
    pub fn is_subset_of(&self, other: &DimensionSet) -> bool {
        self.dims
            .iter()
            .all(|(name, value)| other.dims.get(name) == Some(value))
    }

    /// Number of dimensions
    pub fn len(&self) -> usize {
        self.dims.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Iterate over (name, value) pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dims.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Convert back into a list of [`Dimension`]s, sorted by name
    pub fn to_dimensions(&self) -> Vec<Dimension> {
        self.iter().map(|(n, v)| Dimension::new(n, v)).collect()
    }
}

impl fmt::Display for DimensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        write!(f, "}}")
    }
}

// ============================================================================
// Metric Identity
// ============================================================================

/// Namespace + metric name + dimension set
///
/// Two identities are the same series iff all three parts are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricIdentity {
    /// Top-level grouping (e.g. "SITE/TRAFFIC")
    pub namespace: String,
    /// Metric name (e.g. "PAGES_VISITED")
    pub metric_name: String,
    /// Qualifying dimensions
    pub dimensions: DimensionSet,
}

impl MetricIdentity {
    /// Create a new identity without validation
    pub fn new(
        namespace: impl Into<String>,
        metric_name: impl Into<String>,
        dimensions: DimensionSet,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            metric_name: metric_name.into(),
            dimensions,
        }
    }

    /// Validate namespace and metric name
    ///
    /// Dimension names and values are validated when the set is built.
    pub fn validate(&self) -> Result<()> {
        validate_name("Namespace", &self.namespace)?;
        validate_name("Metric name", &self.metric_name)?;
        Ok(())
    }
}

impl fmt::Display for MetricIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.namespace, self.metric_name, self.dimensions)
    }
}

// ============================================================================
// Units
// ============================================================================

/// Unit a datum is recorded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum StandardUnit {
    /// Seconds
    Seconds,
    /// Microseconds
    Microseconds,
    /// Milliseconds
    Milliseconds,
    /// Bytes
    Bytes,
    /// Kilobytes
    Kilobytes,
    /// Megabytes
    Megabytes,
    /// Gigabytes
    Gigabytes,
    /// Terabytes
    Terabytes,
    /// Bits
    Bits,
    /// Kilobits
    Kilobits,
    /// Megabits
    Megabits,
    /// Gigabits
    Gigabits,
    /// Terabits
    Terabits,
    /// Percent
    Percent,
    /// Count
    Count,
    /// Bytes/Second
    #[serde(rename = "Bytes/Second")]
    BytesPerSecond,
    /// Kilobytes/Second
    #[serde(rename = "Kilobytes/Second")]
    KilobytesPerSecond,
    /// Megabytes/Second
    #[serde(rename = "Megabytes/Second")]
    MegabytesPerSecond,
    /// Bits/Second
    #[serde(rename = "Bits/Second")]
    BitsPerSecond,
    /// Count/Second
    #[serde(rename = "Count/Second")]
    CountPerSecond,
    /// No unit
    #[default]
    None,
}

impl StandardUnit {
    /// All units, in declaration order
    pub const ALL: [StandardUnit; 21] = [
        StandardUnit::Seconds,
        StandardUnit::Microseconds,
        StandardUnit::Milliseconds,
        StandardUnit::Bytes,
        StandardUnit::Kilobytes,
        StandardUnit::Megabytes,
        StandardUnit::Gigabytes,
        StandardUnit::Terabytes,
        StandardUnit::Bits,
        StandardUnit::Kilobits,
        StandardUnit::Megabits,
        StandardUnit::Gigabits,
        StandardUnit::Terabits,
        StandardUnit::Percent,
        StandardUnit::Count,
        StandardUnit::BytesPerSecond,
        StandardUnit::KilobytesPerSecond,
        StandardUnit::MegabytesPerSecond,
        StandardUnit::BitsPerSecond,
        StandardUnit::CountPerSecond,
        StandardUnit::None,
    ];

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            StandardUnit::Seconds => "Seconds",
            StandardUnit::Microseconds => "Microseconds",
            StandardUnit::Milliseconds => "Milliseconds",
            StandardUnit::Bytes => "Bytes",
            StandardUnit::Kilobytes => "Kilobytes",
            StandardUnit::Megabytes => "Megabytes",
            StandardUnit::Gigabytes => "Gigabytes",
            StandardUnit::Terabytes => "Terabytes",
            StandardUnit::Bits => "Bits",
            StandardUnit::Kilobits => "Kilobits",
            StandardUnit::Megabits => "Megabits",
            StandardUnit::Gigabits => "Gigabits",
            StandardUnit::Terabits => "Terabits",
            StandardUnit::Percent => "Percent",
            StandardUnit::Count => "Count",
            StandardUnit::BytesPerSecond => "Bytes/Second",
            StandardUnit::KilobytesPerSecond => "Kilobytes/Second",
            StandardUnit::MegabytesPerSecond => "Megabytes/Second",
            StandardUnit::BitsPerSecond => "Bits/Second",
            StandardUnit::CountPerSecond => "Count/Second",
            StandardUnit::None => "None",
        }
    }
}

impl FromStr for StandardUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        StandardUnit::ALL
            .iter()
            .copied()
            .find(|u| u.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid_input(format!("Unknown unit '{}'", s)))
    }
}

impl fmt::Display for StandardUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Statistic Set and Datum
// ============================================================================

/// Pre-aggregated {minimum, maximum, sum, sample count}
///
/// Every stored datum carries one. A raw value `v` is the set
/// `{v, v, v, 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticSet {
    /// Smallest observed value
    pub minimum: f64,
    /// Largest observed value
    pub maximum: f64,
    /// Sum of observed values
    pub sum: f64,
    /// Number of observed values
    pub sample_count: f64,
}

impl StatisticSet {
    /// Create a statistic set without validation
    pub fn new(minimum: f64, maximum: f64, sum: f64, sample_count: f64) -> Self {
        Self {
            minimum,
            maximum,
            sum,
            sample_count,
        }
    }

    /// The set describing a single raw value
    pub fn from_value(value: f64) -> Self {
        Self::new(value, value, value, 1.0)
    }

    /// Check `minimum <= maximum`, `sample_count >= 1` and finiteness
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("minimum", self.minimum),
            ("maximum", self.maximum),
            ("sum", self.sum),
            ("sampleCount", self.sample_count),
        ];
        for (name, v) in fields {
            if !v.is_finite() {
                return Err(Error::invalid_input(format!(
                    "Statistic set {} must be finite, got {}",
                    name, v
                )));
            }
        }
        if self.minimum > self.maximum {
            return Err(Error::invalid_input(format!(
                "Statistic set minimum {} exceeds maximum {}",
                self.minimum, self.maximum
            )));
        }
        if self.sample_count < 1.0 {
            return Err(Error::invalid_input(format!(
                "Statistic set sampleCount must be at least 1, got {}",
                self.sample_count
            )));
        }
        Ok(())
    }

    /// Combine with another set covering disjoint samples
    pub fn combine(&self, other: &StatisticSet) -> StatisticSet {
        StatisticSet {
            minimum: self.minimum.min(other.minimum),
            maximum: self.maximum.max(other.maximum),
            sum: self.sum + other.sum,
            sample_count: self.sample_count + other.sample_count,
        }
    }

    /// True if the set describes exactly one sample
    pub fn is_single_sample(&self) -> bool {
        self.sample_count == 1.0 && self.minimum == self.maximum
    }
}

/// One stored observation of a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDatum {
    /// Series the datum belongs to
    pub identity: MetricIdentity,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Unit the datum was recorded in
    #[serde(default)]
    pub unit: StandardUnit,
    /// Normalized aggregate
    pub aggregate: StatisticSet,
}

// ============================================================================
// Time Range
// ============================================================================

/// Half-open time window `[start, end)` in Unix milliseconds
///
/// A range with `start >= end` is empty and contains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp in milliseconds (inclusive)
    pub start: i64,
    /// End timestamp in milliseconds (exclusive)
    pub end: i64,
}

impl TimeRange {
    /// Create a new range
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Check `start <= timestamp < end`
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// True when the range holds no instant
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Width of the range in milliseconds, zero for empty ranges
    pub fn duration_ms(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.end.saturating_sub(self.start)
        }
    }
}

// ============================================================================
// Statistics requested by queries
// ============================================================================

/// A standard statistic a query can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Statistic {
    /// Number of samples
    SampleCount,
    /// sum / sample count
    Average,
    /// Sum of samples
    Sum,
    /// Smallest sample
    Minimum,
    /// Largest sample
    Maximum,
}

impl Statistic {
    /// All standard statistics
    pub const ALL: [Statistic; 5] = [
        Statistic::SampleCount,
        Statistic::Average,
        Statistic::Sum,
        Statistic::Minimum,
        Statistic::Maximum,
    ];

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::SampleCount => "SampleCount",
            Statistic::Average => "Average",
            Statistic::Sum => "Sum",
            Statistic::Minimum => "Minimum",
            Statistic::Maximum => "Maximum",
        }
    }
}

impl FromStr for Statistic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Statistic::ALL
            .iter()
            .copied()
            .find(|st| st.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid_query(format!("Unknown statistic '{}'", s)))
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentile extended statistic such as `p99` or `p99.9`
#[derive(Debug, Clone, PartialEq)]
pub struct Percentile {
    label: String,
    rank: f64,
}

impl Percentile {
    /// The label the caller used, reported back in datapoints
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The percentile rank in `[0, 100]`
    pub fn rank(&self) -> f64 {
        self.rank
    }
}

impl FromStr for Percentile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix('p')
            .or_else(|| s.strip_prefix('P'))
            .ok_or_else(|| Error::invalid_query(format!("Invalid extended statistic '{}'", s)))?;

        // at most two decimal places
        if let Some((_, frac)) = digits.split_once('.') {
            if frac.is_empty() || frac.len() > 2 {
                return Err(Error::invalid_query(format!(
                    "Invalid extended statistic '{}'",
                    s
                )));
            }
        }

        let rank: f64 = digits
            .parse()
            .map_err(|_| Error::invalid_query(format!("Invalid extended statistic '{}'", s)))?;
        if !(0.0..=100.0).contains(&rank) {
            return Err(Error::invalid_query(format!(
                "Percentile out of range in '{}'",
                s
            )));
        }

        Ok(Self {
            label: format!("p{}", digits),
            rank,
        })
    }
}

// ============================================================================
// Query result
// ============================================================================

/// Aggregated statistics for one time bucket
///
/// Only the statistics the query requested are populated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datapoint {
    /// Bucket start, Unix milliseconds
    pub timestamp: i64,
    /// Unit of the datums in the bucket
    pub unit: StandardUnit,
    /// Number of samples
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<f64>,
    /// sum / sample count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    /// Sum of samples
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
    /// Smallest sample
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Largest sample
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Percentiles keyed by their label
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extended_statistics: BTreeMap<String, f64>,
}
