//! Datum normalization
//!
//! Converts the three ingest shapes (a single raw value, a pre-aggregated
//! statistic set, or a values/counts array) into the canonical
//! [`StatisticSet`] every stored [`MetricDatum`] carries. Pure functions, no
//! side effects.

use crate::error::{Error, Result};
use crate::types::{MetricDatum, MetricIdentity, StandardUnit, StatisticSet};

/// Maximum number of entries in a values/counts ingest
pub const MAX_VALUES_PER_DATUM: usize = 150;

/// Normalize a raw value or a statistic set into a datum
///
/// Exactly one of `value` and `statistic_set` must be given.
///
/// # Example
///
/// ```rust
/// use kuba_metrics::normalize::normalize;
/// use kuba_metrics::types::{DimensionSet, MetricIdentity, StandardUnit};
///
/// let id = MetricIdentity::new("NS", "Latency", DimensionSet::new());
/// let datum = normalize(Some(12.5), None, 1_000, id, StandardUnit::Milliseconds).unwrap();
/// assert_eq!(datum.aggregate.sample_count, 1.0);
/// assert_eq!(datum.aggregate.maximum, 12.5);
/// ```
pub fn normalize(
    value: Option<f64>,
    statistic_set: Option<StatisticSet>,
    timestamp: i64,
    identity: MetricIdentity,
    unit: StandardUnit,
) -> Result<MetricDatum> {
    let aggregate = match (value, statistic_set) {
        (Some(v), None) => {
            if !v.is_finite() {
                return Err(Error::invalid_input(format!(
                    "Value for {} must be finite, got {}",
                    identity.metric_name, v
                )));
            }
            StatisticSet::from_value(v)
        }
        (None, Some(set)) => {
            set.validate()?;
            set
        }
        (Some(_), Some(_)) => {
            return Err(Error::invalid_input(format!(
                "Datum for {} has both a value and a statistic set",
                identity.metric_name
            )))
        }
        (None, None) => {
            return Err(Error::invalid_input(format!(
                "Datum for {} has neither a value nor a statistic set",
                identity.metric_name
            )))
        }
    };

    Ok(MetricDatum {
        identity,
        timestamp,
        unit,
        aggregate,
    })
}

/// Fold a values/counts array into a single datum
///
/// `counts[i]` is how many times `values[i]` was observed; when `counts`
/// is omitted every value counts once.
pub fn normalize_values(
    values: &[f64],
    counts: Option<&[f64]>,
    timestamp: i64,
    identity: MetricIdentity,
    unit: StandardUnit,
) -> Result<MetricDatum> {
    if values.is_empty() {
        return Err(Error::invalid_input(format!(
            "Values for {} must not be empty",
            identity.metric_name
        )));
    }
    if values.len() > MAX_VALUES_PER_DATUM {
        return Err(Error::invalid_input(format!(
            "Values for {} exceed {} entries",
            identity.metric_name, MAX_VALUES_PER_DATUM
        )));
    }
    if let Some(counts) = counts {
        if counts.len() != values.len() {
            return Err(Error::invalid_input(format!(
                "Values and counts for {} differ in length ({} vs {})",
                identity.metric_name,
                values.len(),
                counts.len()
            )));
        }
    }

    let mut set: Option<StatisticSet> = None;
    for (i, &value) in values.iter().enumerate() {
        let count = counts.map(|c| c[i]).unwrap_or(1.0);
        if !value.is_finite() || !count.is_finite() || count <= 0.0 {
            return Err(Error::invalid_input(format!(
                "Invalid value/count pair ({}, {}) for {}",
                value, count, identity.metric_name
            )));
        }
        let part = StatisticSet::new(value, value, value * count, count);
        set = Some(match set {
            Some(acc) => acc.combine(&part),
            None => part,
        });
    }

    // values is non-empty, so the fold produced a set
    let aggregate = set.ok_or_else(|| Error::invalid_input("Values must not be empty"))?;
    normalize(None, Some(aggregate), timestamp, identity, unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DimensionSet;

    fn identity() -> MetricIdentity {
        let dims = DimensionSet::from_pairs([("UNIQUE_PAGES", "URLS")]).unwrap();
        MetricIdentity::new("SITE/TRAFFIC", "PAGES_VISITED", dims)
    }

    #[test]
    fn test_raw_value() {
        let datum = normalize(Some(0.0), None, 42, identity(), StandardUnit::None).unwrap();
        assert_eq!(datum.timestamp, 42);
        assert_eq!(datum.aggregate, StatisticSet::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_statistic_set_stored_as_is() {
        let set = StatisticSet::new(75.0, 100.0, 85.0, 2.0);
        let datum = normalize(None, Some(set), 0, identity(), StandardUnit::Count).unwrap();
        assert_eq!(datum.aggregate, set);
        assert_eq!(datum.unit, StandardUnit::Count);
    }

    #[test]
    fn test_both_or_neither_rejected() {
        let set = StatisticSet::from_value(1.0);
        assert!(matches!(
            normalize(Some(1.0), Some(set), 0, identity(), StandardUnit::None),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            normalize(None, None, 0, identity(), StandardUnit::None),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_invalid_statistic_set_rejected() {
        let inverted = StatisticSet::new(100.0, 75.0, 85.0, 2.0);
        assert!(normalize(None, Some(inverted), 0, identity(), StandardUnit::None).is_err());

        let zero_count = StatisticSet::new(1.0, 1.0, 1.0, 0.0);
        assert!(normalize(None, Some(zero_count), 0, identity(), StandardUnit::None).is_err());
    }

    #[test]
    fn test_non_finite_value_rejected() {
        assert!(normalize(Some(f64::NAN), None, 0, identity(), StandardUnit::None).is_err());
        assert!(normalize(Some(f64::INFINITY), None, 0, identity(), StandardUnit::None).is_err());
    }

    #[test]
    fn test_values_with_counts() {
        let datum = normalize_values(
            &[1.0, 5.0, 3.0],
            Some(&[2.0, 1.0, 3.0]),
            0,
            identity(),
            StandardUnit::None,
        )
        .unwrap();
        assert_eq!(datum.aggregate.minimum, 1.0);
        assert_eq!(datum.aggregate.maximum, 5.0);
        assert_eq!(datum.aggregate.sum, 2.0 + 5.0 + 9.0);
        assert_eq!(datum.aggregate.sample_count, 6.0);
    }

    #[test]
    fn test_values_without_counts() {
        let datum =
            normalize_values(&[4.0, 2.0], None, 0, identity(), StandardUnit::None).unwrap();
        assert_eq!(datum.aggregate.sample_count, 2.0);
        assert_eq!(datum.aggregate.sum, 6.0);
    }

    #[test]
    fn test_values_rejections() {
        assert!(normalize_values(&[], None, 0, identity(), StandardUnit::None).is_err());
        assert!(
            normalize_values(&[1.0, 2.0], Some(&[1.0]), 0, identity(), StandardUnit::None).is_err()
        );
        assert!(
            normalize_values(&[1.0], Some(&[0.0]), 0, identity(), StandardUnit::None).is_err()
        );
        let too_many = vec![1.0; MAX_VALUES_PER_DATUM + 1];
        assert!(normalize_values(&too_many, None, 0, identity(), StandardUnit::None).is_err());
    }
}
