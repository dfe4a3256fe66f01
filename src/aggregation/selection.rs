//! Which statistics a query asks for

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Percentile, Statistic};

/// Maximum number of statistics in one query
pub const MAX_STATISTICS_PER_QUERY: usize = 10;

/// Standard statistics or percentile extended statistics, never both
#[derive(Debug, Clone, PartialEq)]
pub enum StatisticsSelection {
    /// Any of SampleCount, Average, Sum, Minimum, Maximum
    Standard(BTreeSet<Statistic>),
    /// Percentiles such as `p90`, `p99.9`
    Extended(Vec<Percentile>),
}

impl StatisticsSelection {
    /// Build a selection from the two raw request lists
    ///
    /// Exactly one list must be non-empty; both or neither fails with
    /// `InvalidQuery`. Unrecognized standard statistic names are skipped,
    /// so a list of only unknown names selects nothing and the datapoints
    /// carry just their timestamp and unit. A malformed percentile is
    /// `InvalidQuery`.
    ///
    /// ```rust
    /// use kuba_metrics::aggregation::StatisticsSelection;
    ///
    /// let sel = StatisticsSelection::from_lists(&["Sum", "Maximum"], &[]).unwrap();
    /// assert!(matches!(sel, StatisticsSelection::Standard(_)));
    ///
    /// let unknown = StatisticsSelection::from_lists(&["Statistics"], &[]).unwrap();
    /// assert!(unknown.is_empty());
    ///
    /// assert!(StatisticsSelection::from_lists(&["Sum"], &["p99"]).is_err());
    /// assert!(StatisticsSelection::from_lists::<&str>(&[], &[]).is_err());
    /// ```
    pub fn from_lists<S: AsRef<str>>(statistics: &[S], extended: &[S]) -> Result<Self> {
        match (statistics.is_empty(), extended.is_empty()) {
            (false, false) => Err(Error::invalid_query(
                "Specify either statistics or extended statistics, not both",
            )),
            (true, true) => Err(Error::invalid_query(
                "Specify either statistics or extended statistics",
            )),
            (false, true) => {
                if statistics.len() > MAX_STATISTICS_PER_QUERY {
                    return Err(Error::invalid_query(format!(
                        "At most {} statistics per query",
                        MAX_STATISTICS_PER_QUERY
                    )));
                }
                let mut parsed = BTreeSet::new();
                for raw in statistics {
                    match raw.as_ref().parse::<Statistic>() {
                        Ok(statistic) => {
                            parsed.insert(statistic);
                        }
                        Err(_) => debug!(statistic = raw.as_ref(), "Ignoring unknown statistic"),
                    }
                }
                Ok(StatisticsSelection::Standard(parsed))
            }
            (true, false) => {
                if extended.len() > MAX_STATISTICS_PER_QUERY {
                    return Err(Error::invalid_query(format!(
                        "At most {} extended statistics per query",
                        MAX_STATISTICS_PER_QUERY
                    )));
                }
                let mut parsed: Vec<Percentile> = Vec::with_capacity(extended.len());
                for raw in extended {
                    let p = raw.as_ref().parse::<Percentile>()?;
                    if !parsed.iter().any(|q| q.label() == p.label()) {
                        parsed.push(p);
                    }
                }
                Ok(StatisticsSelection::Extended(parsed))
            }
        }
    }

    /// A standard selection of the given statistics
    pub fn standard(statistics: impl IntoIterator<Item = Statistic>) -> Self {
        StatisticsSelection::Standard(statistics.into_iter().collect())
    }

    /// Whether percentiles are requested (and samples must be kept)
    pub fn needs_samples(&self) -> bool {
        matches!(self, StatisticsSelection::Extended(_))
    }

    /// Whether no statistic at all is selected
    pub fn is_empty(&self) -> bool {
        match self {
            StatisticsSelection::Standard(s) => s.is_empty(),
            StatisticsSelection::Extended(p) => p.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_selection() {
        let sel = StatisticsSelection::from_lists(
            &["Minimum", "Maximum", "SampleCount", "Sum", "Average", "Sum"],
            &[],
        )
        .unwrap();
        match sel {
            StatisticsSelection::Standard(set) => assert_eq!(set.len(), 5),
            other => panic!("unexpected selection {:?}", other),
        }
    }

    #[test]
    fn test_extended_selection_dedups() {
        let sel = StatisticsSelection::from_lists(&[], &["p99", "p50", "p99"]).unwrap();
        match sel {
            StatisticsSelection::Extended(p) => {
                let labels: Vec<&str> = p.iter().map(|x| x.label()).collect();
                assert_eq!(labels, vec!["p99", "p50"]);
            }
            other => panic!("unexpected selection {:?}", other),
        }
        assert!(StatisticsSelection::from_lists(&[], &["p50"]).unwrap().needs_samples());
    }

    #[test]
    fn test_both_or_neither_rejected() {
        assert!(matches!(
            StatisticsSelection::from_lists(&["Sum"], &["p99"]),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            StatisticsSelection::from_lists::<String>(&[], &[]),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_unknown_standard_names_skipped() {
        let sel = StatisticsSelection::from_lists(&["Statistics", "Maximum"], &[]).unwrap();
        assert_eq!(sel, StatisticsSelection::standard([Statistic::Maximum]));

        let none = StatisticsSelection::from_lists(&["Statistics"], &[]).unwrap();
        assert!(none.is_empty());
        assert!(!none.needs_samples());
    }

    #[test]
    fn test_malformed_percentile_rejected() {
        assert!(matches!(
            StatisticsSelection::from_lists(&[], &["q99"]),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_too_many_rejected() {
        let many = vec!["Sum"; MAX_STATISTICS_PER_QUERY + 1];
        assert!(StatisticsSelection::from_lists(many.as_slice(), &[]).is_err());
    }

    #[test]
    fn test_is_empty() {
        assert!(StatisticsSelection::standard([]).is_empty());
        assert!(!StatisticsSelection::standard([Statistic::Sum]).is_empty());
    }
}
