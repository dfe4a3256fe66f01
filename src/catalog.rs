//! Metric Catalog
//!
//! The set of distinct metric identities ever ingested. Entries are created
//! on first put and never removed.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::types::MetricIdentity;

// ============================================================================
// List Filter
// ============================================================================

/// Match on a dimension name, optionally with a specific value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionFilter {
    /// Dimension name that must be present
    pub name: String,
    /// Required value; any value when `None`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl DimensionFilter {
    /// Require the dimension to be present with any value
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// Require the dimension to be present with `value`
    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// Criteria for listing metrics; every given criterion must match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMetricsFilter {
    /// Only this namespace
    #[serde(default)]
    pub namespace: Option<String>,
    /// Only this metric name
    #[serde(default)]
    pub metric_name: Option<String>,
    /// Dimensions the metric must carry
    #[serde(default)]
    pub dimensions: Vec<DimensionFilter>,
}

impl ListMetricsFilter {
    /// Filter that matches everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Restrict to a metric name
    pub fn with_metric_name(mut self, metric_name: impl Into<String>) -> Self {
        self.metric_name = Some(metric_name.into());
        self
    }

    /// Require a dimension
    pub fn with_dimension(mut self, dimension: DimensionFilter) -> Self {
        self.dimensions.push(dimension);
        self
    }

    /// Does `identity` satisfy every criterion
    pub fn matches(&self, identity: &MetricIdentity) -> bool {
        if let Some(ref ns) = self.namespace {
            if *ns != identity.namespace {
                return false;
            }
        }
        if let Some(ref name) = self.metric_name {
            if *name != identity.metric_name {
                return false;
            }
        }
        self.dimensions.iter().all(|f| {
            match (identity.dimensions.get(&f.name), f.value.as_deref()) {
                (Some(actual), Some(wanted)) => actual == wanted,
                (Some(_), None) => true,
                (None, _) => false,
            }
        })
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Registry of observed metric identities
#[derive(Debug, Default)]
pub struct MetricCatalog {
    entries: RwLock<BTreeSet<MetricIdentity>>,
}

impl MetricCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `identity` exists
    ///
    /// Returns true if the identity was not known before.
    pub fn register(&self, identity: &MetricIdentity) -> bool {
        // Fast path: already registered
        if self.entries.read().contains(identity) {
            return false;
        }

        let inserted = self.entries.write().insert(identity.clone());
        if inserted {
            debug!(metric = %identity, "Registered metric");
        }
        inserted
    }

    /// Identities matching `filter`, sorted
    pub fn list(&self, filter: &ListMetricsFilter) -> Vec<MetricIdentity> {
        self.entries
            .read()
            .iter()
            .filter(|id| filter.matches(id))
            .cloned()
            .collect()
    }

    /// Is `identity` known
    pub fn contains(&self, identity: &MetricIdentity) -> bool {
        self.entries.read().contains(identity)
    }

    /// Number of known identities
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if nothing has been registered
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
