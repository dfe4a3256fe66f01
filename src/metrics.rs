//! Self-monitoring metrics for the engine
//!
//! Prometheus counters and gauges describing the engine's own activity
//! (ingest volume, query latency, catalog size), exported by the server's
//! `/metrics` endpoint.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // === Ingest ===

    /// PutMetricData requests by outcome
    pub static ref PUT_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "kuba_metrics_put_requests_total",
        "PutMetricData requests by status",
        &["status"]
    ).unwrap();

    /// Datums accepted into the store
    pub static ref DATUMS_INGESTED_TOTAL: IntCounter = register_int_counter!(
        "kuba_metrics_datums_ingested_total",
        "Datums accepted into the metric store"
    ).unwrap();

    // === Queries ===

    /// Read operations by operation and outcome
    pub static ref QUERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "kuba_metrics_queries_total",
        "Read operations by operation and status",
        &["operation", "status"]
    ).unwrap();

    /// Read operation latency
    pub static ref QUERY_DURATION: HistogramVec = register_histogram_vec!(
        "kuba_metrics_query_duration_seconds",
        "Read operation latency in seconds",
        &["operation"],
        vec![0.0001, 0.001, 0.01, 0.1, 0.5, 1.0]
    ).unwrap();

    // === Resources ===

    /// Distinct metric identities in the catalog
    pub static ref CATALOG_METRICS: IntGauge = register_int_gauge!(
        "kuba_metrics_catalog_metrics",
        "Distinct metric identities known to the catalog"
    ).unwrap();

    /// Datums held by the store
    pub static ref STORED_DATUMS: IntGauge = register_int_gauge!(
        "kuba_metrics_stored_datums",
        "Datums held by the metric store"
    ).unwrap();
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Record a PutMetricData request
#[inline]
pub fn record_put(datums: usize, success: bool) {
    PUT_REQUESTS_TOTAL
        .with_label_values(&[status_label(success)])
        .inc();
    if success {
        DATUMS_INGESTED_TOTAL.inc_by(datums as u64);
    }
}

/// Record a read operation (`get_metric_statistics`, `list_metrics`)
#[inline]
pub fn record_query(operation: &str, duration_secs: f64, success: bool) {
    QUERIES_TOTAL
        .with_label_values(&[operation, status_label(success)])
        .inc();
    QUERY_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

/// Update resource gauges
#[inline]
pub fn update_sizes(catalog_metrics: usize, stored_datums: u64) {
    CATALOG_METRICS.set(catalog_metrics as i64);
    STORED_DATUMS.set(stored_datums as i64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_put() {
        let before = DATUMS_INGESTED_TOTAL.get();
        record_put(3, true);
        record_put(5, false);
        assert!(DATUMS_INGESTED_TOTAL.get() >= before + 3);

        let metrics = gather_metrics().expect("Failed to gather metrics");
        assert!(metrics.contains("kuba_metrics_put_requests_total"));
    }

    #[test]
    fn test_record_query() {
        record_query("list_metrics", 0.0005, true);
        let metrics = gather_metrics().expect("Failed to gather metrics");
        assert!(metrics.contains("kuba_metrics_queries_total"));
        assert!(metrics.contains("kuba_metrics_query_duration_seconds"));
    }

    #[test]
    fn test_update_sizes() {
        update_sizes(2, 10);
        let metrics = gather_metrics().expect("Failed to gather metrics");
        assert!(metrics.contains("kuba_metrics_catalog_metrics"));
    }
}
