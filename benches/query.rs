use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kuba_metrics::aggregation::{Aggregator, StatisticsSelection};
use kuba_metrics::{
    DimensionSet, GetMetricStatisticsRequest, MetricDatum, MetricDatumInput, MetricIdentity,
    MetricsEngine, PutMetricDataRequest, StandardUnit, StatisticSet, TimeRange,
};

const DAY_MS: i64 = 86_400_000;

fn create_datums(count: usize) -> Vec<MetricDatum> {
    let identity = MetricIdentity::new("Bench/Query", "Latency", DimensionSet::new());
    let step = DAY_MS / count as i64;
    (0..count)
        .map(|i| MetricDatum {
            identity: identity.clone(),
            timestamp: i as i64 * step,
            unit: StandardUnit::Milliseconds,
            aggregate: StatisticSet::from_value((i % 500) as f64),
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let aggregator = Aggregator::default();
    let range = TimeRange::new(0, DAY_MS);
    let standard =
        StatisticsSelection::from_lists(&["Average", "Maximum", "SampleCount"], &[]).unwrap();
    let percentiles = StatisticsSelection::from_lists(&[], &["p50", "p99"]).unwrap();

    let mut group = c.benchmark_group("aggregate");

    for size in [1_000, 10_000, 100_000].iter() {
        let datums = create_datums(*size);
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("standard", size), size, |b, _| {
            b.iter(|| black_box(aggregator.aggregate(&datums, &range, 300, &standard).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("percentiles", size), size, |b, _| {
            b.iter(|| black_box(aggregator.aggregate(&datums, &range, 300, &percentiles).unwrap()))
        });
    }

    group.finish();
}

fn bench_get_metric_statistics(c: &mut Criterion) {
    let engine = MetricsEngine::in_memory();
    for chunk in 0..10 {
        let batch = (0..1000)
            .map(|i| {
                MetricDatumInput::value("Latency", (i % 500) as f64)
                    .with_dimension("host", format!("host-{}", i % 8))
                    .at((chunk * 1000 + i) as i64 * 8_000)
            })
            .collect();
        engine
            .put_metric_data(PutMetricDataRequest::new("Bench/Query", batch))
            .unwrap();
    }

    c.bench_function("get_metric_statistics_10k", |b| {
        b.iter(|| {
            let request = GetMetricStatisticsRequest::new("Bench/Query", "Latency", 0, DAY_MS, 3600)
                .with_dimension("host", "host-3")
                .with_statistics(["Sum", "Maximum"]);
            black_box(engine.get_metric_statistics(request).unwrap())
        })
    });
}

criterion_group!(benches, bench_aggregate, bench_get_metric_statistics);
criterion_main!(benches);
