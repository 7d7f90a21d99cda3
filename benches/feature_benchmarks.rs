use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use riskradar::{
    EngineConfig, FeatureEngine, NormalizationScope, RiskScorer, ScopeKind, TelemetryRecord,
};

/// Benchmarks for feature engineering and labeling
///
/// Batch mode scales with athletes x days; incremental mode is measured at
/// the serving history length.

fn create_dataset(athletes: u32, days: usize) -> Vec<TelemetryRecord> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..athletes)
        .flat_map(|athlete_id| {
            (0..days).map(move |i| {
                let t = i as f64 + athlete_id as f64;
                TelemetryRecord {
                    athlete_id,
                    date: start + Duration::days(i as i64),
                    daily_load: 300.0 + 150.0 * (0.7 * t).sin(),
                    resting_hr: 53.0 + 3.0 * (0.4 * t).cos(),
                    hrv: 64.0 + 8.0 * (0.3 * t).sin(),
                    sleep_quality: 0.65 + 0.2 * (1.1 * t).cos(),
                    past_injury: athlete_id % 3 == 0,
                    days_since_injury: if athlete_id % 3 == 0 { 30 + i as u32 } else { 999 },
                }
            })
        })
        .collect()
}

fn bench_batch_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("Batch Transform");

    for &athletes in &[1, 10, 100] {
        let dataset = create_dataset(athletes, 365);

        group.throughput(Throughput::Elements(dataset.len() as u64));
        for (name, parallel) in [("sequential", false), ("parallel", true)] {
            let engine = FeatureEngine::with_config(EngineConfig {
                parallel,
                ..EngineConfig::default()
            })
            .unwrap();

            group.bench_with_input(BenchmarkId::new(name, athletes), &dataset, |b, dataset| {
                b.iter(|| engine.transform_batch(black_box(dataset)).unwrap());
            });
        }
    }

    group.finish();
}

fn bench_scopes(c: &mut Criterion) {
    let mut group = c.benchmark_group("Normalization Scope");
    let series = create_dataset(1, 730);

    for scope in [
        ScopeKind::WholeSeries,
        ScopeKind::CausalExpanding,
        ScopeKind::Trailing { window: 90 },
    ] {
        let engine = FeatureEngine::with_config(EngineConfig {
            scope,
            ..EngineConfig::default()
        })
        .unwrap();

        group.bench_function(BenchmarkId::new("engineer_series", format!("{:?}", scope)), |b| {
            b.iter(|| engine.engineer_series(black_box(&series)));
        });
    }

    group.finish();
}

fn bench_incremental(c: &mut Criterion) {
    let mut group = c.benchmark_group("Incremental Transform");
    let engine = FeatureEngine::new();

    for &days in &[60, 180, 365] {
        let series = create_dataset(1, days + 1);
        let (history, today) = series.split_at(days);

        group.bench_with_input(BenchmarkId::new("transform_incremental", days), &days, |b, _| {
            b.iter(|| engine.transform_incremental(black_box(history), &today[0]).unwrap());
        });
    }

    group.finish();
}

fn bench_labeling(c: &mut Criterion) {
    let mut group = c.benchmark_group("Risk Labeling");
    let engine = FeatureEngine::new();
    let scorer = RiskScorer::new();

    for &athletes in &[10, 100] {
        let enriched = engine.transform_batch(&create_dataset(athletes, 365)).unwrap();

        group.throughput(Throughput::Elements(enriched.records.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("label_batch", athletes),
            &enriched.records,
            |b, records| {
                b.iter(|| {
                    let scope = NormalizationScope::from_vectors(records.iter().map(|r| &r.features));
                    scorer.label_with_scope(black_box(records), &scope)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_batch_transform,
    bench_scopes,
    bench_incremental,
    bench_labeling
);
criterion_main!(benches);
