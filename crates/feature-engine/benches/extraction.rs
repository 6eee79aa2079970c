use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use data_validator::{Sample, SampleBatch, Vector3};
use feature_engine::{FeatureExtractor, StatisticalFeatures};

fn synthetic_batch(len: usize) -> SampleBatch {
    let samples = (0..len)
        .map(|i| {
            let t = i as f64 * 0.02;
            Sample {
                timestamp: Utc.timestamp_millis_opt(i as i64 * 20).unwrap(),
                acceleration: Vector3::new((6.0 * t).sin(), (3.0 * t).cos(), 9.81 + 0.3 * t.sin()),
                rotation: Vector3::new(0.1 * t.cos(), -0.2 * t.sin(), 0.05),
            }
        })
        .collect();
    SampleBatch::new(samples)
}

fn bench_statistics(c: &mut Criterion) {
    let window: Vec<f64> = (0..50).map(|i| (i as f64 * 0.3).sin()).collect();
    c.bench_function("statistics_50", |b| {
        b.iter(|| StatisticalFeatures::compute(black_box(&window)))
    });
}

fn bench_batch(c: &mut Criterion) {
    let extractor = FeatureExtractor::default();
    let batch = synthetic_batch(500);
    c.bench_function("extract_batch_500", |b| {
        b.iter(|| extractor.extract_batch(black_box(&batch)))
    });
}

criterion_group!(benches, bench_statistics, bench_batch);
criterion_main!(benches);
