use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use agelens_core::{AgeScorer, FeatureExtractor, FixedNoise, fallback_score};
use agelens_utils::fixtures::synthetic_face;

fn benchmark_feature_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_extraction");
    for crop_side in [100u32, 200, 400] {
        let face = synthetic_face(crop_side, crop_side);
        let extractor = FeatureExtractor::new(200);
        group.bench_with_input(
            BenchmarkId::from_parameter(crop_side),
            &face,
            |b, face| {
                b.iter(|| extractor.extract(black_box(face)).expect("extract"));
            },
        );
    }
    group.finish();
}

fn benchmark_scoring(c: &mut Criterion) {
    let face = synthetic_face(200, 200);
    let extractor = FeatureExtractor::new(200);
    let features = extractor.extract(&face).expect("extract");
    let scorer = AgeScorer::with_noise_source(Box::new(FixedNoise(0.0)), true);

    c.bench_function("weighted_score", |b| {
        b.iter(|| scorer.score(black_box(&features)).expect("score"));
    });

    c.bench_function("fallback_score", |b| {
        b.iter(|| fallback_score(black_box(&face)).expect("score"));
    });
}

criterion_group!(benches, benchmark_feature_extraction, benchmark_scoring);
criterion_main!(benches);
