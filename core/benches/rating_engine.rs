use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

#[path = "../src/engine/mod.rs"]
mod engine;

use engine::convolution::ConvolutionEngine;
use engine::iterative::IterativeEngine;
use engine::RatingEngine;

/// Deterministic synthetic field: spreads ratings across a realistic
/// 800-point band without pulling in a randomness dependency just for a
/// benchmark fixture.
fn synthetic_field(n: usize) -> (Vec<i32>, Vec<f64>, Vec<i32>) {
    let ranks: Vec<i32> = (1..=n as i32).collect();
    let ratings: Vec<f64> = (0..n).map(|i| 1500.0 + ((i * 37) % 800) as f64 - 400.0).collect();
    let attended_counts: Vec<i32> = (0..n).map(|i| (i % 60) as i32).collect();
    (ranks, ratings, attended_counts)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("rating_engine");
    for n in [50, 500, 5000].iter() {
        let (ranks, ratings, attended_counts) = synthetic_field(*n);

        group.bench_function(BenchmarkId::new("iterative", n), |b| {
            b.iter(|| IterativeEngine.elo_delta(&ranks, &ratings, &attended_counts))
        });
        group.bench_function(BenchmarkId::new("convolution", n), |b| {
            b.iter(|| ConvolutionEngine.elo_delta(&ranks, &ratings, &attended_counts))
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
