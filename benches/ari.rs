//! ARI scoring benchmarks.

use std::time::Duration;

use ari_gpu::{compute_ari, Context};
use criterion::measurement::WallTime;
use criterion::{BenchmarkGroup, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};

fn configure<'a>(c: &'a mut Criterion, name: &str) -> BenchmarkGroup<'a, WallTime> {
    let mut group = c.benchmark_group(name);
    group.warm_up_time(Duration::from_millis(1000));
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);
    group
}

/// Builds an `(f, p, n)` tensor of labels in `[0, k)`, deterministic per
/// call (seeded RNG), so the direct and tiled paths see comparable data.
fn random_tensor(f: usize, p: usize, n: usize, k: i32) -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..f * p * n).map(|_| rng.random_range(0..k)).collect()
}

const FEATURE_COUNTS: &[(&str, usize, usize)] = &[
    ("f4_p2", 4, 2),
    ("f8_p2", 8, 2),
    ("f8_p4", 8, 4),
];

fn bench_direct_variant(c: &mut Criterion) {
    let ctx = Context::try_default().unwrap();
    let mut group = configure(c, "ari/direct");

    // n = 512 stays well under the tiled-variant threshold.
    let n = 512;
    for &(name, f, p) in FEATURE_COUNTS {
        let data = random_tensor(f, p, n, 6);
        let work_items = (f * (f - 1) / 2) * p * p;

        group.throughput(Throughput::Elements(work_items as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &data, |bencher, data| {
            bencher.iter(|| {
                let _ = compute_ari(&ctx, data, f, p, n).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_tiled_variant(c: &mut Criterion) {
    let ctx = Context::try_default().unwrap();
    let mut group = configure(c, "ari/tiled");

    // n forces every workgroup onto the tiled contingency path.
    let n = 8192;
    for &(name, f, p) in FEATURE_COUNTS {
        let data = random_tensor(f, p, n, 6);
        let work_items = (f * (f - 1) / 2) * p * p;

        group.throughput(Throughput::Elements(work_items as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &data, |bencher, data| {
            bencher.iter(|| {
                let _ = compute_ari(&ctx, data, f, p, n).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_alphabet_bound_reduction(c: &mut Criterion) {
    let ctx = Context::try_default().unwrap();
    let mut group = configure(c, "ari/k_reduction");

    for &n in &[4096usize, 65536, 1_048_576] {
        let data = random_tensor(2, 1, n, 16);

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &data, |bencher, data| {
            bencher.iter(|| {
                let _ = compute_ari(&ctx, data, 2, 1, n).unwrap();
            });
        });
    }

    group.finish();
}

criterion::criterion_group!(
    benches,
    bench_direct_variant,
    bench_tiled_variant,
    bench_alphabet_bound_reduction,
);
criterion::criterion_main!(benches);
