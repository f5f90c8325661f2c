use std::time::{Duration, Instant};

use city_core::{project, Projector, SnapshotStore};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

fn store_with_keys(keys: usize, at: Instant) -> SnapshotStore {
    let resources = (0..keys)
        .map(|index| (format!("resource_{index}"), index as f64 * 10.0))
        .collect();
    let rates = (0..keys)
        .map(|index| (format!("resource_{index}"), 0.5 + index as f64))
        .collect();
    let mut store = SnapshotStore::new();
    store.set_snapshot(resources, rates, at);
    store
}

fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection");
    let t0 = Instant::now();

    for keys in [5usize, 50, 500] {
        group.bench_with_input(BenchmarkId::new("project", keys), &keys, |b, &keys| {
            let store = store_with_keys(keys, t0);
            let now = t0 + Duration::from_millis(42_500);
            b.iter(|| {
                if let Some(snapshot) = store.get_snapshot() {
                    black_box(project(snapshot, now));
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("rebase", keys), &keys, |b, &keys| {
            b.iter_batched(
                || (store_with_keys(keys, t0), Projector::default()),
                |(store, mut projector)| {
                    projector.rebase(&store, t0 + Duration::from_secs(1));
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(projection_benches, bench_projection);
criterion_main!(projection_benches);
