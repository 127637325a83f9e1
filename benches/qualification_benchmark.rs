use criterion::{criterion_group, criterion_main, Criterion};
use std::collections::HashSet;
use std::hint::black_box;
use stylist_academy::services::drip;
use stylist_academy::services::qualification::{evaluate, RequiredModule};
use uuid::Uuid;

/// A certification with `modules` required modules of `videos` videos each.
fn catalogue(modules: usize, videos: usize) -> Vec<RequiredModule> {
    (0..modules)
        .map(|i| RequiredModule {
            module_id: Uuid::new_v4(),
            title: format!("Module {}", i),
            video_ids: (0..videos).map(|_| Uuid::new_v4()).collect(),
        })
        .collect()
}

fn benchmark_qualification(c: &mut Criterion) {
    let required = catalogue(12, 40);
    let all: Vec<Uuid> = required
        .iter()
        .flat_map(|m| m.video_ids.iter().copied())
        .collect();

    // Everything watched, plus unrelated videos from other courses
    let mut finished: HashSet<Uuid> = all.iter().copied().collect();
    finished.extend((0..2000).map(|_| Uuid::new_v4()));

    // Every other video watched
    let halfway: HashSet<Uuid> = all.iter().step_by(2).copied().collect();

    let mut group = c.benchmark_group("qualification");

    group.bench_function("fully_qualified", |b| {
        b.iter(|| evaluate(black_box(&required), black_box(&finished)))
    });

    group.bench_function("halfway", |b| {
        b.iter(|| evaluate(black_box(&required), black_box(&halfway)))
    });

    group.finish();
}

fn benchmark_drip(c: &mut Criterion) {
    c.bench_function("distribute_evenly_500", |b| {
        b.iter(|| drip::distribute_evenly(black_box(500), black_box(12), black_box(7)))
    });
}

criterion_group!(benches, benchmark_qualification, benchmark_drip);
criterion_main!(benches);
