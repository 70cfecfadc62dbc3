use criterion::{black_box, criterion_group, criterion_main, Criterion};
use habitat_core::grid::ResourceGrid;
use habitat_core::movement::step_target;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn bench_replenish(c: &mut Criterion) {
    let grid = ResourceGrid::new(100, 100);
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    c.bench_function("grid_replenish_100x100", |b| {
        b.iter(|| {
            grid.clear_all();
            black_box(grid.replenish(0.11, &mut rng))
        })
    });
}

fn bench_try_consume(c: &mut Criterion) {
    let grid = ResourceGrid::new(100, 100);

    c.bench_function("grid_try_consume", |b| {
        b.iter(|| {
            grid.place(50, 50).ok();
            black_box(grid.try_consume(50, 50))
        })
    });
}

fn bench_random_walk(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    c.bench_function("random_walk_1000_steps", |b| {
        b.iter(|| {
            let mut pos = (12, 12);
            for _ in 0..1000 {
                pos = step_target(pos.0, pos.1, 25, 25, &mut rng);
            }
            black_box(pos)
        })
    });
}

criterion_group!(benches, bench_replenish, bench_try_consume, bench_random_walk);
criterion_main!(benches);
