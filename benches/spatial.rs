//! Spatial grid benchmarks: per-tick rebuild cost and radius query cost at
//! battle-sized populations.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use bevy_ecs::entity::Entity;
use shieldwall_sim::constants::{ATTACK_RANGE, SPATIAL_CELL_SIZE};
use shieldwall_sim::SpatialGrid;

fn scattered_positions(count: u32) -> Vec<(f32, f32)> {
    // Deterministic pseudo-scatter over a 500x500 field.
    (0..count)
        .map(|i| {
            let x = (i.wrapping_mul(2654435761) % 50_000) as f32 / 100.0;
            let y = (i.wrapping_mul(40503) % 50_000) as f32 / 100.0;
            (x, y)
        })
        .collect()
}

fn bench_rebuild(c: &mut Criterion) {
    let positions = scattered_positions(10_000);
    let mut grid = SpatialGrid::new(SPATIAL_CELL_SIZE);

    c.bench_function("rebuild_10k", |b| {
        b.iter(|| {
            grid.clear();
            for (i, &(x, y)) in positions.iter().enumerate() {
                grid.insert(Entity::from_raw(i as u32), x, y, (i % 2) as u8);
            }
            black_box(grid.total_count())
        })
    });
}

fn bench_query_radius(c: &mut Criterion) {
    let positions = scattered_positions(10_000);
    let mut grid = SpatialGrid::new(SPATIAL_CELL_SIZE);
    for (i, &(x, y)) in positions.iter().enumerate() {
        grid.insert(Entity::from_raw(i as u32), x, y, (i % 2) as u8);
    }

    let mut scratch = Vec::new();
    c.bench_function("query_attack_range_10k", |b| {
        b.iter(|| {
            grid.query_radius_into(250.0, 250.0, black_box(ATTACK_RANGE), &mut scratch);
            black_box(scratch.len())
        })
    });
}

criterion_group!(benches, bench_rebuild, bench_query_radius);
criterion_main!(benches);
