//! Scalability benchmarks for the parasite simulation
//!
//! Compares the grid broad phase against a brute-force pair scan and times
//! full ticks at various body counts.
//!
//! Run with: cargo bench --bench scalability

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parasite_sim::config::SimConfig;
use parasite_sim::game::constants::physics::TICK_DURATION_MS;
use parasite_sim::game::entity::{EntityId, EntityKind};
use parasite_sim::game::simulation::Simulation;
use parasite_sim::game::spatial::{SpatialEntity, SpatialGrid};
use parasite_sim::game::systems::collision;
use parasite_sim::persistence::PersistentData;
use parasite_sim::util::geometry::circles_overlap;
use parasite_sim::util::vec2::Vec2;
use rand::Rng;

const WORLD: f32 = 3000.0;

/// Randomly distributed bodies with typical radii
fn random_bodies(count: usize) -> Vec<SpatialEntity> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| SpatialEntity {
            id: i as EntityId,
            position: Vec2::new(rng.gen_range(0.0..WORLD), rng.gen_range(0.0..WORLD)),
            radius: rng.gen_range(6.0..30.0),
        })
        .collect()
}

/// Simulation with an active run and `count` drifting bodies
fn create_sim_with_bodies(count: usize) -> Simulation {
    let mut sim = match Simulation::new(SimConfig::default(), PersistentData::default()) {
        Ok(sim) => sim,
        Err(e) => panic!("default config rejected: {}", e),
    };
    if let Err(e) = sim.start_run() {
        panic!("parasite spawn rejected: {}", e);
    }
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let kind = if i % 4 == 0 { EntityKind::Nutrient } else { EntityKind::Cell };
        let position = Vec2::new(rng.gen_range(0.0..WORLD), rng.gen_range(0.0..WORLD));
        let Ok(id) = sim.spawn(kind, position, rng.gen_range(6.0..30.0), 1.0e6) else {
            continue;
        };
        if let Some(body) = sim.entity_mut(id) {
            body.velocity = Vec2::new(rng.gen_range(-150.0..150.0), rng.gen_range(-150.0..150.0));
        }
    }

    sim
}

/// Benchmark grid candidate pairs against an O(n^2) scan
fn bench_broad_phase(c: &mut Criterion) {
    let mut group = c.benchmark_group("broad_phase");
    group.sample_size(50);

    for count in [100, 500, 1000, 2000] {
        let bodies = random_bodies(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("grid", count), &count, |b, _| {
            let mut grid = SpatialGrid::new(64.0);
            b.iter(|| {
                grid.rebuild(bodies.iter().copied());
                let pairs = grid.candidate_pairs();
                black_box(collision::narrow_phase(&pairs).len())
            })
        });

        group.bench_with_input(BenchmarkId::new("brute_force", count), &count, |b, _| {
            b.iter(|| {
                let mut hits = 0usize;
                for i in 0..bodies.len() {
                    for j in (i + 1)..bodies.len() {
                        let (a, o) = (&bodies[i], &bodies[j]);
                        if circles_overlap(a.position, a.radius, o.position, o.radius) {
                            hits += 1;
                        }
                    }
                }
                black_box(hits)
            })
        });
    }
    group.finish();
}

/// Benchmark a full tick (integrate, rebuild, narrow phase, drain)
fn bench_full_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_tick");
    group.sample_size(30);

    for count in [100, 500, 1000, 2000] {
        let mut sim = create_sim_with_bodies(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("complete", count), &count, |b, _| {
            b.iter(|| black_box(sim.tick(black_box(TICK_DURATION_MS))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_broad_phase, bench_full_tick);

criterion_main!(benches);
