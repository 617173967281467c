//! ECS microbenchmarks using Criterion.
//!
//! These benchmarks measure individual ECS operations in isolation:
//! - Entity spawn
//! - Component iteration (dense and fragmented across archetypes)
//! - Component add/remove (archetype migration)
//! - Entity despawn

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use lattice::ecs::system::Phase;
use lattice::ecs::world::Config;
use lattice::World;

use lattice_bench::components::{self, ComponentSet, Data, Position, Velocity};

fn inline_world() -> World {
    World::new(Config { thread_count: 0, ..Default::default() })
}

// =============================================================================
// Spawn Benchmarks
// =============================================================================

fn bench_spawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("single_component", count), &count, |b, &n| {
            b.iter(|| {
                let world = inline_world();
                let components = ComponentSet::register(&world);
                for _ in 0..n {
                    let entity = world.spawn();
                    world.set(entity, components.position, components::encode(&Position::default()));
                }
                world.merge();
                black_box(&world);
            });
        });

        group.bench_with_input(BenchmarkId::new("four_components", count), &count, |b, &n| {
            b.iter(|| {
                let world = inline_world();
                let components = ComponentSet::register(&world);
                for _ in 0..n {
                    let entity = world.spawn();
                    world.set(entity, components.transform, components::encode(&components::Transform::default()));
                    world.set(entity, components.position, components::encode(&Position::default()));
                    world.set(entity, components.rotation, components::encode(&components::Rotation::default()));
                    world.set(entity, components.velocity, components::encode(&Velocity::default()));
                }
                world.merge();
                black_box(&world);
            });
        });
    }

    group.finish();
}

// =============================================================================
// Iteration Benchmarks
// =============================================================================

fn bench_simple_iter(c: &mut Criterion) {
    let mut group = c.benchmark_group("simple_iter");

    for count in [1_000, 10_000, 100_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("pos_vel", count), &count, |b, &n| {
            let world = inline_world();
            let components = ComponentSet::register(&world);
            for i in 0..n {
                let entity = world.spawn();
                world.set(entity, components.position, components::encode(&Position { x: i as f32, y: 0.0, z: 0.0 }));
                world.set(entity, components.velocity, components::encode(&Velocity { x: 1.0, y: 0.0, z: 0.0 }));
            }
            world.merge();

            let system = world
                .add_system("Position, Velocity", Phase::Manual, 0.0, |_, rows| {
                    for i in 0..rows.entities.len() {
                        unsafe {
                            let pos_ptr = rows.columns[0].ptr.add(i * rows.columns[0].stride);
                            let vel_ptr = rows.columns[1].ptr.add(i * rows.columns[1].stride);
                            let vel: Velocity = components::read(vel_ptr);
                            let mut pos: Position = components::read(pos_ptr);
                            pos.x += vel.x;
                            pos.y += vel.y;
                            pos.z += vel.z;
                            components::write(pos_ptr, &pos);
                        }
                    }
                })
                .unwrap();

            b.iter(|| {
                world.run_system(system, 0.0);
            });
        });

        // Single component iteration via a manual system run directly.
        group.bench_with_input(BenchmarkId::new("single", count), &count, |b, &n| {
            let world = inline_world();
            let components = ComponentSet::register(&world);
            for i in 0..n {
                let entity = world.spawn();
                world.set(entity, components.position, components::encode(&Position { x: i as f32, y: 0.0, z: 0.0 }));
            }
            world.merge();

            let system = world
                .add_system("Position", Phase::Manual, 0.0, |_, rows| {
                    for i in 0..rows.entities.len() {
                        unsafe {
                            let ptr = rows.columns[0].ptr.add(i * rows.columns[0].stride);
                            let mut pos: Position = components::read(ptr);
                            pos.x += 1.0;
                            components::write(ptr, &pos);
                        }
                    }
                })
                .unwrap();

            b.iter(|| {
                world.run_system(system, 0.0);
            });
        });

        group.bench_with_input(BenchmarkId::new("four_components", count), &count, |b, &n| {
            let world = inline_world();
            let components = ComponentSet::register(&world);
            for _ in 0..n {
                let entity = world.spawn();
                world.set(entity, components.transform, components::encode(&components::Transform::default()));
                world.set(entity, components.position, components::encode(&Position::default()));
                world.set(entity, components.rotation, components::encode(&components::Rotation::default()));
                world.set(entity, components.velocity, components::encode(&Velocity::default()));
            }
            world.merge();

            let system = world
                .add_system("Position, Velocity, Rotation, Transform", Phase::Manual, 0.0, |_, rows| {
                    for i in 0..rows.entities.len() {
                        unsafe {
                            let pos_ptr = rows.columns[0].ptr.add(i * rows.columns[0].stride);
                            let vel_ptr = rows.columns[1].ptr.add(i * rows.columns[1].stride);
                            let vel: Velocity = components::read(vel_ptr);
                            let mut pos: Position = components::read(pos_ptr);
                            pos.x += vel.x;
                            pos.y += vel.y;
                            pos.z += vel.z;
                            components::write(pos_ptr, &pos);
                        }
                    }
                })
                .unwrap();

            b.iter(|| {
                world.run_system(system, 0.0);
            });
        });
    }

    group.finish();
}

// =============================================================================
// Fragmented Iteration Benchmarks
// =============================================================================

fn bench_fragmented_iter(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragmented_iter");

    let marker_count = 26;
    let entities_per_archetype = 20;
    let total = marker_count * entities_per_archetype;

    group.throughput(Throughput::Elements(total as u64));

    group.bench_function("26_archetypes", |b| {
        let world = inline_world();
        let components = ComponentSet::register(&world);

        for &marker in &components.markers {
            for _ in 0..entities_per_archetype {
                let entity = world.spawn();
                world.set(entity, components.data, components::encode(&Data { value: 1.0 }));
                world.set(entity, marker, Vec::new());
            }
        }
        world.merge();

        let system = world
            .add_system("Data", Phase::Manual, 0.0, |_, rows| {
                for i in 0..rows.entities.len() {
                    unsafe {
                        let ptr = rows.columns[0].ptr.add(i * rows.columns[0].stride);
                        let mut data: Data = components::read(ptr);
                        data.value *= 2.0;
                        components::write(ptr, &data);
                    }
                }
            })
            .unwrap();

        b.iter(|| {
            world.run_system(system, 0.0);
        });
    });

    group.finish();
}

// =============================================================================
// Component Migration Benchmarks
// =============================================================================

fn bench_add_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_remove");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("add_component", count), &count, |b, &n| {
            b.iter_batched(
                || {
                    let world = inline_world();
                    let components = ComponentSet::register(&world);
                    let mut entities = Vec::with_capacity(n);
                    for _ in 0..n {
                        let entity = world.spawn();
                        world.set(entity, components.position, components::encode(&Position::default()));
                        entities.push(entity);
                    }
                    world.merge();
                    (world, components, entities)
                },
                |(world, components, entities)| {
                    for entity in entities {
                        world.set(entity, components.velocity, components::encode(&Velocity::default()));
                    }
                    world.merge();
                },
                criterion::BatchSize::SmallInput,
            );
        });

        group.bench_with_input(
            BenchmarkId::new("remove_component", count),
            &count,
            |b, &n| {
                b.iter_batched(
                    || {
                        let world = inline_world();
                        let components = ComponentSet::register(&world);
                        let mut entities = Vec::with_capacity(n);
                        for _ in 0..n {
                            let entity = world.spawn();
                            world.set(entity, components.position, components::encode(&Position::default()));
                            world.set(entity, components.velocity, components::encode(&Velocity::default()));
                            entities.push(entity);
                        }
                        world.merge();
                        (world, components, entities)
                    },
                    |(world, components, entities)| {
                        for entity in entities {
                            world.unset(entity, components.velocity);
                        }
                        world.merge();
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

// =============================================================================
// Despawn Benchmarks
// =============================================================================

fn bench_despawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("despawn");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("single_component", count), &count, |b, &n| {
            b.iter_batched(
                || {
                    let world = inline_world();
                    let components = ComponentSet::register(&world);
                    let mut entities = Vec::with_capacity(n);
                    for _ in 0..n {
                        let entity = world.spawn();
                        world.set(entity, components.position, components::encode(&Position::default()));
                        entities.push(entity);
                    }
                    world.merge();
                    (world, entities)
                },
                |(world, entities)| {
                    for entity in entities {
                        world.despawn(entity);
                    }
                    world.merge();
                },
                criterion::BatchSize::SmallInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("four_components", count), &count, |b, &n| {
            b.iter_batched(
                || {
                    let world = inline_world();
                    let components = ComponentSet::register(&world);
                    let mut entities = Vec::with_capacity(n);
                    for _ in 0..n {
                        let entity = world.spawn();
                        world.set(entity, components.transform, components::encode(&components::Transform::default()));
                        world.set(entity, components.position, components::encode(&Position::default()));
                        world.set(entity, components.rotation, components::encode(&components::Rotation::default()));
                        world.set(entity, components.velocity, components::encode(&Velocity::default()));
                        entities.push(entity);
                    }
                    world.merge();
                    (world, entities)
                },
                |(world, entities)| {
                    for entity in entities {
                        world.despawn(entity);
                    }
                    world.merge();
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// =============================================================================
// Criterion Configuration
// =============================================================================

criterion_group!(
    benches,
    bench_spawn,
    bench_simple_iter,
    bench_fragmented_iter,
    bench_add_remove,
    bench_despawn,
);

criterion_main!(benches);
