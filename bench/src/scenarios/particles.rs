//! Particle system benchmark scenario.
//!
//! Simulates a high-volume particle system with:
//! - tens of thousands of particles
//! - Simple components: Position, Velocity, Lifetime, Color, Size
//! - Systems: movement, fade, lifetime decay, despawn-and-respawn dead particles
//!
//! This scenario tests:
//! - High entity count iteration performance
//! - Simple component access patterns
//! - Entity spawn/despawn throughput (particles dying and respawning)

use std::sync::Mutex;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use lattice::ecs::system::Phase;
use lattice::World;

use crate::components::{self, Color, ComponentSet, Lifetime, Position, Size, Velocity};
use crate::scenarios::Scenario;

/// Configuration for the particle benchmark.
pub struct ParticleConfig {
    /// Total number of particles to maintain.
    pub particle_count: usize,
    /// Simulated delta time per frame.
    pub delta_time: f32,
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Worker thread count handed to [`lattice::ecs::world::Config`].
    pub executor_threads: usize,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            particle_count: 100_000,
            delta_time: 1.0 / 60.0,
            seed: 12345,
            executor_threads: 4,
        }
    }
}

fn random_particle(rng: &mut ChaCha8Rng) -> (Position, Velocity, Lifetime, Color, Size) {
    let pos = Position {
        x: rng.gen_range(-100.0..100.0),
        y: rng.gen_range(-100.0..100.0),
        z: rng.gen_range(-100.0..100.0),
    };
    let vel = Velocity {
        x: rng.gen_range(-10.0..10.0),
        y: rng.gen_range(-10.0..10.0),
        z: rng.gen_range(-10.0..10.0),
    };
    let lifetime = Lifetime {
        remaining: rng.gen_range(1.0..5.0),
        total: 5.0,
    };
    let color = Color {
        r: rng.gen_range(0.0..1.0),
        g: rng.gen_range(0.0..1.0),
        b: rng.gen_range(0.0..1.0),
        a: 1.0,
    };
    let size = Size {
        width: rng.gen_range(0.1..2.0),
        height: rng.gen_range(0.1..2.0),
    };
    (pos, vel, lifetime, color, size)
}

/// Particle system benchmark scenario.
pub struct ParticleScenario {
    config: ParticleConfig,
    world: World,
    components: Option<ComponentSet>,
}

impl ParticleScenario {
    pub fn new() -> Self {
        Self::with_config(ParticleConfig::default())
    }

    pub fn with_config(config: ParticleConfig) -> Self {
        let world = World::new(lattice::ecs::world::Config {
            thread_count: config.executor_threads,
            ..Default::default()
        });
        Self { config, world, components: None }
    }

    fn spawn_particle(&self, components: &ComponentSet, rng: &mut ChaCha8Rng) {
        let (pos, vel, lifetime, color, size) = random_particle(rng);
        let entity = self.world.spawn();
        self.world.set(entity, components.position, components::encode(&pos));
        self.world.set(entity, components.velocity, components::encode(&vel));
        self.world.set(entity, components.lifetime, components::encode(&lifetime));
        self.world.set(entity, components.color, components::encode(&color));
        self.world.set(entity, components.size, components::encode(&size));
        self.world.set(entity, components.particle, Vec::new());
    }

    /// Current number of live particles.
    pub fn current_count(&self) -> usize {
        let mut count = 0;
        self.world.types().for_each_table(|_, table| count += table.len());
        count
    }
}

impl Default for ParticleScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for ParticleScenario {
    fn name(&self) -> &'static str {
        "particles"
    }

    fn description(&self) -> &'static str {
        "High-volume particle system with movement, lifetime, and respawn"
    }

    fn entity_count(&self) -> usize {
        self.config.particle_count
    }

    fn setup(&mut self) {
        let components = ComponentSet::register(&self.world);
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        for _ in 0..self.config.particle_count {
            self.spawn_particle(&components, &mut rng);
        }
        self.world.merge();

        self.world
            .add_system("Position, Velocity", Phase::OnUpdate, 0.0, move |_, rows| {
                for i in 0..rows.entities.len() {
                    unsafe {
                        let pos_ptr = rows.columns[0].ptr.add(i * rows.columns[0].stride);
                        let vel_ptr = rows.columns[1].ptr.add(i * rows.columns[1].stride);
                        let vel: Velocity = components::read(vel_ptr);
                        let mut pos: Position = components::read(pos_ptr);
                        pos.x += vel.x * rows.delta_time;
                        pos.y += vel.y * rows.delta_time;
                        pos.z += vel.z * rows.delta_time;
                        components::write(pos_ptr, &pos);
                    }
                }
            })
            .unwrap();

        self.world
            .add_system("Lifetime, Color", Phase::OnUpdate, 0.0, move |_, rows| {
                for i in 0..rows.entities.len() {
                    unsafe {
                        let life_ptr = rows.columns[0].ptr.add(i * rows.columns[0].stride);
                        let color_ptr = rows.columns[1].ptr.add(i * rows.columns[1].stride);
                        let life: Lifetime = components::read(life_ptr);
                        let mut color: Color = components::read(color_ptr);
                        color.a = (life.remaining / life.total).max(0.0);
                        components::write(color_ptr, &color);
                    }
                }
            })
            .unwrap();

        let rng = Mutex::new(ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(1)));
        let position_id = components.position;
        let velocity_id = components.velocity;
        let lifetime_id = components.lifetime;
        let color_id = components.color;
        let size_id = components.size;
        let particle_id = components.particle;
        self.world
            .add_system("Lifetime", Phase::OnUpdate, 0.0, move |handle, rows| {
                let mut rng = rng.lock().expect("particle rng poisoned");
                for i in 0..rows.entities.len() {
                    let life_ptr = unsafe { rows.columns[0].ptr.add(i * rows.columns[0].stride) };
                    let mut life: Lifetime = unsafe { components::read(life_ptr) };
                    life.remaining -= rows.delta_time;
                    if life.remaining <= 0.0 {
                        handle.stage().despawn(rows.entities[i]);
                        let (pos, vel, new_life, color, size) = random_particle(&mut rng);
                        // Ids are never reused (§3), so a respawn allocates a
                        // fresh one rather than recycling the despawned id.
                        let fresh = handle.world().allocate();
                        handle.stage().spawn(fresh);
                        handle.stage().write(fresh, position_id, components::encode(&pos));
                        handle.stage().write(fresh, velocity_id, components::encode(&vel));
                        handle.stage().write(fresh, lifetime_id, components::encode(&new_life));
                        handle.stage().write(fresh, color_id, components::encode(&color));
                        handle.stage().write(fresh, size_id, components::encode(&size));
                        handle.stage().write(fresh, particle_id, Vec::new());
                    } else {
                        unsafe { components::write(life_ptr, &life) };
                    }
                }
            })
            .unwrap();

        self.components = Some(components);
    }

    fn update(&mut self) {
        self.world.update(self.config.delta_time);
    }

    fn teardown(&mut self) {
        let mut live = Vec::new();
        self.world.types().for_each_table(|_, table| live.extend_from_slice(table.entities()));
        for entity in live {
            self.world.despawn(entity);
        }
        self.world.merge();
    }
}
