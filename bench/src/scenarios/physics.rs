//! Physics simulation benchmark scenario.
//!
//! Simulates a physics-heavy workload with:
//! - tens of thousands of rigid bodies
//! - Position, Velocity, Acceleration integration
//! - Transform matrix updates derived from position/rotation
//! - A boundary system that reflects bodies off a fixed bounding box
//!
//! This scenario tests iteration over wider rows (four components per body)
//! and heavier per-row math than the particle scenario.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use lattice::ecs::entity;
use lattice::ecs::system::Phase;
use lattice::World;

use crate::components::{self, Acceleration, ComponentSet, Position, Rotation, Transform, Velocity};
use crate::scenarios::Scenario;

const BOUNDARY: f32 = 1000.0;

/// Configuration for the physics benchmark.
pub struct PhysicsConfig {
    pub body_count: usize,
    pub delta_time: f32,
    pub seed: u64,
    pub executor_threads: usize,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            body_count: 50_000,
            delta_time: 1.0 / 60.0,
            seed: 7,
            executor_threads: 4,
        }
    }
}

/// Physics simulation benchmark scenario.
pub struct PhysicsScenario {
    config: PhysicsConfig,
    world: World,
    rng: ChaCha8Rng,
    bodies: Vec<entity::Id>,
    components: Option<ComponentSet>,
}

impl PhysicsScenario {
    pub fn new() -> Self {
        Self::with_config(PhysicsConfig::default())
    }

    pub fn with_config(config: PhysicsConfig) -> Self {
        let world = World::new(lattice::ecs::world::Config {
            thread_count: config.executor_threads,
            ..Default::default()
        });
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self { config, world, rng, bodies: Vec::new(), components: None }
    }

    fn spawn_body(&mut self, components: &ComponentSet) -> entity::Id {
        let pos = Position {
            x: self.rng.gen_range(-BOUNDARY..BOUNDARY),
            y: self.rng.gen_range(-BOUNDARY..BOUNDARY),
            z: self.rng.gen_range(-BOUNDARY..BOUNDARY),
        };
        let vel = Velocity {
            x: self.rng.gen_range(-20.0..20.0),
            y: self.rng.gen_range(-20.0..20.0),
            z: self.rng.gen_range(-20.0..20.0),
        };
        let acc = Acceleration { x: 0.0, y: -9.8, z: 0.0 };
        let rot = Rotation { x: 0.0, y: 0.0, z: 0.0 };
        let transform = Transform::default();

        let entity = self.world.spawn();
        self.world.set(entity, components.position, components::encode(&pos));
        self.world.set(entity, components.velocity, components::encode(&vel));
        self.world.set(entity, components.acceleration, components::encode(&acc));
        self.world.set(entity, components.rotation, components::encode(&rot));
        self.world.set(entity, components.transform, components::encode(&transform));
        entity
    }

    pub fn body_count(&self) -> usize {
        self.config.body_count
    }

    pub fn current_count(&self) -> usize {
        let mut count = 0;
        self.world.types().for_each_table(|_, table| count += table.len());
        count
    }
}

impl Default for PhysicsScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for PhysicsScenario {
    fn name(&self) -> &'static str {
        "physics"
    }

    fn description(&self) -> &'static str {
        "Rigid-body integration with acceleration, velocity, transforms, and boundary reflection"
    }

    fn entity_count(&self) -> usize {
        self.config.body_count
    }

    fn setup(&mut self) {
        let components = ComponentSet::register(&self.world);

        self.bodies = (0..self.config.body_count).map(|_| self.spawn_body(&components)).collect();
        self.world.merge();

        // Integrate acceleration into velocity.
        self.world
            .add_system("Velocity, Acceleration", Phase::OnUpdate, 0.0, move |_, rows| {
                for i in 0..rows.entities.len() {
                    unsafe {
                        let vel_ptr = rows.columns[0].ptr.add(i * rows.columns[0].stride);
                        let acc_ptr = rows.columns[1].ptr.add(i * rows.columns[1].stride);
                        let acc: Acceleration = components::read(acc_ptr);
                        let mut vel: Velocity = components::read(vel_ptr);
                        vel.x += acc.x * rows.delta_time;
                        vel.y += acc.y * rows.delta_time;
                        vel.z += acc.z * rows.delta_time;
                        components::write(vel_ptr, &vel);
                    }
                }
            })
            .unwrap();

        // Integrate velocity into position.
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

        // Derive a translation-only transform matrix from position. A real
        // renderer would also fold in rotation; this keeps the matrix math
        // representative without duplicating a full 3D math library.
        self.world
            .add_system("Transform, Position", Phase::OnUpdate, 0.0, move |_, rows| {
                for i in 0..rows.entities.len() {
                    unsafe {
                        let transform_ptr = rows.columns[0].ptr.add(i * rows.columns[0].stride);
                        let pos_ptr = rows.columns[1].ptr.add(i * rows.columns[1].stride);
                        let pos: Position = components::read(pos_ptr);
                        let mut transform: Transform = components::read(transform_ptr);
                        transform.matrix[3][0] = pos.x;
                        transform.matrix[3][1] = pos.y;
                        transform.matrix[3][2] = pos.z;
                        components::write(transform_ptr, &transform);
                    }
                }
            })
            .unwrap();

        // Reflect bodies off a fixed bounding box.
        self.world
            .add_system("Position, Velocity", Phase::PostUpdate, 0.0, move |_, rows| {
                for i in 0..rows.entities.len() {
                    unsafe {
                        let pos_ptr = rows.columns[0].ptr.add(i * rows.columns[0].stride);
                        let vel_ptr = rows.columns[1].ptr.add(i * rows.columns[1].stride);
                        let mut pos: Position = components::read(pos_ptr);
                        let mut vel: Velocity = components::read(vel_ptr);

                        if pos.x.abs() > BOUNDARY {
                            pos.x = pos.x.clamp(-BOUNDARY, BOUNDARY);
                            vel.x = -vel.x;
                        }
                        if pos.y.abs() > BOUNDARY {
                            pos.y = pos.y.clamp(-BOUNDARY, BOUNDARY);
                            vel.y = -vel.y;
                        }
                        if pos.z.abs() > BOUNDARY {
                            pos.z = pos.z.clamp(-BOUNDARY, BOUNDARY);
                            vel.z = -vel.z;
                        }

                        components::write(pos_ptr, &pos);
                        components::write(vel_ptr, &vel);
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
        for entity in self.bodies.drain(..) {
            self.world.despawn(entity);
        }
        self.world.merge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physics_scenario_setup_spawns_every_body() {
        let mut scenario = PhysicsScenario::with_config(PhysicsConfig {
            body_count: 50,
            executor_threads: 0,
            ..Default::default()
        });

        scenario.setup();
        assert_eq!(scenario.current_count(), 50);

        scenario.teardown();
        assert_eq!(scenario.current_count(), 0);
    }

    #[test]
    fn physics_scenario_runs_frames_without_panicking() {
        let mut scenario = PhysicsScenario::with_config(PhysicsConfig {
            body_count: 50,
            executor_threads: 0,
            ..Default::default()
        });

        scenario.setup();
        for _ in 0..30 {
            scenario.update();
        }
        scenario.teardown();
    }
}
