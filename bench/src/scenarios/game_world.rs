//! A mixed game-world benchmark scenario.
//!
//! Simulates a typical small-scale game with multiple entity archetypes:
//! - NPCs with AI, position, velocity, health
//! - Players with position, velocity, health, team
//! - Projectiles with position, velocity, lifetime
//! - Static entities with just position (scenery, triggers)
//!
//! Systems: AI decision-making, movement, projectile lifetime, and cleanup of
//! dead/expired entities.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use lattice::ecs::entity;
use lattice::ecs::system::Phase;
use lattice::World;

use crate::components::{self, AiState, ComponentSet, Health, Lifetime, Position, Team, Velocity};
use crate::scenarios::Scenario;

/// Configuration for the mixed game-world benchmark.
pub struct GameWorldConfig {
    pub npc_count: usize,
    pub player_count: usize,
    pub projectile_count: usize,
    pub static_count: usize,
    pub delta_time: f32,
    pub seed: u64,
    pub executor_threads: usize,
}

impl Default for GameWorldConfig {
    fn default() -> Self {
        Self {
            npc_count: 5_000,
            player_count: 16,
            projectile_count: 2_000,
            static_count: 1_000,
            delta_time: 1.0 / 60.0,
            seed: 42,
            executor_threads: 4,
        }
    }
}

/// A mixed game-world benchmark scenario.
pub struct GameWorldScenario {
    config: GameWorldConfig,
    world: World,
    rng: ChaCha8Rng,
    components: Option<ComponentSet>,
}

impl GameWorldScenario {
    pub fn new() -> Self {
        Self::with_config(GameWorldConfig::default())
    }

    pub fn with_config(config: GameWorldConfig) -> Self {
        let world = World::new(lattice::ecs::world::Config {
            thread_count: config.executor_threads,
            ..Default::default()
        });
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self { config, world, rng, components: None }
    }

    fn spawn_npc(&mut self, components: &ComponentSet) -> entity::Id {
        let pos = Position {
            x: self.rng.gen_range(-500.0..500.0),
            y: self.rng.gen_range(-500.0..500.0),
            z: 0.0,
        };
        let vel = Velocity { x: 0.0, y: 0.0, z: 0.0 };
        let ai = AiState {
            state: 0,
            timer: self.rng.gen_range(0.0..2.0),
            target_x: self.rng.gen_range(-500.0..500.0),
            target_y: self.rng.gen_range(-500.0..500.0),
        };
        let health = Health { current: 100.0, max: 100.0 };

        let entity = self.world.spawn();
        self.world.set(entity, components.position, components::encode(&pos));
        self.world.set(entity, components.velocity, components::encode(&vel));
        self.world.set(entity, components.ai_state, components::encode(&ai));
        self.world.set(entity, components.health, components::encode(&health));
        entity
    }

    fn spawn_player(&mut self, components: &ComponentSet) -> entity::Id {
        let pos = Position {
            x: self.rng.gen_range(-100.0..100.0),
            y: self.rng.gen_range(-100.0..100.0),
            z: 0.0,
        };
        let vel = Velocity { x: 0.0, y: 0.0, z: 0.0 };
        let health = Health { current: 100.0, max: 100.0 };
        let team = Team { id: self.rng.gen_range(0..2) };

        let entity = self.world.spawn();
        self.world.set(entity, components.position, components::encode(&pos));
        self.world.set(entity, components.velocity, components::encode(&vel));
        self.world.set(entity, components.health, components::encode(&health));
        self.world.set(entity, components.team, components::encode(&team));
        entity
    }

    fn spawn_projectile(&mut self, components: &ComponentSet) -> entity::Id {
        let pos = Position {
            x: self.rng.gen_range(-500.0..500.0),
            y: self.rng.gen_range(-500.0..500.0),
            z: 0.0,
        };
        let vel = Velocity {
            x: self.rng.gen_range(-50.0..50.0),
            y: self.rng.gen_range(-50.0..50.0),
            z: 0.0,
        };
        let lifetime = Lifetime { remaining: 3.0, total: 3.0 };

        let entity = self.world.spawn();
        self.world.set(entity, components.position, components::encode(&pos));
        self.world.set(entity, components.velocity, components::encode(&vel));
        self.world.set(entity, components.lifetime, components::encode(&lifetime));
        self.world.set(entity, components.projectile, Vec::new());
        entity
    }

    fn spawn_static(&mut self, components: &ComponentSet) -> entity::Id {
        let pos = Position {
            x: self.rng.gen_range(-1000.0..1000.0),
            y: self.rng.gen_range(-1000.0..1000.0),
            z: 0.0,
        };
        let entity = self.world.spawn();
        self.world.set(entity, components.position, components::encode(&pos));
        entity
    }

    pub fn total_count(&self) -> usize {
        self.config.npc_count + self.config.player_count + self.config.projectile_count + self.config.static_count
    }

    pub fn current_count(&self) -> usize {
        let mut count = 0;
        self.world.types().for_each_table(|_, table| count += table.len());
        count
    }
}

impl Default for GameWorldScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for GameWorldScenario {
    fn name(&self) -> &'static str {
        "game_world"
    }

    fn description(&self) -> &'static str {
        "Mixed NPC/player/projectile/static game world with AI, movement, and cleanup"
    }

    fn entity_count(&self) -> usize {
        self.total_count()
    }

    fn setup(&mut self) {
        let components = ComponentSet::register(&self.world);

        for _ in 0..self.config.npc_count {
            self.spawn_npc(&components);
        }
        for _ in 0..self.config.player_count {
            self.spawn_player(&components);
        }
        for _ in 0..self.config.projectile_count {
            self.spawn_projectile(&components);
        }
        for _ in 0..self.config.static_count {
            self.spawn_static(&components);
        }
        self.world.merge();

        // AI: wander toward a target, picking a new one once arrived.
        self.world
            .add_system("AiState, Position, Velocity", Phase::OnUpdate, 0.0, move |_, rows| {
                for i in 0..rows.entities.len() {
                    unsafe {
                        let ai_ptr = rows.columns[0].ptr.add(i * rows.columns[0].stride);
                        let pos_ptr = rows.columns[1].ptr.add(i * rows.columns[1].stride);
                        let vel_ptr = rows.columns[2].ptr.add(i * rows.columns[2].stride);

                        let mut ai: AiState = components::read(ai_ptr);
                        let pos: Position = components::read(pos_ptr);

                        let dx = ai.target_x - pos.x;
                        let dy = ai.target_y - pos.y;
                        let distance = (dx * dx + dy * dy).sqrt();

                        let vel = if distance < 1.0 {
                            ai.timer -= rows.delta_time;
                            Velocity { x: 0.0, y: 0.0, z: 0.0 }
                        } else {
                            let speed = 20.0;
                            Velocity { x: dx / distance * speed, y: dy / distance * speed, z: 0.0 }
                        };

                        components::write(ai_ptr, &ai);
                        components::write(vel_ptr, &vel);
                    }
                }
            })
            .unwrap();

        // Movement: integrate velocity into position for anything that has both.
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
                        components::write(pos_ptr, &pos);
                    }
                }
            })
            .unwrap();

        // Projectile lifetime decay and expiry cleanup.
        self.world
            .add_system("Lifetime, Projectile", Phase::OnUpdate, 0.0, move |handle, rows| {
                for i in 0..rows.entities.len() {
                    let life_ptr = unsafe { rows.columns[0].ptr.add(i * rows.columns[0].stride) };
                    let mut life: Lifetime = unsafe { components::read(life_ptr) };
                    life.remaining -= rows.delta_time;
                    if life.remaining <= 0.0 {
                        handle.stage().despawn(rows.entities[i]);
                    } else {
                        unsafe { components::write(life_ptr, &life) };
                    }
                }
            })
            .unwrap();

        // Cleanup: despawn anything whose health has dropped to zero.
        self.world
            .add_system("Health", Phase::PostUpdate, 0.0, move |handle, rows| {
                for i in 0..rows.entities.len() {
                    let health_ptr = unsafe { rows.columns[0].ptr.add(i * rows.columns[0].stride) };
                    let health: Health = unsafe { components::read(health_ptr) };
                    if health.current <= 0.0 {
                        handle.stage().despawn(rows.entities[i]);
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
