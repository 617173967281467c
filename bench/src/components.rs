//! Common component types used across benchmarks, plus the byte encode/decode
//! glue the runtime's raw-byte columns require (`lattice::ecs::storage::Column`
//! stores plain bytes, not a typed `Vec<T>`).
//!
//! These components are designed to be representative of real game components
//! in terms of size and access patterns.

use std::mem::size_of;

/// Encode a `Copy` value into the bytes a component column stores it as.
pub fn encode<T: Copy>(value: &T) -> Vec<u8> {
    let ptr = value as *const T as *const u8;
    unsafe { std::slice::from_raw_parts(ptr, size_of::<T>()) }.to_vec()
}

/// Decode a component column's bytes back into `T`. `bytes` must be exactly
/// `size_of::<T>()` long, which the engine itself guarantees for any column
/// fetched by a signature declaring `T`'s registered size.
pub fn decode<T: Copy>(bytes: &[u8]) -> T {
    debug_assert_eq!(bytes.len(), size_of::<T>());
    unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const T) }
}

/// Overwrite a component column's bytes in place from a `Copy` value, without
/// an intermediate `Vec` allocation. Used inside system callbacks, which
/// receive a raw `*mut u8` per row rather than a `&mut Vec<u8>`.
///
/// # Safety
/// `ptr` must point to at least `size_of::<T>()` writable bytes.
pub unsafe fn write<T>(ptr: *mut u8, value: &T)
where
    T: Copy,
{
    std::ptr::copy_nonoverlapping(value as *const T as *const u8, ptr, size_of::<T>());
}

/// Read a `Copy` value directly out of a raw column pointer, without an
/// intermediate `Vec`.
///
/// # Safety
/// `ptr` must point to at least `size_of::<T>()` readable, well-aligned-or-not
/// (this uses an unaligned read) bytes of a valid `T`.
pub unsafe fn read<T: Copy>(ptr: *const u8) -> T {
    std::ptr::read_unaligned(ptr as *const T)
}

// =============================================================================
// Transform Components (common in most games)
// =============================================================================

/// 3D position component (12 bytes).
#[derive(Clone, Copy, Debug, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// 3D velocity component (12 bytes).
#[derive(Clone, Copy, Debug, Default)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// 3D acceleration component (12 bytes).
#[derive(Clone, Copy, Debug, Default)]
pub struct Acceleration {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Rotation as euler angles (12 bytes).
#[derive(Clone, Copy, Debug, Default)]
pub struct Rotation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// 4x4 transformation matrix (64 bytes).
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub matrix: [[f32; 4]; 4],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            matrix: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }
}

// =============================================================================
// Game Entity Components
// =============================================================================

/// Health component for damageable entities.
#[derive(Clone, Copy, Debug, Default)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

/// Simple AI state component.
#[derive(Clone, Copy, Debug, Default)]
pub struct AiState {
    pub state: u32,
    pub timer: f32,
    pub target_x: f32,
    pub target_y: f32,
}

/// Team/faction identifier.
#[derive(Clone, Copy, Debug, Default)]
pub struct Team {
    pub id: u32,
}

// =============================================================================
// Particle System Components
// =============================================================================

/// Particle lifetime tracking.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lifetime {
    pub remaining: f32,
    pub total: f32,
}

/// RGBA color (16 bytes).
#[derive(Clone, Copy, Debug, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Particle size/scale.
#[derive(Clone, Copy, Debug, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

// =============================================================================
// Fragmentation Test Components (A-Z for archetype fragmentation)
// =============================================================================

/// Shared data component for fragmentation tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct Data {
    pub value: f64,
}

/// A zero-sized marker component, used 26-wide to fragment entities across
/// many archetypes in [`crate::scenarios`] and the micro-benchmarks.
#[derive(Clone, Copy, Debug, Default)]
pub struct Marker;

/// Mints one component id per registered type, against a single [`lattice::World`].
/// Benchmarks declare their component set once via this and pass the ids
/// around, since the runtime has no compile-time type-to-id mapping (§4.1 —
/// component identity is a runtime entity id, not a Rust type).
pub struct ComponentSet {
    pub position: lattice::ecs::component::Id,
    pub velocity: lattice::ecs::component::Id,
    pub acceleration: lattice::ecs::component::Id,
    pub rotation: lattice::ecs::component::Id,
    pub transform: lattice::ecs::component::Id,
    pub health: lattice::ecs::component::Id,
    pub ai_state: lattice::ecs::component::Id,
    pub team: lattice::ecs::component::Id,
    pub projectile: lattice::ecs::component::Id,
    pub particle: lattice::ecs::component::Id,
    pub lifetime: lattice::ecs::component::Id,
    pub color: lattice::ecs::component::Id,
    pub size: lattice::ecs::component::Id,
    pub data: lattice::ecs::component::Id,
    /// 26 zero-sized markers, for fragmented-iteration benchmarks.
    pub markers: [lattice::ecs::component::Id; 26],
}

impl ComponentSet {
    /// Mints one id per component and registers its name, so benchmark
    /// systems can refer to it from signature text (§4.3 names are resolved
    /// through the world's name table, not the Rust type).
    pub fn register(world: &lattice::World) -> Self {
        let set = Self {
            position: world.component(size_of::<Position>() as u32),
            velocity: world.component(size_of::<Velocity>() as u32),
            acceleration: world.component(size_of::<Acceleration>() as u32),
            rotation: world.component(size_of::<Rotation>() as u32),
            transform: world.component(size_of::<Transform>() as u32),
            health: world.component(size_of::<Health>() as u32),
            ai_state: world.component(size_of::<AiState>() as u32),
            team: world.component(size_of::<Team>() as u32),
            projectile: world.component(0),
            particle: world.component(0),
            lifetime: world.component(size_of::<Lifetime>() as u32),
            color: world.component(size_of::<Color>() as u32),
            size: world.component(size_of::<Size>() as u32),
            data: world.component(size_of::<Data>() as u32),
            markers: std::array::from_fn(|_| world.component(0)),
        };

        world.set_name("Position", set.position);
        world.set_name("Velocity", set.velocity);
        world.set_name("Acceleration", set.acceleration);
        world.set_name("Rotation", set.rotation);
        world.set_name("Transform", set.transform);
        world.set_name("Health", set.health);
        world.set_name("AiState", set.ai_state);
        world.set_name("Team", set.team);
        world.set_name("Projectile", set.projectile);
        world.set_name("Particle", set.particle);
        world.set_name("Lifetime", set.lifetime);
        world.set_name("Color", set.color);
        world.set_name("Size", set.size);
        world.set_name("Data", set.data);
        for (i, &marker) in set.markers.iter().enumerate() {
            world.set_name(format!("Marker{i}"), marker);
        }

        set
    }
}
