//! The handle a system callback receives (§9 "Global state").
//!
//! The original design dispatches on a 32-bit magic number at the front of
//! an opaque pointer to tell a world handle from a worker-thread handle
//! apart. That only exists to avoid passing an extra parameter through a C
//! call boundary; in Rust there is no such boundary; a worker's handle really
//! is just `(world, stage)` pair (§9), so we spell that out as a sum type and
//! pass it explicitly everywhere a callback needs it.

use crate::ecs::stage::Stage;
use crate::ecs::world::World;

/// What a system callback operates against: either the world directly (main
/// stage, inline execution) or a specific worker's stage during parallel
/// execution.
#[derive(Clone, Copy)]
pub enum Handle<'w> {
    Main(&'w World),
    Worker(&'w World, &'w Stage),
}

impl<'w> Handle<'w> {
    /// The world this handle ultimately reads through.
    #[inline]
    pub fn world(&self) -> &'w World {
        match self {
            Handle::Main(world) => world,
            Handle::Worker(world, _) => world,
        }
    }

    /// The stage structural mutations issued through this handle should be
    /// buffered into.
    #[inline]
    pub fn stage(&self) -> &'w Stage {
        match self {
            Handle::Main(world) => world.main_stage(),
            Handle::Worker(_, stage) => stage,
        }
    }
}
