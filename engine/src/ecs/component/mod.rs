//! Component registration.
//!
//! Per §3/§4.1, a component id is just an entity id with a descriptor
//! attached — there is no separate component namespace. This module owns
//! that descriptor side-table and the handful of builtin components the
//! world reserves at startup (see [`crate::ecs::world::World::new`]).

mod descriptor;
mod registry;

pub use descriptor::Descriptor;
pub use registry::Registry;

/// A component (or prefab, or singleton) identifier. Aliased to
/// [`entity::Id`](crate::ecs::entity::Id) because components are entities.
pub type Id = crate::ecs::entity::Id;
