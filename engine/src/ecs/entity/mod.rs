//! Entity identity and allocation.
//!
//! An [`Id`] is an opaque 64-bit handle. Unlike the generation-recycling
//! allocator a compile-time ECS typically uses, this spec requires ids to
//! never be reused within a world's lifetime (§3) — components are
//! themselves entities, so an id silently coming back into use would let a
//! stale reference to a dead component collide with a freshly spawned one.
//! [`Allocator`] is therefore a bare monotonic counter, not a free-list.

pub mod index;

pub use index::Index;

use std::sync::atomic::{AtomicU64, Ordering};

/// An opaque entity identifier. Components, prefabs, and systems are all
/// entities, so this same type identifies all of them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u64);

impl Id {
    /// Construct an `Id` from a raw value.
    ///
    /// Only meant for tests and for the builtin ids the world reserves at
    /// construction (see [`crate::ecs::world::World::new`]).
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw numeric value of this id.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The index of this id for use in indexable/sparse storage.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u64> for Id {
    #[inline]
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl index::SparseId for Id {
    #[inline]
    fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Issues monotonically increasing entity identifiers.
///
/// There is one allocator per world. It never recycles ids: once issued, an
/// id is never handed out again, even after the entity it named is despawned
/// (§3 "never reused within a world's lifetime").
#[derive(Debug, Default)]
pub struct Allocator {
    next: AtomicU64,
}

impl Allocator {
    /// Create a new allocator. The first id it issues is `0`.
    #[inline]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Reserve and return the next id. Safe to call concurrently from
    /// multiple threads (e.g. worker stages spawning entities in parallel).
    #[inline]
    pub fn alloc(&self) -> Id {
        Id(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Skip ahead so the next allocated id is at least `id + 1`.
    ///
    /// Used at world construction to reserve ids for builtin components
    /// without the allocator itself needing to know about them.
    pub fn reserve_through(&self, id: Id) {
        let floor = id.0.wrapping_add(1);
        self.next.fetch_max(floor, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_is_monotonic_and_never_repeats() {
        // Given
        let allocator = Allocator::new();

        // When
        let a = allocator.alloc();
        let b = allocator.alloc();
        let c = allocator.alloc();

        // Then
        assert_eq!(a, Id::new(0));
        assert_eq!(b, Id::new(1));
        assert_eq!(c, Id::new(2));
    }

    #[test]
    fn reserve_through_moves_the_floor_forward_only() {
        // Given
        let allocator = Allocator::new();
        allocator.alloc(); // consumes id 0

        // When
        allocator.reserve_through(Id::new(5));
        let next = allocator.alloc();

        // Then
        assert_eq!(next, Id::new(6));

        // And reserving backwards has no effect.
        allocator.reserve_through(Id::new(0));
        assert_eq!(allocator.alloc(), Id::new(7));
    }
}
