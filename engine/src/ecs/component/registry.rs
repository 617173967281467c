use dashmap::{DashMap, DashSet};

use crate::ecs::component::{Descriptor, Id};

/// Thread-safe registry of component descriptors and prefab markers.
///
/// Reads are lock-free (`DashMap`/`DashSet` sharded reads); writes only ever
/// happen once, when a component or prefab entity is declared, so the rare
/// write path does not need to be fast.
#[derive(Default)]
pub struct Registry {
    descriptors: DashMap<Id, Descriptor>,
    prefabs: DashSet<Id>,
}

impl Registry {
    /// Create an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `id` as a component with the given byte size.
    ///
    /// Idempotent: declaring the same id twice with the same size is a
    /// no-op; declaring it with a different size overwrites the descriptor
    /// (the caller — `World::component`, which always mints a fresh entity —
    /// is the only place this happens in practice).
    pub fn declare_component(&self, id: Id, size: u32) {
        self.descriptors.insert(id, Descriptor::new(size));
    }

    /// Declare `id` as a prefab (a template entity referenced by signature
    /// sources other than `Self`).
    pub fn declare_prefab(&self, id: Id) {
        self.prefabs.insert(id);
    }

    /// Get the descriptor for a registered component, if any.
    #[inline]
    pub fn descriptor(&self, id: Id) -> Option<Descriptor> {
        self.descriptors.get(&id).map(|entry| *entry.value())
    }

    /// Whether `id` denotes a registered component.
    #[inline]
    pub fn is_component(&self, id: Id) -> bool {
        self.descriptors.contains_key(&id)
    }

    /// Whether `id` denotes a declared prefab.
    #[inline]
    pub fn is_prefab(&self, id: Id) -> bool {
        self.prefabs.contains(&id)
    }

    /// Whether `id` denotes either a component or a prefab — the only two
    /// things a type id's sequence may legally contain (§4.1).
    #[inline]
    pub fn is_component_or_prefab(&self, id: Id) -> bool {
        self.is_component(id) || self.is_prefab(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_component_is_recognized() {
        // Given
        let registry = Registry::new();
        let position = Id::new(1);

        // When
        registry.declare_component(position, 8);

        // Then
        assert!(registry.is_component(position));
        assert!(registry.is_component_or_prefab(position));
        assert_eq!(registry.descriptor(position).unwrap().size(), 8);
    }

    #[test]
    fn declared_prefab_is_recognized_but_has_no_descriptor() {
        // Given
        let registry = Registry::new();
        let template = Id::new(2);

        // When
        registry.declare_prefab(template);

        // Then
        assert!(registry.is_prefab(template));
        assert!(!registry.is_component(template));
        assert!(registry.is_component_or_prefab(template));
        assert_eq!(registry.descriptor(template), None);
    }

    #[test]
    fn unregistered_id_is_neither() {
        // Given
        let registry = Registry::new();

        // Then
        assert!(!registry.is_component_or_prefab(Id::new(99)));
    }
}
