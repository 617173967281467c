//! Singleton component storage (§4.9 supplement).
//!
//! A singleton is a component value that exists exactly once per world,
//! independent of any entity. Signature columns sourced with `$.` (§4.3,
//! [`crate::ecs::signature::ElementKind::Singleton`]) read from here instead
//! of from a table.

use dashmap::DashMap;

use crate::ecs::component;

/// The world's singleton side table: one optional byte buffer per component
/// id, set and read directly rather than through an entity.
#[derive(Default)]
pub struct Singletons {
    values: DashMap<component::Id, Vec<u8>>,
}

impl Singletons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite (or create) the value stored for `component`.
    pub fn set(&self, component: component::Id, data: Vec<u8>) {
        self.values.insert(component, data);
    }

    /// Whether a value has ever been set for `component`.
    pub fn contains(&self, component: component::Id) -> bool {
        self.values.contains_key(&component)
    }

    /// A copy of the bytes currently stored for `component`, if any.
    pub fn get(&self, component: component::Id) -> Option<Vec<u8>> {
        self.values.get(&component).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, component: component::Id) {
        self.values.remove(&component);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        // Given
        let singletons = Singletons::new();
        let fps = component::Id::new(1);

        // When
        singletons.set(fps, vec![60, 0, 0, 0]);

        // Then
        assert!(singletons.contains(fps));
        assert_eq!(singletons.get(fps), Some(vec![60, 0, 0, 0]));
    }

    #[test]
    fn unset_singleton_is_absent() {
        // Given
        let singletons = Singletons::new();

        // Then
        assert!(!singletons.contains(component::Id::new(2)));
        assert_eq!(singletons.get(component::Id::new(2)), None);
    }
}
