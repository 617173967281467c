//! The entity index: a total map from entity id to its storage location.
//!
//! Entity ids are typically dense with local clustering (entities spawned
//! together get consecutive ids), so a block-sparse structure beats a
//! general hash map both on lookup speed and on cache locality: it only
//! allocates a block once an id within it is actually used, but within an
//! allocated block lookups are a single indexed `Vec` access.

use crate::ecs::storage::Location;

/// A type whose instances can report an index for use in [`Index`].
pub trait SparseId: Copy {
    /// The dense index this id maps to.
    fn index(&self) -> usize;
}

/// Block-sparse map from a [`SparseId`] to a [`Location`].
///
/// # Example
///
/// ```ignore
/// let mut index = Index::new();
/// index.insert(entity, Location::new(type_id, Row::new(0)));
/// assert_eq!(index.get(entity), Some(Location::new(type_id, Row::new(0))));
/// ```
#[derive(Debug)]
pub struct Index {
    block_size: usize,
    blocks: Vec<Option<Vec<Option<Location>>>>,
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

impl Index {
    /// Balanced for typical entity spawn patterns: dense enough to avoid
    /// excessive block count, small enough to keep memory bounded when ids
    /// are sparse.
    pub const DEFAULT_BLOCK_SIZE: usize = 256;

    /// Create a new, empty index using the default block size.
    #[inline]
    pub fn new() -> Self {
        Self::with_block_size(Self::DEFAULT_BLOCK_SIZE)
    }

    /// Create a new, empty index with a custom block size.
    pub fn with_block_size(block_size: usize) -> Self {
        assert!(block_size > 0, "block_size must be greater than 0");
        Self {
            block_size,
            blocks: Vec::new(),
        }
    }

    fn indices(&self, id: impl SparseId) -> (usize, usize) {
        let index = id.index();
        (index / self.block_size, index % self.block_size)
    }

    /// Insert (or overwrite) the location for `id`.
    pub fn insert(&mut self, id: impl SparseId, location: Location) {
        let (block_index, within) = self.indices(id);
        if block_index >= self.blocks.len() {
            self.blocks.resize_with(block_index + 1, || None);
        }
        let block = self.blocks[block_index].get_or_insert_with(|| vec![None; self.block_size]);
        if within >= block.len() {
            block.resize(within + 1, None);
        }
        block[within] = Some(location);
    }

    /// Look up the location for `id`, if present.
    #[inline]
    pub fn get(&self, id: impl SparseId) -> Option<Location> {
        let (block_index, within) = self.indices(id);
        self.blocks
            .get(block_index)?
            .as_ref()?
            .get(within)
            .copied()
            .flatten()
    }

    /// Remove and return the location for `id`, if present.
    pub fn remove(&mut self, id: impl SparseId) -> Option<Location> {
        let (block_index, within) = self.indices(id);
        let block = self.blocks.get_mut(block_index)?.as_mut()?;
        block.get_mut(within)?.take()
    }

    /// Whether `id` is present in the index.
    #[inline]
    pub fn contains(&self, id: impl SparseId) -> bool {
        self.get(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{entity, storage::Row, type_registry::TypeId};

    #[test]
    fn insert_and_get_round_trips() {
        // Given
        let mut index = Index::new();
        let e = entity::Id::new(42);
        let location = Location::new(TypeId::new(3), Row::new(1));

        // When
        index.insert(e, location);

        // Then
        assert_eq!(index.get(e), Some(location));
        assert!(index.contains(e));
    }

    #[test]
    fn missing_entry_is_none() {
        // Given
        let index = Index::new();

        // Then
        assert_eq!(index.get(entity::Id::new(7)), None);
    }

    #[test]
    fn remove_clears_the_entry() {
        // Given
        let mut index = Index::new();
        let e = entity::Id::new(300); // lands in a different block than id 0
        index.insert(e, Location::new(TypeId::new(0), Row::new(0)));

        // When
        let removed = index.remove(e);

        // Then
        assert!(removed.is_some());
        assert_eq!(index.get(e), None);
    }

    #[test]
    fn sparse_ids_do_not_allocate_unrelated_blocks() {
        // Given
        let mut index = Index::with_block_size(16);

        // When
        index.insert(entity::Id::new(1000), Location::new(TypeId::new(0), Row::new(0)));

        // Then
        assert_eq!(index.get(entity::Id::new(1)), None);
    }
}
