use std::sync::Arc;

use crate::ecs::{
    component,
    entity::{self},
    storage::{column::Column, row::Row},
    system,
    type_registry::TypeId,
};

/// How a table's active/inactive state changed as a result of an operation.
/// Column systems watching a table need to know this so they can keep
/// their `matched_tables`/`inactive_tables` split in sync (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The table went from empty to non-empty.
    Activated,
    /// The table went from non-empty to empty.
    Deactivated,
    /// No activation boundary was crossed.
    Unchanged,
}

/// Columnar storage for every entity sharing an exact component set.
///
/// One table exists per live [`TypeId`] (§3) — the table's identity *is*
/// its type id, so there is no separate archetype-id namespace to keep in
/// sync with the type registry.
pub struct Table {
    id: TypeId,
    component_ids: Arc<[component::Id]>,
    /// Component id for each entry in `columns`, in the same order. Does not
    /// include the prefab id, if this type has one (§4.2 edge case).
    column_components: Vec<component::Id>,
    columns: Vec<Column>,
    prefab: Option<component::Id>,
    entities: Vec<entity::Id>,
    /// Column systems whose `matched_tables`/`inactive_tables` include this
    /// table. Populated by the matcher at table-creation time and whenever a
    /// new system's signature matches this table (§4.4).
    pub(crate) observers: Vec<system::Id>,
}

impl Table {
    /// Create a new, empty table for `type_id`'s component sequence.
    ///
    /// `component_ids` must already be sorted (the type registry guarantees
    /// this on intern). Any id the registry reports as a prefab gets no
    /// column allocated for it (§4.2).
    pub fn new(
        id: TypeId,
        component_ids: Arc<[component::Id]>,
        components: &component::Registry,
    ) -> Self {
        let mut column_components = Vec::with_capacity(component_ids.len());
        let mut columns = Vec::with_capacity(component_ids.len());
        let mut prefab = None;

        for &cid in component_ids.iter() {
            if components.is_prefab(cid) && prefab.is_none() {
                prefab = Some(cid);
                continue;
            }
            let size = components.descriptor(cid).map(|d| d.size()).unwrap_or(0);
            column_components.push(cid);
            columns.push(Column::new(size));
        }

        Self {
            id,
            component_ids,
            column_components,
            columns,
            prefab,
            entities: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// This table's type id.
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The sorted component id sequence identifying this table's type.
    #[inline]
    pub fn component_ids(&self) -> &[component::Id] {
        &self.component_ids
    }

    /// The prefab id carried by this table's type, if any.
    #[inline]
    pub fn prefab(&self) -> Option<component::Id> {
        self.prefab
    }

    /// The number of rows (entities) in this table.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Whether this table is currently active (has at least one row).
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.entities.is_empty()
    }

    /// The entity ids in this table, indexed by row.
    #[inline]
    pub fn entities(&self) -> &[entity::Id] {
        &self.entities
    }

    /// The offset of `component` within [`Self::columns`], or `None` if this
    /// table's type does not include it.
    #[inline]
    pub fn column_offset(&self, component: component::Id) -> Option<usize> {
        self.column_components.iter().position(|&c| c == component)
    }

    fn column_for(&self, component: component::Id) -> Option<&Column> {
        self.column_offset(component).map(|i| &self.columns[i])
    }

    fn column_for_mut(&mut self, component: component::Id) -> Option<&mut Column> {
        let offset = self.column_offset(component)?;
        Some(&mut self.columns[offset])
    }

    /// Raw column access, by offset, for building system rows views (§4.5).
    #[inline]
    pub fn column_at(&self, offset: usize) -> &Column {
        &self.columns[offset]
    }

    /// Mutable raw column access, by offset. The scheduler uses this to
    /// obtain the strided pointer a column system callback iterates (§4.5);
    /// the lock guarding this table is released before the callback runs.
    #[inline]
    pub fn column_at_mut(&mut self, offset: usize) -> &mut Column {
        &mut self.columns[offset]
    }

    /// Get the raw bytes of `component` for the entity at `row`.
    #[inline]
    pub fn get(&self, row: Row, component: component::Id) -> Option<&[u8]> {
        self.column_for(component).map(|c| c.get(row))
    }

    /// Overwrite the raw bytes of `component` for the entity at `row`.
    ///
    /// Panics if `row`/`component` are not valid for this table; callers are
    /// expected to have just resolved both via the matcher or an insert.
    pub fn set(&mut self, row: Row, component: component::Id, data: &[u8]) {
        self.column_for_mut(component)
            .expect("component not present in table")
            .set(row, data);
    }

    /// Append `entity` as a new row, zero-filling every column. Returns the
    /// row it was inserted at and whether the table's active state flipped.
    pub fn insert(&mut self, entity: entity::Id) -> (Row, Transition) {
        let was_active = self.is_active();
        let row = Row::new(self.entities.len() as u32);
        self.entities.push(entity);
        for column in &mut self.columns {
            column.push_zeroed();
        }
        let transition = if !was_active && self.is_active() {
            Transition::Activated
        } else {
            Transition::Unchanged
        };
        (row, transition)
    }

    /// Remove the row at `row` via swap-remove (§4.2). Returns the entity
    /// that was swapped into `row` (if any, i.e. `row` was not the last
    /// row), and whether the table's active state flipped.
    ///
    /// Per the row-move contract (§3), the caller must rewrite the swapped
    /// entity's entity-index entry *before* relying on this table's row
    /// count again.
    pub fn delete(&mut self, row: Row) -> (Option<entity::Id>, Transition) {
        let was_active = self.is_active();
        let last = self.entities.len() - 1;
        let row_index = row.index();

        let swapped = if row_index != last {
            self.entities.swap(row_index, last);
            Some(self.entities[row_index])
        } else {
            None
        };
        self.entities.truncate(last);

        for column in &mut self.columns {
            column.swap_remove(row);
        }

        let transition = if was_active && !self.is_active() {
            Transition::Deactivated
        } else {
            Transition::Unchanged
        };
        (swapped, transition)
    }

    /// Move the entity at `row` into `other`, copying bytes for components
    /// present in both tables, dropping components only `self` has, and
    /// zero-filling components only `other` has (§4.2).
    ///
    /// Returns the new row in `other`, the entity swapped into the vacated
    /// row of `self` (if any), and the activation transitions for both
    /// tables. A move between identical tables is a no-op that returns the
    /// same row with no transitions.
    pub fn move_row_to(
        &mut self,
        other: &mut Table,
        row: Row,
    ) -> (Row, Option<entity::Id>, Transition, Transition) {
        if self.id == other.id {
            return (row, None, Transition::Unchanged, Transition::Unchanged);
        }

        let entity = self.entities[row.index()];
        let (new_row, insert_transition) = other.insert(entity);

        for (offset, &component) in other.column_components.iter().enumerate() {
            if let Some(src) = self.column_for(component) {
                let bytes = src.get(row).to_vec();
                other.columns[offset].set(new_row, &bytes);
            }
        }

        let (swapped, delete_transition) = self.delete(row);
        (new_row, swapped, delete_transition, insert_transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(ids: &[component::Id], components: &component::Registry) -> Table {
        Table::new(TypeId::new(0), Arc::from(ids.to_vec()), components)
    }

    #[test]
    fn insert_activates_an_empty_table() {
        // Given
        let registry = component::Registry::new();
        let position = component::Id::new(1);
        registry.declare_component(position, 8);
        let mut table = table_with(&[position], &registry);

        // When
        let (row, transition) = table.insert(entity::Id::new(1));

        // Then
        assert_eq!(row, Row::new(0));
        assert_eq!(transition, Transition::Activated);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn delete_of_non_last_row_swaps_and_reports_the_swapped_entity() {
        // Given
        let registry = component::Registry::new();
        let position = component::Id::new(1);
        registry.declare_component(position, 4);
        let mut table = table_with(&[position], &registry);
        let e0 = entity::Id::new(0);
        let e1 = entity::Id::new(1);
        table.insert(e0);
        table.insert(e1);

        // When
        let (swapped, transition) = table.delete(Row::new(0));

        // Then
        assert_eq!(swapped, Some(e1));
        assert_eq!(transition, Transition::Unchanged);
        assert_eq!(table.entities(), &[e1]);
    }

    #[test]
    fn delete_of_last_row_does_not_swap() {
        // Given
        let registry = component::Registry::new();
        let position = component::Id::new(1);
        registry.declare_component(position, 4);
        let mut table = table_with(&[position], &registry);
        table.insert(entity::Id::new(0));
        table.insert(entity::Id::new(1));

        // When
        let (swapped, transition) = table.delete(Row::new(1));

        // Then
        assert_eq!(swapped, None);
        assert_eq!(transition, Transition::Unchanged);
    }

    #[test]
    fn delete_of_the_only_row_deactivates_the_table() {
        // Given
        let registry = component::Registry::new();
        let position = component::Id::new(1);
        registry.declare_component(position, 4);
        let mut table = table_with(&[position], &registry);
        table.insert(entity::Id::new(0));

        // When
        let (_, transition) = table.delete(Row::new(0));

        // Then
        assert_eq!(transition, Transition::Deactivated);
        assert!(table.is_empty());
    }

    #[test]
    fn move_row_to_copies_shared_components_and_drops_the_rest() {
        // Given
        let registry = component::Registry::new();
        let position = component::Id::new(1);
        let velocity = component::Id::new(2);
        registry.declare_component(position, 4);
        registry.declare_component(velocity, 4);

        let mut source = table_with(&[position, velocity], &registry);
        let mut dest = table_with(&[position], &registry);

        let entity = entity::Id::new(7);
        let (row, _) = source.insert(entity);
        source.set(row, position, &[9, 9, 9, 9]);

        // When
        let (new_row, swapped, _, insert_transition) = source.move_row_to(&mut dest, row);

        // Then
        assert_eq!(swapped, None);
        assert_eq!(insert_transition, Transition::Activated);
        assert_eq!(dest.get(new_row, position), Some([9u8, 9, 9, 9].as_slice()));
        assert!(source.is_empty());
        assert_eq!(dest.column_offset(velocity), None);
    }

    #[test]
    fn move_row_to_zero_fills_newly_added_components() {
        // Given
        let registry = component::Registry::new();
        let position = component::Id::new(1);
        let velocity = component::Id::new(2);
        registry.declare_component(position, 4);
        registry.declare_component(velocity, 4);

        let mut source = table_with(&[position], &registry);
        let mut dest = table_with(&[position, velocity], &registry);

        let entity = entity::Id::new(3);
        let (row, _) = source.insert(entity);

        // When
        let (new_row, ..) = source.move_row_to(&mut dest, row);

        // Then
        assert_eq!(dest.get(new_row, velocity), Some([0u8, 0, 0, 0].as_slice()));
    }

    #[test]
    fn move_row_to_the_same_table_is_a_no_op() {
        // Given
        let registry = component::Registry::new();
        let position = component::Id::new(1);
        registry.declare_component(position, 4);
        let mut table = table_with(&[position], &registry);
        let (row, _) = table.insert(entity::Id::new(1));

        // When
        let mut same = Table::new(table.id(), table.component_ids.clone(), &registry);
        // Simulate "same table" by matching ids rather than constructing an
        // alias, since `Table` does not implement `Clone`.
        same.entities = table.entities.clone();
        let (new_row, swapped, delete_t, insert_t) = table.move_row_to(&mut same, row);

        // Then
        assert_eq!(new_row, row);
        assert_eq!(swapped, None);
        assert_eq!(delete_t, Transition::Unchanged);
        assert_eq!(insert_t, Transition::Unchanged);
    }

    #[test]
    fn prefab_components_get_no_column() {
        // Given
        let registry = component::Registry::new();
        let position = component::Id::new(1);
        let template = component::Id::new(2);
        registry.declare_component(position, 4);
        registry.declare_prefab(template);

        // When
        let table = table_with(&[position, template], &registry);

        // Then
        assert_eq!(table.prefab(), Some(template));
        assert_eq!(table.column_offset(template), None);
        assert_eq!(table.column_offset(position), Some(0));
    }
}
