//! Interning of component-id sequences into [`TypeId`]s, and the table
//! storage each type id owns (§3, §4.1).
//!
//! Unlike a compile-time ECS, where an archetype id and its backing table are
//! two things that must be kept in sync, here they are the same thing: there
//! is exactly one [`Table`] per live `TypeId`, so "intern a type" and "get or
//! create its table" are a single operation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use crate::ecs::component;
use crate::ecs::error::{Error, Result};
use crate::ecs::storage::{Row, Table, Transition};
use crate::ecs::entity;

/// Identifies both a component-id sequence and the table storing entities of
/// that exact type. Stable for the lifetime of the world once interned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(u32);

impl TypeId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// The type id of the empty component sequence. Every world has a table for
/// it, and every freshly spawned entity starts out in it (§4.2).
pub const EMPTY: TypeId = TypeId::new(0);

/// Interns component-id sequences into [`TypeId`]s and owns every table.
///
/// Type creation only ever happens from within [`crate::ecs::stage::Stage::merge`],
/// which runs on a single thread at a time (§9's "mutex-guarded type id
/// creation" open question is resolved by construction: there is only ever
/// one merge in flight, so the registry does not need its own merge-time
/// mutex beyond the table storage lock it already takes). Reads — column
/// system iteration, the matcher scanning existing tables — can run
/// concurrently with each other, just not with a merge.
pub struct TypeRegistry {
    by_sequence: DashMap<Vec<component::Id>, TypeId>,
    sequences: RwLock<Vec<Arc<[component::Id]>>>,
    tables: RwLock<Vec<Table>>,
    next: AtomicU32,
    /// Bumped every time a table is created. The scheduler uses this to
    /// notice a job plan it cached was built against a stale table set
    /// (§9 "any system creation, signature change, or table creation
    /// invalidates `valid_schedule`").
    generation: AtomicU32,
}

impl TypeRegistry {
    /// Create a registry with just the empty type's table present.
    pub fn new(components: &component::Registry) -> Self {
        let registry = Self {
            by_sequence: DashMap::new(),
            sequences: RwLock::new(Vec::new()),
            tables: RwLock::new(Vec::new()),
            next: AtomicU32::new(0),
            generation: AtomicU32::new(0),
        };
        registry
            .intern(&[], components)
            .expect("the empty type always interns");
        registry
    }

    /// Find or create the [`TypeId`] for a component-id sequence.
    ///
    /// `ids` need not be sorted or deduplicated. Every id must already be
    /// declared as a component or prefab, and at most one of them may be a
    /// prefab (§4.2 edge case).
    pub fn intern(&self, ids: &[component::Id], components: &component::Registry) -> Result<TypeId> {
        self.intern_tracking(ids, components).map(|(id, _)| id)
    }

    /// Like [`Self::intern`], but also reports whether a new table was
    /// created. Callers that need to run the matcher (§4.1 "table_of...
    /// creating it on first use. Creation scans all existing column systems
    /// and runs the matcher") against freshly created tables use this to
    /// tell a cache hit from a genuine creation.
    pub fn intern_tracking(
        &self,
        ids: &[component::Id],
        components: &component::Registry,
    ) -> Result<(TypeId, bool)> {
        let mut sorted: Vec<component::Id> = ids.to_vec();
        sorted.sort_by_key(|id| id.value());
        sorted.dedup();

        let mut prefab_count = 0;
        for &id in &sorted {
            if !components.is_component_or_prefab(id) {
                return Err(Error::invalid_type(id.value()));
            }
            if components.is_prefab(id) {
                prefab_count += 1;
            }
        }
        if prefab_count > 1 {
            return Err(Error::conflict("type sequence carries more than one prefab"));
        }

        if let Some(existing) = self.by_sequence.get(&sorted) {
            return Ok((*existing.value(), false));
        }

        let mut tables = self.tables.write().expect("type registry poisoned");
        let mut sequences = self.sequences.write().expect("type registry poisoned");

        // Another thread may have interned the same sequence while we
        // waited for the write locks.
        if let Some(existing) = self.by_sequence.get(&sorted) {
            return Ok((*existing.value(), false));
        }

        let id = TypeId(self.next.fetch_add(1, Ordering::SeqCst));
        let sequence: Arc<[component::Id]> = Arc::from(sorted.clone());
        tables.push(Table::new(id, sequence.clone(), components));
        sequences.push(sequence);
        self.by_sequence.insert(sorted, id);
        self.generation.fetch_add(1, Ordering::SeqCst);

        Ok((id, true))
    }

    /// Current table-creation generation. Changes exactly when a new table
    /// is created.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The component-id sequence a type id was interned from.
    pub fn sequence_of(&self, id: TypeId) -> Arc<[component::Id]> {
        self.sequences.read().expect("type registry poisoned")[id.index()].clone()
    }

    /// The number of distinct types (tables) currently live.
    pub fn table_count(&self) -> usize {
        self.tables.read().expect("type registry poisoned").len()
    }

    /// Run `f` against the table for `id` with read access.
    pub fn with_table<R>(&self, id: TypeId, f: impl FnOnce(&Table) -> R) -> R {
        let tables = self.tables.read().expect("type registry poisoned");
        f(&tables[id.index()])
    }

    /// Run `f` against the table for `id` with write access.
    pub fn with_table_mut<R>(&self, id: TypeId, f: impl FnOnce(&mut Table) -> R) -> R {
        let mut tables = self.tables.write().expect("type registry poisoned");
        f(&mut tables[id.index()])
    }

    /// Run `f` against every currently live table, in ascending `TypeId` order.
    pub fn for_each_table(&self, mut f: impl FnMut(TypeId, &Table)) {
        let tables = self.tables.read().expect("type registry poisoned");
        for (index, table) in tables.iter().enumerate() {
            f(TypeId(index as u32), table);
        }
    }

    /// Insert a new row for `entity` into the table for `id`.
    pub fn insert(&self, id: TypeId, entity: entity::Id) -> (Row, Transition) {
        self.with_table_mut(id, |table| table.insert(entity))
    }

    /// Remove the row at `row` from the table for `id`.
    pub fn delete(&self, id: TypeId, row: Row) -> (Option<entity::Id>, Transition) {
        self.with_table_mut(id, |table| table.delete(row))
    }

    /// Move the entity at `row` in `from`'s table into `to`'s table.
    ///
    /// A no-op returning `row` unchanged when `from == to` (§4.2 edge case).
    pub fn move_row(
        &self,
        from: TypeId,
        row: Row,
        to: TypeId,
    ) -> (Row, Option<entity::Id>, Transition, Transition) {
        if from == to {
            return (row, None, Transition::Unchanged, Transition::Unchanged);
        }

        let mut tables = self.tables.write().expect("type registry poisoned");
        let (a, b) = (from.index(), to.index());
        let hi = a.max(b);
        let lo = a.min(b);
        let (left, right) = tables.split_at_mut(hi);
        let (src, dst) = if a < b {
            (&mut left[lo], &mut right[0])
        } else {
            (&mut right[0], &mut left[lo])
        };
        src.move_row_to(dst, row)
    }
}
