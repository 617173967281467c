//! Storage and pre-matching for every registered system (§2 "System
//! registry").

use std::collections::HashMap;

use crate::ecs::entity;
use crate::ecs::storage::Transition;
use crate::ecs::system::matcher;
use crate::ecs::system::phase::{Phase, Trigger};
use crate::ecs::system::record::{ColumnSystemRecord, RowSystemRecord};
use crate::ecs::system::Id;
use crate::ecs::type_registry::{TypeId, TypeRegistry};

/// Owns every column and row system, phase-ordered lists for the scheduler,
/// and the trigger index for reactive dispatch.
#[derive(Default)]
pub struct Registry {
    column_systems: HashMap<Id, ColumnSystemRecord>,
    phases: HashMap<Phase, Vec<Id>>,

    row_systems: HashMap<Id, RowSystemRecord>,
    by_trigger: HashMap<Trigger, Vec<Id>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a column system, pre-matching it against every table that
    /// currently exists (§4.4: "invoked on ... system creation").
    pub fn add_column_system(
        &mut self,
        mut record: ColumnSystemRecord,
        type_registry: &TypeRegistry,
        entity_index: &entity::Index,
    ) -> Id {
        let id = record.id;

        if matcher::prematch(&record, entity_index, type_registry) {
            type_registry.for_each_table(|type_id, table| {
                if let Some(matched) = matcher::match_table(&record, type_id, table) {
                    if table.is_active() {
                        record.matched_tables.push(matched);
                    } else {
                        record.inactive_tables.push(type_id);
                    }
                }
            });
        }

        for matched in &record.matched_tables {
            type_registry.with_table_mut(matched.type_id, |table| table.observers.push(id));
        }
        for &type_id in &record.inactive_tables {
            type_registry.with_table_mut(type_id, |table| table.observers.push(id));
        }

        insert_sorted(self.phases.entry(record.phase).or_default(), id);
        self.column_systems.insert(id, record);
        id
    }

    /// Register a row (reactive) system.
    pub fn add_row_system(&mut self, record: RowSystemRecord) -> Id {
        let id = record.id;
        self.by_trigger.entry(record.trigger).or_default().push(id);
        self.row_systems.insert(id, record);
        id
    }

    /// Called whenever [`TypeRegistry::intern_tracking`] creates a brand new
    /// table: re-run the matcher for every column system against it (§4.1,
    /// §4.4).
    pub fn notify_table_created(&mut self, type_id: TypeId, type_registry: &TypeRegistry, entity_index: &entity::Index) {
        let mut ids: Vec<Id> = self.column_systems.keys().copied().collect();
        ids.sort();

        for id in ids {
            let record = self.column_systems.get_mut(&id).expect("system vanished mid-notify");
            if !matcher::prematch(record, entity_index, type_registry) {
                continue;
            }
            let matched = type_registry.with_table(type_id, |table| matcher::match_table(record, type_id, table));
            if let Some(matched) = matched {
                let active = type_registry.with_table(type_id, |table| table.is_active());
                if active {
                    record.matched_tables.push(matched);
                } else {
                    record.inactive_tables.push(type_id);
                }
                type_registry.with_table_mut(type_id, |table| table.observers.push(id));
            }
        }
    }

    /// A table transitioned active/inactive: move it between each observing
    /// system's `matched_tables`/`inactive_tables` (§3, §4.5 step 3).
    pub fn notify_transition(&mut self, type_id: TypeId, transition: Transition, type_registry: &TypeRegistry) {
        if transition == Transition::Unchanged {
            return;
        }
        let observers = type_registry.with_table(type_id, |table| table.observers.clone());
        for observer in observers {
            let Some(record) = self.column_systems.get_mut(&observer) else {
                continue;
            };
            match transition {
                Transition::Activated => {
                    if let Some(pos) = record.inactive_tables.iter().position(|&t| t == type_id) {
                        record.inactive_tables.remove(pos);
                        let rematch = type_registry
                            .with_table(type_id, |table| matcher::match_table(record, type_id, table));
                        match rematch {
                            Some(matched) => record.matched_tables.push(matched),
                            // The table already passed once to land in
                            // `inactive_tables`; this only defends against a
                            // record mutation (e.g. disable) between then and
                            // now.
                            None => record.inactive_tables.push(type_id),
                        }
                    }
                }
                Transition::Deactivated => {
                    if let Some(pos) = record.matched_tables.iter().position(|m| m.type_id == type_id) {
                        record.matched_tables.remove(pos);
                        record.inactive_tables.push(type_id);
                    }
                }
                Transition::Unchanged => unreachable!(),
            }
        }
    }

    /// Every column system in phase order, grouped by phase in `Phase::ORDER`.
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &ColumnSystemRecord> {
        self.phases
            .get(&phase)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.column_systems.get(id))
    }

    pub fn column_system_mut(&mut self, id: Id) -> Option<&mut ColumnSystemRecord> {
        self.column_systems.get_mut(&id)
    }

    pub fn column_system(&self, id: Id) -> Option<&ColumnSystemRecord> {
        self.column_systems.get(&id)
    }

    /// Every row system registered for `trigger` whose signature matches
    /// `type_id`'s component sequence *and* whose AND/OR columns target at
    /// least one of `changed` (§4.5: "invoked for each newly added
    /// component id whose type the system matches" — a system observing
    /// `Health` must not re-fire because an unrelated component was added
    /// to an entity that already carries `Health`).
    pub fn row_systems_for(
        &self,
        trigger: Trigger,
        type_id: TypeId,
        changed: &[component::Id],
        type_registry: &TypeRegistry,
    ) -> Vec<Id> {
        let sequence = type_registry.sequence_of(type_id);
        self.by_trigger
            .get(&trigger)
            .into_iter()
            .flatten()
            .filter(|id| {
                self.row_systems
                    .get(id)
                    .map(|record| {
                        matcher::signature_matches_sequence(&record.signature, &sequence)
                            && matcher::signature_targets_any(&record.signature, changed)
                    })
                    .unwrap_or(false)
            })
            .copied()
            .collect()
    }

    pub fn row_system(&self, id: Id) -> Option<&RowSystemRecord> {
        self.row_systems.get(&id)
    }
}

fn insert_sorted(list: &mut Vec<Id>, id: Id) {
    let position = list.binary_search(&id).unwrap_or_else(|insert_at| insert_at);
    list.insert(position, id);
}
