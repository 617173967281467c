//! Per-scope buffering of structural changes (§3 "Stage", §4.6).
//!
//! A stage never touches a table or the entity index directly. It only
//! records what *would* happen; [`Stage::merge`] is the one place those
//! deltas become real — the only place that ever acquires the entity index
//! and system registry locks for a structural mutation.

use std::collections::{BTreeMap, HashMap, HashSet};

use crossbeam::queue::SegQueue;

use crate::ecs::component;
use crate::ecs::entity;
use crate::ecs::handle::Handle;
use crate::ecs::storage::Location;
use crate::ecs::system::{Id as SystemId, Trigger};
use crate::ecs::type_registry::{TypeId, EMPTY};
use crate::ecs::world::World;

#[derive(Debug, Clone)]
enum Op {
    Spawn,
    Despawn,
    Write { component: component::Id, data: Vec<u8> },
    Remove { component: component::Id },
}

/// Per-entity net effect of every op buffered for it this scope, folded in
/// push order so later writes win over earlier ones touching the same
/// component (§4.6's "buffered writes" / "remove_set").
#[derive(Default)]
struct Intent {
    spawn: bool,
    despawn: bool,
    written: HashMap<component::Id, Vec<u8>>,
    removed: HashSet<component::Id>,
}

/// A buffer of structural deltas and component writes, scoped to the main
/// world, one frame, or one worker (§3).
pub struct Stage {
    ops: SegQueue<(entity::Id, Op)>,
}

impl Default for Stage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage {
    pub fn new() -> Self {
        Self { ops: SegQueue::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn spawn(&self, entity: entity::Id) {
        self.ops.push((entity, Op::Spawn));
    }

    pub fn despawn(&self, entity: entity::Id) {
        self.ops.push((entity, Op::Despawn));
    }

    /// Buffer a component write, whether it is logically an "add" (the
    /// entity did not have the component at the start of the frame) or a
    /// "set" (it did) — that distinction is only resolved at merge time,
    /// once the entity's starting type is known (§4.6).
    pub fn write(&self, entity: entity::Id, component: component::Id, data: Vec<u8>) {
        self.ops.push((entity, Op::Write { component, data }));
    }

    pub fn remove(&self, entity: entity::Id, component: component::Id) {
        self.ops.push((entity, Op::Remove { component }));
    }

    /// Fold every buffered op into per-entity intents and apply them to
    /// `world`, in ascending entity id order (§4.6: "Merging is
    /// deterministic").
    pub fn merge(&self, world: &World) {
        let mut intents: BTreeMap<entity::Id, Intent> = BTreeMap::new();
        while let Some((entity, op)) = self.ops.pop() {
            let intent = intents.entry(entity).or_default();
            match op {
                Op::Spawn => intent.spawn = true,
                Op::Despawn => intent.despawn = true,
                Op::Write { component, data } => {
                    intent.removed.remove(&component);
                    intent.written.insert(component, data);
                }
                Op::Remove { component } => {
                    intent.written.remove(&component);
                    intent.removed.insert(component);
                }
            }
        }

        for (&entity, intent) in &intents {
            if intent.spawn {
                self.apply_spawn(world, entity);
            }
        }

        // §4.6 step 1: removes (and despawns, folded into "remove
        // everything") before adds, so a component removed and re-added in
        // the same frame ends up added, not lost.
        for (&entity, intent) in &intents {
            if intent.despawn {
                self.apply_despawn(world, entity);
            } else if !intent.removed.is_empty() {
                self.apply_removes(world, entity, &intent.removed);
            }
        }

        // §4.6 step 2: adds and value writes.
        for (&entity, intent) in &intents {
            if intent.despawn || intent.written.is_empty() {
                continue;
            }
            self.apply_writes(world, entity, &intent.written);
        }
    }

    /// Intern a destination type, running the matcher against it if this is
    /// the first time anyone has reached this exact component sequence
    /// (§4.1: "table_of... creating it on first use").
    fn intern_destination(&self, world: &World, ids: &[component::Id]) -> TypeId {
        let (type_id, created) = world
            .types()
            .intern_tracking(ids, world.components())
            .expect("destination component ids were validated when declared");
        if created {
            let entity_index = world.entity_index().read().expect("entity index poisoned");
            world
                .systems()
                .write()
                .expect("system registry poisoned")
                .notify_table_created(type_id, world.types(), &entity_index);
        }
        type_id
    }

    fn apply_spawn(&self, world: &World, entity: entity::Id) {
        let (row, transition) = world.types().insert(EMPTY, entity);
        world
            .entity_index()
            .write()
            .expect("entity index poisoned")
            .insert(entity, Location::new(EMPTY, row));
        world
            .systems()
            .write()
            .expect("system registry poisoned")
            .notify_transition(EMPTY, transition, world.types());
    }

    fn apply_despawn(&self, world: &World, entity: entity::Id) {
        let Some(location) = current_location(world, entity) else {
            return;
        };
        let sequence = world.types().sequence_of(location.type_id);
        self.fire_trigger(world, Trigger::OnRemove, location.type_id, &sequence, &[entity]);

        let (swapped, transition) = world.types().delete(location.type_id, location.row);
        {
            let mut index = world.entity_index().write().expect("entity index poisoned");
            index.remove(entity);
            if let Some(swapped) = swapped {
                index.insert(swapped, Location::new(location.type_id, location.row));
            }
        }
        world
            .systems()
            .write()
            .expect("system registry poisoned")
            .notify_transition(location.type_id, transition, world.types());
    }

    fn apply_removes(&self, world: &World, entity: entity::Id, removed: &HashSet<component::Id>) {
        let Some(location) = current_location(world, entity) else {
            return;
        };
        // Row systems must still see the data, so fire on-remove against the
        // entity's current (pre-removal) type before moving it (§4.5).
        let removed_ids: Vec<component::Id> = removed.iter().copied().collect();
        self.fire_trigger(world, Trigger::OnRemove, location.type_id, &removed_ids, &[entity]);

        let remaining: Vec<component::Id> = world
            .types()
            .sequence_of(location.type_id)
            .iter()
            .filter(|id| !removed.contains(id))
            .copied()
            .collect();
        let destination = self.intern_destination(world, &remaining);

        self.move_entity(world, entity, location, destination);
    }

    fn apply_writes(&self, world: &World, entity: entity::Id, written: &HashMap<component::Id, Vec<u8>>) {
        let Some(location) = current_location(world, entity) else {
            return;
        };
        let original_sequence = world.types().sequence_of(location.type_id);

        let mut destination_ids: Vec<component::Id> = original_sequence.to_vec();
        for &component in written.keys() {
            if !destination_ids.contains(&component) {
                destination_ids.push(component);
            }
        }
        let destination = self.intern_destination(world, &destination_ids);

        let new_location = self.move_entity(world, entity, location, destination);

        for (&component, data) in written {
            world
                .types()
                .with_table_mut(new_location.type_id, |table| table.set(new_location.row, component, data));
        }

        // §8 invariant 5: adding a component already present is a no-op with
        // respect to the entity index — it still overwrites the bytes, which
        // is exactly what a set of an existing component does, so both are
        // reported as on-set rather than on-add.
        let added_ids: Vec<component::Id> =
            written.keys().filter(|id| !original_sequence.contains(id)).copied().collect();
        let overwritten_ids: Vec<component::Id> =
            written.keys().filter(|id| original_sequence.contains(id)).copied().collect();

        if !added_ids.is_empty() {
            self.fire_trigger(world, Trigger::OnAdd, new_location.type_id, &added_ids, &[entity]);
        }
        if !overwritten_ids.is_empty() {
            self.fire_trigger(world, Trigger::OnSet, new_location.type_id, &overwritten_ids, &[entity]);
        }
    }

    fn move_entity(&self, world: &World, entity: entity::Id, location: Location, destination: TypeId) -> Location {
        let (new_row, swapped, from_transition, to_transition) =
            world.types().move_row(location.type_id, location.row, destination);
        let new_location = Location::new(destination, new_row);

        {
            let mut index = world.entity_index().write().expect("entity index poisoned");
            index.insert(entity, new_location);
            if let Some(swapped) = swapped {
                index.insert(swapped, Location::new(location.type_id, location.row));
            }
        }

        let mut systems = world.systems().write().expect("system registry poisoned");
        systems.notify_transition(location.type_id, from_transition, world.types());
        systems.notify_transition(destination, to_transition, world.types());

        new_location
    }

    /// Fire every row system registered for `trigger` whose signature
    /// matches `type_id` and whose AND/OR columns target one of `changed`,
    /// without holding the system registry lock across the callback
    /// invocation (§5, §4.5).
    fn fire_trigger(
        &self,
        world: &World,
        trigger: Trigger,
        type_id: TypeId,
        changed: &[component::Id],
        entities: &[entity::Id],
    ) {
        let ids: Vec<SystemId> = world
            .systems()
            .read()
            .expect("system registry poisoned")
            .row_systems_for(trigger, type_id, changed, world.types());

        for id in ids {
            let callback = world
                .systems()
                .read()
                .expect("system registry poisoned")
                .row_system(id)
                .map(|record| record.callback());
            if let Some(callback) = callback {
                callback(Handle::Main(world), entities);
            }
        }
    }
}

fn current_location(world: &World, entity: entity::Id) -> Option<Location> {
    world.entity_index().read().expect("entity index poisoned").get(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::world::{Config, World};

    #[test]
    fn spawn_then_merge_lands_the_entity_in_the_empty_type() {
        // Given
        let world = World::new(Config::default());
        let entity = world.allocate();

        // When
        world.main_stage().spawn(entity);
        world.main_stage().merge(&world);

        // Then
        let location = world.entity_index().read().unwrap().get(entity).unwrap();
        assert_eq!(location.type_id, EMPTY);
    }

    #[test]
    fn add_then_merge_moves_the_entity_into_the_owning_type() {
        // Given
        let world = World::new(Config::default());
        let entity = world.allocate();
        world.main_stage().spawn(entity);
        world.main_stage().merge(&world);

        let position = world.component(8);

        // When
        world.main_stage().write(entity, position, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        world.main_stage().merge(&world);

        // Then
        let location = world.entity_index().read().unwrap().get(entity).unwrap();
        world.types().with_table(location.type_id, |table| {
            assert_eq!(table.get(location.row, position), Some([1u8, 2, 3, 4, 5, 6, 7, 8].as_slice()));
        });
    }

    #[test]
    fn remove_then_merge_drops_the_column_and_moves_the_entity() {
        // Given
        let world = World::new(Config::default());
        let entity = world.allocate();
        world.main_stage().spawn(entity);
        world.main_stage().merge(&world);
        let position = world.component(8);
        let velocity = world.component(8);
        world.main_stage().write(entity, position, vec![0; 8]);
        world.main_stage().write(entity, velocity, vec![0; 8]);
        world.main_stage().merge(&world);

        // When
        world.main_stage().remove(entity, velocity);
        world.main_stage().merge(&world);

        // Then
        let location = world.entity_index().read().unwrap().get(entity).unwrap();
        world.types().with_table(location.type_id, |table| {
            assert_eq!(table.column_offset(velocity), None);
            assert!(table.column_offset(position).is_some());
        });
    }

    #[test]
    fn despawn_then_merge_removes_the_entity_from_the_index() {
        // Given
        let world = World::new(Config::default());
        let entity = world.allocate();
        world.main_stage().spawn(entity);
        world.main_stage().merge(&world);

        // When
        world.main_stage().despawn(entity);
        world.main_stage().merge(&world);

        // Then
        assert_eq!(world.entity_index().read().unwrap().get(entity), None);
    }
}
