//! The world facade applications hold on to (§2, §6 "World configuration
//! options").
//!
//! `World` owns every piece of state the rest of `ecs` operates on —
//! component descriptors, the type registry and its tables, the entity
//! index, the system registry, the main stage, the name table, the
//! singleton side table, and the scheduler — and exposes the surface
//! everything else is built against: minting entities and components,
//! registering systems from signature text, and driving frames.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use dashmap::DashMap;

use crate::ecs::component;
use crate::ecs::entity;
use crate::ecs::error::{Error, Result};
use crate::ecs::handle::Handle;
use crate::ecs::scheduler::Scheduler;
use crate::ecs::signature::{self, NameResolver, Signature};
use crate::ecs::singleton::Singletons;
use crate::ecs::stage::Stage;
use crate::ecs::system::{
    self, ColumnSystemRecord, Phase, RowSystemRecord, RowsView, Trigger,
};
use crate::ecs::type_registry::TypeRegistry;

/// The tag component marking an entity as a prefab (§4.8). Reserved as the
/// very first entity id a world allocates, so it is stable across worlds.
pub const PREFAB: component::Id = component::Id::new(0);

/// World construction and per-frame behavior (§6).
pub struct Config {
    /// Target frame rate, informational only — the caller supplies
    /// `delta_time` to [`World::update`] itself; `lattice` does not read a
    /// wall clock (§1 "time-of-day clocks" is an external collaborator).
    pub target_fps: f32,
    /// Number of worker threads. `0` selects inline execution (§4.7).
    pub thread_count: usize,
    /// Whether [`World::update`] merges the frame's buffered mutations
    /// automatically, or leaves that to an explicit [`World::merge`] call.
    pub auto_merge: bool,
    /// Enable per-frame timing instrumentation (logged at trace level).
    pub measure_frame_time: bool,
    /// Enable per-system timing instrumentation (logged at trace level).
    pub measure_system_time: bool,
    /// Opaque caller context, handed back unchanged through
    /// [`World::context`]. Not interpreted by `lattice` at all.
    pub context: Option<Box<dyn Any + Send + Sync>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            thread_count: 0,
            auto_merge: true,
            measure_frame_time: false,
            measure_system_time: false,
            context: None,
        }
    }
}

pub struct World {
    entities: entity::Allocator,
    components: component::Registry,
    types: TypeRegistry,
    entity_index: RwLock<entity::Index>,
    systems: RwLock<system::Registry>,
    names: DashMap<String, entity::Id>,
    singletons: Singletons,
    main_stage: Stage,
    temp_stage: Stage,
    scheduler: Scheduler,
    config: Config,
    frame_count: AtomicU64,
    should_quit: std::sync::atomic::AtomicBool,
}

impl World {
    /// Build a new, empty world. Reserves entity id `0` for [`PREFAB`]
    /// before anything else can allocate it.
    pub fn new(config: Config) -> Self {
        let entities = entity::Allocator::new();
        let components = component::Registry::new();

        let prefab = entities.alloc();
        debug_assert_eq!(prefab, PREFAB, "PREFAB must be the first entity a world allocates");
        components.declare_prefab(prefab);

        let types = TypeRegistry::new(&components);
        let scheduler = Scheduler::new(config.thread_count);

        log::debug!(
            "world created: thread_count={} auto_merge={}",
            config.thread_count,
            config.auto_merge
        );

        Self {
            entities,
            components,
            types,
            entity_index: RwLock::new(entity::Index::new()),
            systems: RwLock::new(system::Registry::new()),
            names: DashMap::new(),
            singletons: Singletons::new(),
            main_stage: Stage::new(),
            temp_stage: Stage::new(),
            scheduler,
            config,
            frame_count: AtomicU64::new(0),
            should_quit: std::sync::atomic::AtomicBool::new(false),
        }
    }

    // --- Core accessors, shared by `stage.rs`, `scheduler.rs`, and callers --

    #[inline]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    #[inline]
    pub fn components(&self) -> &component::Registry {
        &self.components
    }

    #[inline]
    pub fn entity_index(&self) -> &RwLock<entity::Index> {
        &self.entity_index
    }

    #[inline]
    pub fn systems(&self) -> &RwLock<system::Registry> {
        &self.systems
    }

    #[inline]
    pub fn singletons(&self) -> &Singletons {
        &self.singletons
    }

    #[inline]
    pub fn main_stage(&self) -> &Stage {
        &self.main_stage
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The opaque caller context set in [`Config::context`], downcast to
    /// `T`. `None` if no context was set, or it is not a `T`.
    pub fn context<T: 'static>(&self) -> Option<&T> {
        self.config.context.as_deref()?.downcast_ref::<T>()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Request that the caller's frame loop stop calling [`World::update`]
    /// (§5 cancellation). `lattice` does not stop itself — it only exposes
    /// the flag.
    pub fn request_quit(&self) {
        self.should_quit.store(true, Ordering::Relaxed);
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit.load(Ordering::Relaxed)
    }

    // --- Entities and components (§3, §4.8) ---------------------------

    /// Allocate a bare entity id without staging a spawn for it. Most
    /// callers want [`World::spawn`] instead; this exists for callers that
    /// need the id before deciding whether/when to stage the spawn.
    pub fn allocate(&self) -> entity::Id {
        self.entities.alloc()
    }

    /// Allocate an entity and stage its spawn on the main stage.
    pub fn spawn(&self) -> entity::Id {
        let entity = self.allocate();
        self.main_stage.spawn(entity);
        entity
    }

    pub fn despawn(&self, entity: entity::Id) {
        self.main_stage.despawn(entity);
    }

    /// Mint a new component: an entity id with a byte-size descriptor
    /// attached (§4.1: components are entities, not a separate namespace).
    pub fn component(&self, size: u32) -> component::Id {
        let id = self.entities.alloc();
        self.components.declare_component(id, size);
        id
    }

    /// Mint a new prefab: an entity usable as a template, referenced from
    /// signatures via a source other than `Self` (§4.8).
    pub fn new_prefab(&self) -> entity::Id {
        let id = self.entities.alloc();
        self.components.declare_prefab(id);
        id
    }

    /// Buffer a component write for `entity` on the main stage.
    pub fn set(&self, entity: entity::Id, component: component::Id, data: Vec<u8>) {
        self.main_stage.write(entity, component, data);
    }

    /// Buffer a component removal for `entity` on the main stage.
    pub fn unset(&self, entity: entity::Id, component: component::Id) {
        self.main_stage.remove(entity, component);
    }

    pub fn is_alive(&self, entity: entity::Id) -> bool {
        self.entity_index.read().expect("entity index poisoned").contains(entity)
    }

    pub fn has(&self, entity: entity::Id, component: component::Id) -> bool {
        match self.entity_index.read().expect("entity index poisoned").get(entity) {
            Some(location) => self.types.sequence_of(location.type_id).contains(&component),
            None => false,
        }
    }

    /// Read the current bytes of `component` on `entity`. Reflects the
    /// world as of the last merge — reads never consult any stage's
    /// buffered-but-unmerged writes (§3, §4.6).
    pub fn get(&self, entity: entity::Id, component: component::Id) -> Result<Vec<u8>> {
        let location = self
            .entity_index
            .read()
            .expect("entity index poisoned")
            .get(entity)
            .ok_or(Error::InvalidHandle(entity))?;
        self.types
            .with_table(location.type_id, |table| table.get(location.row, component).map(<[u8]>::to_vec))
            .ok_or(Error::MissingComponent { entity, component })
    }

    // --- Naming (§4.8 supplement) ---------------------------------------

    /// Associate `name` with `entity`, so signature text can reference it
    /// via a `name.` source.
    pub fn set_name(&self, name: impl Into<String>, entity: entity::Id) {
        self.names.insert(name.into(), entity);
    }

    /// Look up the entity registered under `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<entity::Id> {
        self.names.get(name).map(|entry| *entry)
    }

    /// Parse signature text against this world's name table.
    pub fn parse_signature(&self, text: &str) -> Result<Signature> {
        signature::parse(text, self)
    }

    // --- Singletons (§4.9 supplement) -----------------------------------

    pub fn set_singleton(&self, component: component::Id, data: Vec<u8>) {
        self.singletons.set(component, data);
    }

    pub fn get_singleton(&self, component: component::Id) -> Option<Vec<u8>> {
        self.singletons.get(component)
    }

    // --- System registration (§4.4, §4.5) -------------------------------

    /// Register a periodic (column) system, parsing `signature_text` and
    /// pre-matching it against every table that exists right now.
    pub fn add_system(
        &self,
        signature_text: &str,
        phase: Phase,
        period: f32,
        callback: impl Fn(Handle, &RowsView) + Send + Sync + 'static,
    ) -> Result<system::Id> {
        let id = self.entities.alloc();
        let signature = self.parse_signature(signature_text)?;
        let record = ColumnSystemRecord::new(id, signature, phase, period, callback);
        let entity_index = self.entity_index.read().expect("entity index poisoned");
        Ok(self
            .systems
            .write()
            .expect("system registry poisoned")
            .add_column_system(record, &self.types, &entity_index))
    }

    /// Register a reactive (row) system.
    pub fn on(
        &self,
        trigger: Trigger,
        signature_text: &str,
        callback: impl Fn(Handle, &[entity::Id]) + Send + Sync + 'static,
    ) -> Result<system::Id> {
        let id = self.entities.alloc();
        let signature = self.parse_signature(signature_text)?;
        let record = RowSystemRecord::new(id, signature, trigger, callback);
        Ok(self.systems.write().expect("system registry poisoned").add_row_system(record))
    }

    pub fn set_enabled(&self, system: system::Id, enabled: bool) {
        if let Some(record) = self
            .systems
            .write()
            .expect("system registry poisoned")
            .column_system_mut(system)
        {
            record.enabled = enabled;
        }
    }

    /// Run a `Manual` (on-demand) column system immediately, against the
    /// main stage. Has no effect if `system` is not a column system or is
    /// disabled.
    pub fn run_system(&self, system: system::Id, delta_time: f32) {
        let handle = Handle::Main(self);
        let (callback, matched_tables, refs) = {
            let systems = self.systems.read().expect("system registry poisoned");
            let Some(record) = systems.column_system(system) else {
                return;
            };
            if !record.enabled {
                return;
            }
            (record.callback(), record.matched_tables.clone(), record.refs.clone())
        };
        crate::ecs::scheduler::invoke_matched_tables(self, &callback, &matched_tables, &refs, delta_time, handle);
    }

    // --- Frame progression (§4.5, §4.7) ---------------------------------

    /// Advance one frame: walk every phase in order, dispatching column
    /// systems inline or across the worker pool per [`Config::thread_count`],
    /// then — if [`Config::auto_merge`] is set — merge the frame's buffered
    /// mutations.
    pub fn update(&self, delta_time: f32) {
        let start = self.config.measure_frame_time.then(std::time::Instant::now);

        self.scheduler.run_frame(self, &self.temp_stage, delta_time);
        self.frame_count.fetch_add(1, Ordering::Relaxed);

        if self.config.auto_merge {
            self.merge();
        }

        if let Some(start) = start {
            log::trace!("frame {} took {:?}", self.frame_count(), start.elapsed());
        }
    }

    /// Merge every buffered mutation — both the frame-scoped stage the
    /// scheduler fills and the main stage callers write to directly between
    /// frames — into the real tables (§4.6).
    pub fn merge(&self) {
        self.temp_stage.merge(self);
        self.main_stage.merge(self);
    }
}

impl NameResolver for World {
    fn resolve(&self, name: &str) -> Option<entity::Id> {
        self.lookup(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::system::Phase;

    #[test]
    fn component_mints_a_fresh_descriptor_backed_id() {
        // Given
        let world = World::new(Config::default());

        // When
        let position = world.component(8);

        // Then
        assert!(world.components().is_component(position));
        assert_eq!(world.components().descriptor(position).unwrap().size(), 8);
    }

    #[test]
    fn prefab_is_reserved_as_the_first_entity_id() {
        // Given
        let world = World::new(Config::default());

        // Then
        assert!(world.components().is_prefab(PREFAB));
    }

    #[test]
    fn names_resolve_through_the_world_itself() {
        // Given
        let world = World::new(Config::default());
        let e = world.allocate();

        // When
        world.set_name("Player", e);

        // Then
        assert_eq!(world.lookup("Player"), Some(e));
        assert_eq!(NameResolver::resolve(&world, "Player"), Some(e));
        assert_eq!(world.lookup("Nobody"), None);
    }

    #[test]
    fn spawn_merge_set_get_round_trips_through_the_world_facade() {
        // Given
        let world = World::new(Config::default());
        let position = world.component(4);

        // When
        let entity = world.spawn();
        world.merge();
        world.set(entity, position, vec![1, 2, 3, 4]);
        world.merge();

        // Then
        assert!(world.has(entity, position));
        assert_eq!(world.get(entity, position).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn despawn_merge_removes_the_entity() {
        // Given
        let world = World::new(Config::default());
        let entity = world.spawn();
        world.merge();

        // When
        world.despawn(entity);
        world.merge();

        // Then
        assert!(!world.is_alive(entity));
    }

    #[test]
    fn update_ticks_systems_and_auto_merges_by_default() {
        // Given
        let world = World::new(Config::default());
        let position = world.component(4);
        world.set_name("Position", position);
        let entity = world.spawn();
        world.merge();
        world.set(entity, position, vec![0, 0, 0, 0]);
        world.merge();

        world
            .add_system("Position", Phase::OnUpdate, 0.0, move |handle, rows| {
                for &e in rows.entities {
                    handle.stage().write(e, position, vec![9, 9, 9, 9]);
                }
            })
            .unwrap();

        // When
        world.update(1.0 / 60.0);

        // Then — auto_merge means the write above is already visible.
        assert_eq!(world.get(entity, position).unwrap(), vec![9, 9, 9, 9]);
    }

    #[test]
    fn auto_merge_disabled_requires_an_explicit_merge() {
        // Given
        let world = World::new(Config { auto_merge: false, ..Config::default() });
        let position = world.component(4);
        world.set_name("Position", position);
        let entity = world.spawn();
        world.merge();
        world.set(entity, position, vec![0, 0, 0, 0]);
        world.merge();

        world
            .add_system("Position", Phase::OnUpdate, 0.0, move |handle, rows| {
                for &e in rows.entities {
                    handle.stage().write(e, position, vec![5, 5, 5, 5]);
                }
            })
            .unwrap();

        // When
        world.update(1.0 / 60.0);

        // Then
        assert_eq!(world.get(entity, position).unwrap(), vec![0, 0, 0, 0]);
        world.merge();
        assert_eq!(world.get(entity, position).unwrap(), vec![5, 5, 5, 5]);
    }
}
