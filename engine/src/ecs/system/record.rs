use std::sync::Arc;

use crate::ecs::component;
use crate::ecs::entity;
use crate::ecs::handle::Handle;
use crate::ecs::signature::{ElementKind, Operator, Signature, Target};
use crate::ecs::system::phase::{Phase, Trigger};
use crate::ecs::system::Id;
use crate::ecs::type_registry::TypeId;

/// Where a matched signature column's data comes from, resolved once per
/// matched table (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDescriptor {
    /// A column offset within the matched table.
    Column(usize),
    /// An index into the system's `refs` (an external entity's data).
    Ref(usize),
    /// An `OPTIONAL` column whose component is absent from this table.
    AbsentOptional,
}

/// One table a column system matches, with its columns' resolved fetch
/// descriptors.
#[derive(Debug, Clone)]
pub struct MatchedTable {
    pub type_id: TypeId,
    pub fetches: Vec<FetchDescriptor>,
}

/// Where a [`RefSlot`] reads its entity from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// A literal entity — either a `FromEntity(ident)` source, or a
    /// `SYSTEM.` source resolved to the system's own id at construction
    /// time (§4.8: the system is itself an entity).
    Entity(entity::Id),
    /// A `$.` source: data comes from the world's singleton table rather
    /// than any entity's row (§4.9).
    Singleton,
}

/// An external entity (or the singleton table) a signature column reads
/// from (§3 "refs").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefSlot {
    pub kind: RefKind,
    pub component: component::Id,
}

/// A strided view over one signature column's data for one table's rows.
/// `stride` is `0` for ref columns (every row reads the same pointer) and
/// for absent optionals (`ptr` is null and must not be dereferenced).
pub struct ColumnView {
    pub ptr: *mut u8,
    pub stride: usize,
    pub present: bool,
}

// Raw pointers here only ever point into table/stage storage that outlives
// the callback invocation building this view; the view itself is not stored
// past the call.
unsafe impl Send for ColumnView {}

/// What a periodic system callback receives each time it is invoked against
/// one table (§4.5, §6).
pub struct RowsView<'a> {
    pub entities: &'a [entity::Id],
    pub delta_time: f32,
    pub columns: Vec<ColumnView>,
    /// Backing storage for ref columns that don't live in any table (e.g. a
    /// singleton's bytes), kept alive for exactly the duration of the
    /// callback this view is passed to. Not constructible outside the crate.
    pub(crate) owned: Vec<Vec<u8>>,
}

// `Arc` rather than `Box`: the scheduler and stage merge both need to clone
// a callback out from behind a registry read lock and invoke it *after*
// releasing that lock (§5 "no locks are held across system callbacks").
pub type ColumnCallback = Arc<dyn Fn(Handle, &RowsView) + Send + Sync>;
pub type RowCallback = Arc<dyn Fn(Handle, &[entity::Id]) + Send + Sync>;

/// A registered periodic system (§3 "Column system record").
pub struct ColumnSystemRecord {
    pub id: Id,
    pub signature: Signature,
    pub phase: Phase,
    pub period: f32,
    pub(crate) time_passed: f32,
    pub enabled: bool,

    // Pre-reduced filters (§3): these never change across table matches, so
    // they are computed once here instead of re-walking the signature for
    // every candidate table.
    pub(crate) and_from_entity: Vec<(entity::Id, component::Id)>,
    pub(crate) not_from_entity: Vec<(entity::Id, component::Id)>,
    pub(crate) not_from_component: Vec<component::Id>,
    pub(crate) and_from_system: Vec<component::Id>,

    pub(crate) matched_tables: Vec<MatchedTable>,
    pub(crate) inactive_tables: Vec<TypeId>,
    pub(crate) refs: Vec<RefSlot>,
    /// For each signature term, the index into `refs` it resolves through,
    /// if it is sourced externally (`FromEntity`/`System`/`Singleton`).
    pub(crate) term_ref_slot: Vec<Option<usize>>,

    callback: ColumnCallback,
}

impl ColumnSystemRecord {
    pub fn new(
        id: Id,
        signature: Signature,
        phase: Phase,
        period: f32,
        callback: impl Fn(Handle, &RowsView) + Send + Sync + 'static,
    ) -> Self {
        let mut and_from_entity = Vec::new();
        let mut not_from_entity = Vec::new();
        let mut not_from_component = Vec::new();
        let mut and_from_system = Vec::new();
        let mut refs = Vec::new();
        let mut term_ref_slot = Vec::with_capacity(signature.terms().len());

        for term in signature.terms() {
            if let Target::One(component) = term.target {
                match (term.operator, term.kind) {
                    (Operator::And, ElementKind::FromEntity(entity)) => {
                        and_from_entity.push((entity, component))
                    }
                    (Operator::Not, ElementKind::FromEntity(entity)) => {
                        not_from_entity.push((entity, component))
                    }
                    (Operator::Not, ElementKind::SelfEntity) => not_from_component.push(component),
                    (Operator::And, ElementKind::System) => and_from_system.push(component),
                    _ => {}
                }

                let ref_kind = match term.kind {
                    ElementKind::FromEntity(entity) => Some(RefKind::Entity(entity)),
                    ElementKind::System => Some(RefKind::Entity(id)),
                    ElementKind::Singleton => Some(RefKind::Singleton),
                    _ => None,
                };
                if let Some(kind) = ref_kind {
                    term_ref_slot.push(Some(refs.len()));
                    refs.push(RefSlot { kind, component });
                    continue;
                }
            }
            term_ref_slot.push(None);
        }

        Self {
            id,
            signature,
            phase,
            period,
            time_passed: 0.0,
            enabled: true,
            and_from_entity,
            not_from_entity,
            not_from_component,
            and_from_system,
            matched_tables: Vec::new(),
            inactive_tables: Vec::new(),
            refs,
            term_ref_slot,
            callback: Arc::new(callback),
        }
    }

    /// Advance this system's periodic accumulator by `delta_time`. Returns
    /// whether the system should run this frame, and if so subtracts the
    /// period back out (§4.5 step 1, §8 invariant 6).
    pub fn tick(&mut self, delta_time: f32) -> bool {
        if self.period <= 0.0 {
            return true;
        }
        self.time_passed += delta_time;
        if self.time_passed >= self.period {
            self.time_passed -= self.period;
            true
        } else {
            false
        }
    }

    pub fn invoke(&self, handle: Handle, rows: &RowsView) {
        (self.callback)(handle, rows)
    }

    /// A cheap clone of the callback handle, for invoking after releasing a
    /// registry lock (§5).
    pub fn callback(&self) -> ColumnCallback {
        self.callback.clone()
    }
}

/// A registered reactive system (§3 "Row system record").
pub struct RowSystemRecord {
    pub id: Id,
    pub signature: Signature,
    pub trigger: Trigger,
    /// Component ids to pass to the callback, in signature order.
    pub(crate) component_ids: Vec<component::Id>,
    callback: RowCallback,
}

impl RowSystemRecord {
    pub fn new(
        id: Id,
        signature: Signature,
        trigger: Trigger,
        callback: impl Fn(Handle, &[entity::Id]) + Send + Sync + 'static,
    ) -> Self {
        let component_ids = signature
            .terms()
            .iter()
            .flat_map(|term| term.target.alternatives().iter().copied())
            .collect();

        Self {
            id,
            signature,
            trigger,
            component_ids,
            callback: Arc::new(callback),
        }
    }

    pub fn invoke(&self, handle: Handle, entities: &[entity::Id]) {
        (self.callback)(handle, entities)
    }

    /// A cheap clone of the callback handle, for invoking after releasing a
    /// registry lock (§5).
    pub fn callback(&self) -> RowCallback {
        self.callback.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_fires_once_per_whole_period_elapsed() {
        // Given
        let signature = test_signature();
        let mut record = ColumnSystemRecord::new(
            Id::new(1),
            signature,
            Phase::OnUpdate,
            1.0,
            |_, _| {},
        );

        // When / Then — Δ=2.5, p=1.0 ⇒ ⌊Δ/p⌋ = 2 fires (§8 invariant 6).
        assert!(!record.tick(0.4));
        assert!(record.tick(0.6)); // time_passed: 1.0 -> fires, resets to 0.0
        assert!(!record.tick(0.9));
        assert!(record.tick(0.1)); // time_passed: 1.0 -> fires again
    }

    #[test]
    fn zero_period_always_fires() {
        // Given
        let mut record = ColumnSystemRecord::new(
            Id::new(1),
            test_signature(),
            Phase::OnUpdate,
            0.0,
            |_, _| {},
        );

        // Then
        assert!(record.tick(0.0));
        assert!(record.tick(100.0));
    }

    fn test_signature() -> Signature {
        struct NoNames;
        impl crate::ecs::signature::NameResolver for NoNames {
            fn resolve(&self, _name: &str) -> Option<entity::Id> {
                Some(entity::Id::new(0))
            }
        }
        crate::ecs::signature::parse("Position", &NoNames).unwrap()
    }
}
