//! The system matcher (§4.4): decides whether a column system's signature
//! matches a candidate table, and resolves each column to a fetch
//! descriptor.

use crate::ecs::component;
use crate::ecs::entity;
use crate::ecs::signature::{Operator, Term};
use crate::ecs::storage::Table;
use crate::ecs::system::record::{ColumnSystemRecord, FetchDescriptor, MatchedTable};
use crate::ecs::type_registry::{TypeId, TypeRegistry};

/// Whether `record`'s externally sourced AND/NOT filters are currently
/// satisfied. These never depend on the candidate table (they test a fixed
/// external entity), so they gate the whole record once instead of being
/// re-evaluated per table.
pub fn prematch(record: &ColumnSystemRecord, entity_index: &entity::Index, type_registry: &TypeRegistry) -> bool {
    for &(entity, component) in &record.and_from_entity {
        if !component_present_on(entity, component, entity_index, type_registry) {
            return false;
        }
    }
    for &(entity, component) in &record.not_from_entity {
        if component_present_on(entity, component, entity_index, type_registry) {
            return false;
        }
    }
    for &component in &record.and_from_system {
        if !component_present_on(record.id, component, entity_index, type_registry) {
            return false;
        }
    }
    true
}

fn component_present_on(
    entity: entity::Id,
    component: component::Id,
    entity_index: &entity::Index,
    type_registry: &TypeRegistry,
) -> bool {
    match entity_index.get(entity) {
        Some(location) => type_registry.sequence_of(location.type_id).contains(&component),
        None => false,
    }
}

/// Try to match `record`'s signature against `table`. Returns `None` if any
/// AND/NOT/OR column fails (§4.4); OPTIONAL columns never fail the match.
///
/// Assumes [`prematch`] has already passed for `record` — this only
/// resolves the columns that do depend on the candidate table.
pub fn match_table(record: &ColumnSystemRecord, type_id: TypeId, table: &Table) -> Option<MatchedTable> {
    for &component in &record.not_from_component {
        if table.column_offset(component).is_some() {
            return None;
        }
    }

    let mut fetches = Vec::with_capacity(record.signature.terms().len());

    for (index, term) in record.signature.terms().iter().enumerate() {
        if let Some(slot) = record.term_ref_slot.get(index).copied().flatten() {
            // Resolved once for the whole record (§9: refs are rebuilt only
            // when the pre-match changes, not per table).
            fetches.push(FetchDescriptor::Ref(slot));
            continue;
        }

        fetches.push(resolve_table_sourced(term, table)?);
    }

    Some(MatchedTable { type_id, fetches })
}

fn resolve_table_sourced(term: &Term, table: &Table) -> Option<FetchDescriptor> {
    use crate::ecs::signature::ElementKind;

    match term.kind {
        ElementKind::SelfEntity | ElementKind::ById => {
            let descriptor = self_descriptor(term, table);
            match term.operator {
                Operator::And | Operator::Or => descriptor,
                Operator::Not => match descriptor {
                    Some(_) => None,
                    None => Some(FetchDescriptor::AbsentOptional),
                },
                Operator::Optional => Some(descriptor.unwrap_or(FetchDescriptor::AbsentOptional)),
            }
        }
        // Containment is not modeled (§4.3 doc comment on `ElementKind::Container`):
        // AND/OR columns sourced this way can never be satisfied; NOT/OPTIONAL
        // are trivially satisfied as absent.
        ElementKind::Container => match term.operator {
            Operator::And | Operator::Or => None,
            Operator::Not | Operator::Optional => Some(FetchDescriptor::AbsentOptional),
        },
        // FromEntity/System/Singleton always resolve through `term_ref_slot`.
        ElementKind::FromEntity(_) | ElementKind::System | ElementKind::Singleton => None,
    }
}

fn self_descriptor(term: &Term, table: &Table) -> Option<FetchDescriptor> {
    for &component in term.target.alternatives() {
        if let Some(offset) = table.column_offset(component) {
            return Some(FetchDescriptor::Column(offset));
        }
    }
    None
}

/// Whether any AND/OR term of `signature` targets one of `changed` (§4.5:
/// on-add/on-remove/on-set fire "for each newly added/removed/set component
/// id whose type the system matches" — a signature that merely happens to
/// match an entity's full type must not fire on every unrelated write to
/// that entity, only on a write that touches one of its own AND/OR columns).
pub fn signature_targets_any(signature: &crate::ecs::signature::Signature, changed: &[component::Id]) -> bool {
    signature.terms().iter().any(|term| {
        matches!(term.operator, Operator::And | Operator::Or)
            && term.target.alternatives().iter().any(|c| changed.contains(c))
    })
}

/// A cheaper membership-only check used to gate row systems (§4.5 reactive
/// execution): does `sequence` satisfy `signature`'s AND/OR/NOT columns,
/// ignoring source kind and fetch-descriptor bookkeeping entirely.
pub fn signature_matches_sequence(signature: &crate::ecs::signature::Signature, sequence: &[component::Id]) -> bool {
    for term in signature.terms() {
        let present = term.target.alternatives().iter().any(|c| sequence.contains(c));
        match term.operator {
            Operator::And | Operator::Or => {
                if !present {
                    return false;
                }
            }
            Operator::Not => {
                if present {
                    return false;
                }
            }
            Operator::Optional => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component as comp;
    use crate::ecs::signature::{self, NameResolver};
    use crate::ecs::system::phase::Phase;
    use crate::ecs::system::record::ColumnSystemRecord;
    use crate::ecs::type_registry::TypeRegistry;
    use std::collections::HashMap;

    struct Names(HashMap<&'static str, entity::Id>);
    impl NameResolver for Names {
        fn resolve(&self, name: &str) -> Option<entity::Id> {
            self.0.get(name).copied()
        }
    }

    fn setup() -> (comp::Registry, TypeRegistry, Names) {
        let components = comp::Registry::new();
        let position = comp::Id::new(10);
        let velocity = comp::Id::new(11);
        let acceleration = comp::Id::new(12);
        components.declare_component(position, 8);
        components.declare_component(velocity, 8);
        components.declare_component(acceleration, 8);
        let types = TypeRegistry::new(&components);
        let names = Names(HashMap::from([
            ("Position", position),
            ("Velocity", velocity),
            ("Acceleration", acceleration),
        ]));
        (components, types, names)
    }

    #[test]
    fn and_column_requires_presence_in_the_table() {
        // Given
        let (components, types, names) = setup();
        let with_both = types
            .intern(&[*names.0.get("Position").unwrap(), *names.0.get("Velocity").unwrap()], &components)
            .unwrap();
        let sig = signature::parse("Position, Velocity", &names).unwrap();
        let record = ColumnSystemRecord::new(entity::Id::new(1), sig, Phase::OnUpdate, 0.0, |_, _| {});
        let entity_index = entity::Index::new();

        // Then
        assert!(prematch(&record, &entity_index, &types));
        types.with_table(with_both, |table| {
            assert!(match_table(&record, with_both, table).is_some());
        });
    }

    #[test]
    fn and_column_rejects_a_table_missing_the_component() {
        // Given
        let (components, types, names) = setup();
        let position_only = types
            .intern(&[*names.0.get("Position").unwrap()], &components)
            .unwrap();
        let sig = signature::parse("Position, Velocity", &names).unwrap();
        let record = ColumnSystemRecord::new(entity::Id::new(1), sig, Phase::OnUpdate, 0.0, |_, _| {});

        // Then
        types.with_table(position_only, |table| {
            assert!(match_table(&record, position_only, table).is_none());
        });
    }

    #[test]
    fn or_column_resolves_to_whichever_alternative_is_present() {
        // Given — the S3 scenario.
        let (components, types, names) = setup();
        let position = *names.0.get("Position").unwrap();
        let velocity = *names.0.get("Velocity").unwrap();
        let acceleration = *names.0.get("Acceleration").unwrap();
        let with_velocity = types.intern(&[position, velocity], &components).unwrap();
        let with_acceleration = types.intern(&[position, acceleration], &components).unwrap();
        let sig = signature::parse("Position, Velocity|Acceleration", &names).unwrap();
        let record = ColumnSystemRecord::new(entity::Id::new(1), sig, Phase::OnUpdate, 0.0, |_, _| {});

        // Then
        types.with_table(with_velocity, |table| {
            assert!(match_table(&record, with_velocity, table).is_some());
        });
        types.with_table(with_acceleration, |table| {
            assert!(match_table(&record, with_acceleration, table).is_some());
        });
    }

    #[test]
    fn not_column_rejects_a_table_carrying_the_component() {
        // Given
        let (components, types, names) = setup();
        let position = *names.0.get("Position").unwrap();
        let velocity = *names.0.get("Velocity").unwrap();
        let with_velocity = types.intern(&[position, velocity], &components).unwrap();
        let sig = signature::parse("Position, !Velocity", &names).unwrap();
        let record = ColumnSystemRecord::new(entity::Id::new(1), sig, Phase::OnUpdate, 0.0, |_, _| {});

        // Then
        types.with_table(with_velocity, |table| {
            assert!(match_table(&record, with_velocity, table).is_none());
        });
    }

    #[test]
    fn optional_column_matches_even_when_absent() {
        // Given
        let (components, types, names) = setup();
        let position = *names.0.get("Position").unwrap();
        let position_only = types.intern(&[position], &components).unwrap();
        let sig = signature::parse("Position, ?Velocity", &names).unwrap();
        let record = ColumnSystemRecord::new(entity::Id::new(1), sig, Phase::OnUpdate, 0.0, |_, _| {});

        // Then
        types.with_table(position_only, |table| {
            let matched = match_table(&record, position_only, table).unwrap();
            assert_eq!(matched.fetches[1], FetchDescriptor::AbsentOptional);
        });
    }
}
