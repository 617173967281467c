//! The signature grammar (§4.3): the textual DSL a system declares which
//! components it wants, from where, and under what operator.
//!
//! ```text
//! sig      := column ( ',' column )*
//! column   := op? source? ident ( '|' ident )*
//! op       := '!' | '?'
//! source   := ident '.'        // FromEntity(ident)
//!          | 'CONTAINER.'      // FromContainer
//!          | 'SYSTEM.'         // FromSystem
//!          | 'ID.'             // FromId
//!          | '$.'              // FromSingleton
//! ```
//!
//! A run of `|`-joined idents within one column collapses into a single
//! [`Term`] whose [`Target`] is the set of alternatives (§4.3); the matcher
//! resolves it to whichever one is actually present in a candidate table.

use crate::ecs::component;
use crate::ecs::entity;
use crate::ecs::error::{Error, Result};

/// Where a column's component data is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// The component lives in the matched table itself.
    SelfEntity,
    /// The component lives on the matched entity's container.
    ///
    /// This spec does not model containment relationships (no API
    /// establishes a container link), so a `Container` term used with
    /// [`Operator::And`] never resolves and the table it appears on simply
    /// never matches — see `DESIGN.md`.
    Container,
    /// The component lives on the system's own entity.
    System,
    /// The component is identified directly by id rather than through the
    /// descriptor lookup `Self` goes through.
    ById,
    /// The component lives in the world's singleton side table (§4.9).
    Singleton,
    /// The component lives on a specific, named entity resolved at parse
    /// time.
    FromEntity(entity::Id),
}

/// How a term participates in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Not,
    Optional,
}

/// What a term resolves against: one component, or — for an OR run — the
/// set of alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    One(component::Id),
    Choice(Vec<component::Id>),
}

impl Target {
    /// All component ids a term's target could resolve to.
    pub fn alternatives(&self) -> &[component::Id] {
        match self {
            Target::One(id) => std::slice::from_ref(id),
            Target::Choice(ids) => ids,
        }
    }
}

/// One parsed signature column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub kind: ElementKind,
    pub operator: Operator,
    pub target: Target,
}

/// A fully parsed signature, keeping the original text for introspection
/// (§6: "signatures ... must be preserved verbatim on introspection").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    source: String,
    terms: Vec<Term>,
}

impl Signature {
    /// The signature text this was parsed from.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed columns, in declaration order.
    #[inline]
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }
}

/// Resolves a signature's entity-name references (`ident.` sources) to
/// entity ids, and its component-name idents to component ids.
///
/// A name denotes whatever entity was given that name — a component, a
/// prefab, a plain entity — signatures do not distinguish the two at parse
/// time; that distinction is enforced later, when the id is actually used.
pub trait NameResolver {
    fn resolve(&self, name: &str) -> Option<entity::Id>;
}

/// Parse `text` against `resolve` for name lookups.
pub fn parse(text: &str, resolve: &dyn NameResolver) -> Result<Signature> {
    let mut terms = Vec::new();
    let mut offset = 0;

    for raw in text.split(',') {
        if raw.trim().is_empty() {
            return Err(Error::ParseError {
                position: offset,
                message: "empty column".to_string(),
            });
        }
        terms.push(parse_term(raw, offset, resolve)?);
        offset += raw.len() + 1;
    }

    if terms.is_empty() {
        return Err(Error::ParseError {
            position: 0,
            message: "signature has no columns".to_string(),
        });
    }

    Ok(Signature {
        source: text.to_string(),
        terms,
    })
}

fn parse_term(raw: &str, position: usize, resolve: &dyn NameResolver) -> Result<Term> {
    let mut body = raw.trim();

    let mut operator = Operator::And;
    match body.chars().next() {
        Some('!') => {
            operator = Operator::Not;
            body = &body[1..];
        }
        Some('?') => {
            operator = Operator::Optional;
            body = &body[1..];
        }
        _ => {}
    }

    let (kind, rest) = parse_source(body, position, resolve)?;

    let names: Vec<&str> = rest.split('|').map(str::trim).collect();
    if names.iter().any(|name| name.is_empty()) {
        return Err(Error::ParseError {
            position,
            message: format!("malformed column {raw:?}"),
        });
    }

    let mut ids = Vec::with_capacity(names.len());
    for name in &names {
        ids.push(
            resolve
                .resolve(name)
                .ok_or_else(|| Error::UnknownName((*name).to_string()))?,
        );
    }

    let target = if ids.len() == 1 {
        Target::One(ids[0])
    } else {
        operator = Operator::Or;
        Target::Choice(ids)
    };

    Ok(Term {
        kind,
        operator,
        target,
    })
}

/// Strip a recognized source prefix off `body`, returning the element kind
/// and the remaining ident(s). Defaults to [`ElementKind::SelfEntity`] when
/// no prefix is present.
fn parse_source<'a>(
    body: &'a str,
    position: usize,
    resolve: &dyn NameResolver,
) -> Result<(ElementKind, &'a str)> {
    if let Some(rest) = body.strip_prefix("CONTAINER.") {
        return Ok((ElementKind::Container, rest));
    }
    if let Some(rest) = body.strip_prefix("SYSTEM.") {
        return Ok((ElementKind::System, rest));
    }
    if let Some(rest) = body.strip_prefix("ID.") {
        return Ok((ElementKind::ById, rest));
    }
    if let Some(rest) = body.strip_prefix("$.") {
        return Ok((ElementKind::Singleton, rest));
    }
    if let Some(dot) = body.find('.') {
        let name = &body[..dot];
        if name.is_empty() {
            return Err(Error::ParseError {
                position,
                message: "empty source entity name".to_string(),
            });
        }
        let entity = resolve
            .resolve(name)
            .ok_or_else(|| Error::UnknownName(name.to_string()))?;
        return Ok((ElementKind::FromEntity(entity), &body[dot + 1..]));
    }
    Ok((ElementKind::SelfEntity, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TestNames(HashMap<&'static str, entity::Id>);

    impl NameResolver for TestNames {
        fn resolve(&self, name: &str) -> Option<entity::Id> {
            self.0.get(name).copied()
        }
    }

    fn names() -> TestNames {
        TestNames(HashMap::from([
            ("Position", entity::Id::new(1)),
            ("Velocity", entity::Id::new(2)),
            ("Acceleration", entity::Id::new(3)),
            ("Health", entity::Id::new(4)),
            ("Player", entity::Id::new(5)),
        ]))
    }

    #[test]
    fn plain_ident_is_a_self_and_term() {
        // Given / When
        let sig = parse("Position", &names()).unwrap();

        // Then
        assert_eq!(sig.terms().len(), 1);
        let term = &sig.terms()[0];
        assert_eq!(term.kind, ElementKind::SelfEntity);
        assert_eq!(term.operator, Operator::And);
        assert_eq!(term.target, Target::One(entity::Id::new(1)));
    }

    #[test]
    fn not_and_optional_operators_are_recognized() {
        // Given / When
        let sig = parse("!Position, ?Velocity", &names()).unwrap();

        // Then
        assert_eq!(sig.terms()[0].operator, Operator::Not);
        assert_eq!(sig.terms()[1].operator, Operator::Optional);
    }

    #[test]
    fn or_run_collapses_into_one_term_with_a_choice_target() {
        // Given / When — the S3 scenario signature.
        let sig = parse("Position, Velocity|Acceleration", &names()).unwrap();

        // Then
        assert_eq!(sig.terms().len(), 2);
        let or_term = &sig.terms()[1];
        assert_eq!(or_term.operator, Operator::Or);
        assert_eq!(
            or_term.target,
            Target::Choice(vec![entity::Id::new(2), entity::Id::new(3)])
        );
    }

    #[test]
    fn named_entity_source_resolves_from_entity() {
        // Given / When
        let sig = parse("Player.Health", &names()).unwrap();

        // Then
        assert_eq!(sig.terms()[0].kind, ElementKind::FromEntity(entity::Id::new(5)));
        assert_eq!(sig.terms()[0].target, Target::One(entity::Id::new(4)));
    }

    #[test]
    fn reserved_source_prefixes_are_recognized() {
        // Given / When
        let sig = parse("CONTAINER.Position, SYSTEM.Health, ID.Velocity, $.Health", &names()).unwrap();

        // Then
        assert_eq!(sig.terms()[0].kind, ElementKind::Container);
        assert_eq!(sig.terms()[1].kind, ElementKind::System);
        assert_eq!(sig.terms()[2].kind, ElementKind::ById);
        assert_eq!(sig.terms()[3].kind, ElementKind::Singleton);
    }

    #[test]
    fn unresolvable_name_is_an_unknown_name_error() {
        // Given / When
        let err = parse("Nonexistent", &names()).unwrap_err();

        // Then
        assert!(matches!(err, Error::UnknownName(name) if name == "Nonexistent"));
    }

    #[test]
    fn empty_column_is_a_parse_error() {
        // Given / When
        let err = parse("Position,,Velocity", &names()).unwrap_err();

        // Then
        assert!(matches!(err, Error::ParseError { .. }));
    }

    #[test]
    fn source_preserves_the_original_text_verbatim() {
        // Given / When
        let sig = parse("Position, !Velocity", &names()).unwrap();

        // Then
        assert_eq!(sig.source(), "Position, !Velocity");
    }
}
