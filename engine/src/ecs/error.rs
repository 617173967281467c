//! The error kinds surfaced by structural and query operations.
//!
//! Errors inside system callbacks are the callback's own responsibility — the
//! runtime does not catch panics or propagate callback-internal failures. The
//! kinds here are only for the runtime's own entry points (spawn, add/remove/
//! set, signature parsing, stage merge).

use std::fmt;

use crate::ecs::entity;

/// The error surface for fallible `World`/`Stage` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An entity id was not present in the entity index.
    #[error("invalid handle: entity {0:?} is not alive")]
    InvalidHandle(entity::Id),

    /// A type id (or a component id used to build one) did not denote a
    /// component or prefab.
    #[error("invalid type: {0}")]
    InvalidType(String),

    /// The signature parser rejected malformed input.
    #[error("signature parse error at byte {position}: {message}")]
    ParseError {
        /// Byte offset into the signature string where parsing failed.
        position: usize,
        /// Human-readable description of the malformed token.
        message: String,
    },

    /// A signature referenced an identifier that does not resolve to a known
    /// entity.
    #[error("unknown name in signature: {0:?}")]
    UnknownName(String),

    /// A read was attempted against a component the entity does not have.
    #[error("entity {entity:?} has no component {component:?}")]
    MissingComponent {
        /// The entity that was read.
        entity: entity::Id,
        /// The component that was missing.
        component: entity::Id,
    },

    /// A structural mutation was attempted in a way the data model forbids,
    /// e.g. assigning a second prefab to a table, or mutating outside of any
    /// active stage.
    #[error("conflicting state: {0}")]
    ConflictingState(String),
}

impl Error {
    pub(crate) fn invalid_type(message: impl fmt::Display) -> Self {
        Error::InvalidType(message.to_string())
    }

    pub(crate) fn conflict(message: impl fmt::Display) -> Self {
        Error::ConflictingState(message.to_string())
    }
}

/// A convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Raised internally when a previously computed job schedule no longer
/// matches the set of matched tables for a system. Per the spec this is
/// never surfaced to callers — it only ever triggers an internal re-plan on
/// the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScheduleInvalid;

impl fmt::Display for ScheduleInvalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schedule invalidated; re-plan required")
    }
}
