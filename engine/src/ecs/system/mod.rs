//! Column (periodic) and row (reactive) systems: registration, pre-matching
//! against tables, and dispatch (§2 "System registry", §4.4, §4.5).

pub mod matcher;
pub mod phase;
pub mod record;
pub mod registry;

pub use phase::{Phase, Trigger};
pub use record::{
    ColumnCallback, ColumnSystemRecord, ColumnView, FetchDescriptor, MatchedTable, RefKind, RefSlot,
    RowCallback, RowSystemRecord, RowsView,
};
pub use registry::Registry;

/// A system identifier. Systems are entities (§3), so this is the same type
/// as every other id in the world.
pub type Id = crate::ecs::entity::Id;
