//! Archetype-table storage.
//!
//! ```text
//!           entity::Index                      TypeRegistry
//!         (id -> Location) ----------------->  (type_id -> Table)
//!                                                     |
//!                                                     v
//!                                          +---------------------+
//!                                          | Table                |
//!                                          |  entities: [Id]       |
//!                                          |  columns: [Column]    |
//!                                          +---------------------+
//! ```
//!
//! A [`Table`] holds every entity sharing one exact component set, laid out
//! column-major (§3). [`Column`] is the raw byte buffer backing one
//! component's data across all rows of a table. [`Location`] is what the
//! entity index stores per-entity: which table, and which row.

mod column;
mod location;
mod row;
mod table;

pub use column::Column;
pub use location::Location;
pub use row::Row;
pub use table::{Table, Transition};
