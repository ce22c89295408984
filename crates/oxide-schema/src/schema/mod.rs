//! Schema element model.
//!
//! Columns, indexes and foreign keys are plain values tagged with their
//! dialect. A [`State`] groups them into a snapshot of one table, a
//! [`Comparator`] diffs two snapshots and a [`Table`] pairs the introspected
//! snapshot with the declared one.

mod column;
mod comparator;
mod foreign_key;
mod index;
mod state;
mod table;

pub use column::{Column, ColumnAttributes, ColumnField, DefaultValue};
pub use comparator::Comparator;
pub use foreign_key::{ForeignKey, ForeignKeyAction};
pub use index::{Index, SortOrder};
pub use state::{ElementKind, RenameIntent, State};
pub use table::Table;
