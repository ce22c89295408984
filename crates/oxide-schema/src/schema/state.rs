//! Table state snapshots.

use serde::{Deserialize, Serialize};

use super::{Column, ForeignKey, Index};

/// Kind of element a rename intent applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Column,
    Index,
}

/// Records that an element was renamed, so the comparator pairs the old
/// and new definitions instead of reporting a drop and an add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameIntent {
    pub kind: ElementKind,
    pub from: String,
    pub to: String,
}

/// Snapshot of one table: columns, indexes, foreign keys and primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    name: String,
    exists: bool,
    columns: Vec<Column>,
    indexes: Vec<Index>,
    foreign_keys: Vec<ForeignKey>,
    primary_keys: Vec<String>,
    #[serde(default)]
    intents: Vec<RenameIntent>,
}

impl State {
    /// Creates an empty state for a table that does not exist.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exists: false,
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            primary_keys: Vec::new(),
            intents: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub const fn exists(&self) -> bool {
        self.exists
    }

    pub(crate) fn set_exists(&mut self, exists: bool) {
        self.exists = exists;
    }

    /// Marks the table as dropped.
    pub fn declare_dropped(&mut self) {
        self.exists = false;
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name() == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Adds a column, replacing one with the same name in place.
    pub fn register_column(&mut self, column: Column) {
        match self.columns.iter().position(|c| c.name() == column.name()) {
            Some(position) => self.columns[position] = column,
            None => self.columns.push(column),
        }
    }

    /// Replaces the column named `name` (possibly under a new name),
    /// keeping its position.
    pub(crate) fn replace_column(&mut self, name: &str, column: Column) {
        match self.columns.iter().position(|c| c.name() == name) {
            Some(position) => self.columns[position] = column,
            None => self.register_column(column),
        }
    }

    /// Removes a column.
    pub fn forget_column(&mut self, name: &str) -> Option<Column> {
        let position = self.columns.iter().position(|c| c.name() == name)?;
        Some(self.columns.remove(position))
    }

    #[must_use]
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name() == name)
    }

    /// Finds an index by its exact column list.
    #[must_use]
    pub fn find_index<S: AsRef<str>>(&self, columns: &[S]) -> Option<&Index> {
        self.indexes.iter().find(|i| same_columns(i.columns(), columns))
    }

    pub(crate) fn find_index_mut<S: AsRef<str>>(&mut self, columns: &[S]) -> Option<&mut Index> {
        self.indexes
            .iter_mut()
            .find(|i| same_columns(i.columns(), columns))
    }

    /// Adds an index, replacing one with the same name in place.
    pub fn register_index(&mut self, index: Index) {
        match self.indexes.iter().position(|i| i.name() == index.name()) {
            Some(position) => self.indexes[position] = index,
            None => self.indexes.push(index),
        }
    }

    pub(crate) fn replace_index(&mut self, name: &str, index: Index) {
        match self.indexes.iter().position(|i| i.name() == name) {
            Some(position) => self.indexes[position] = index,
            None => self.register_index(index),
        }
    }

    /// Removes an index.
    pub fn forget_index(&mut self, name: &str) -> Option<Index> {
        let position = self.indexes.iter().position(|i| i.name() == name)?;
        Some(self.indexes.remove(position))
    }

    #[must_use]
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    #[must_use]
    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.name() == name)
    }

    /// Finds a foreign key by its exact column list.
    #[must_use]
    pub fn find_foreign_key<S: AsRef<str>>(&self, columns: &[S]) -> Option<&ForeignKey> {
        self.foreign_keys
            .iter()
            .find(|fk| same_columns(fk.columns(), columns))
    }

    pub(crate) fn find_foreign_key_mut<S: AsRef<str>>(
        &mut self,
        columns: &[S],
    ) -> Option<&mut ForeignKey> {
        self.foreign_keys
            .iter_mut()
            .find(|fk| same_columns(fk.columns(), columns))
    }

    /// Adds a foreign key, replacing one with the same name in place.
    pub fn register_foreign_key(&mut self, foreign_key: ForeignKey) {
        match self
            .foreign_keys
            .iter()
            .position(|fk| fk.name() == foreign_key.name())
        {
            Some(position) => self.foreign_keys[position] = foreign_key,
            None => self.foreign_keys.push(foreign_key),
        }
    }

    /// Removes a foreign key.
    pub fn forget_foreign_key(&mut self, name: &str) -> Option<ForeignKey> {
        let position = self.foreign_keys.iter().position(|fk| fk.name() == name)?;
        Some(self.foreign_keys.remove(position))
    }

    /// Sets the primary key columns explicitly.
    pub fn set_primary_keys<S: AsRef<str>>(&mut self, columns: &[S]) {
        self.primary_keys = columns.iter().map(|c| c.as_ref().to_string()).collect();
    }

    /// Primary key columns: the explicit list, or else every column of a
    /// primary abstract type.
    #[must_use]
    pub fn primary_keys(&self) -> Vec<String> {
        if !self.primary_keys.is_empty() {
            return self.primary_keys.clone();
        }
        self.columns
            .iter()
            .filter(|c| c.abstract_type().is_primary())
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Tables referenced by foreign keys, excluding the table itself, in
    /// declaration order.
    #[must_use]
    pub fn dependencies(&self) -> Vec<String> {
        let mut tables: Vec<String> = Vec::new();
        for fk in &self.foreign_keys {
            let target = fk.foreign_table();
            if target != self.name && !tables.iter().any(|t| t == target) {
                tables.push(target.to_string());
            }
        }
        tables
    }

    /// Pending rename intents.
    #[must_use]
    pub fn intents(&self) -> &[RenameIntent] {
        &self.intents
    }

    /// Records a rename, collapsing chains such as `a -> b -> c`.
    pub(crate) fn record_rename(&mut self, kind: ElementKind, from: &str, to: &str) {
        if let Some(intent) = self
            .intents
            .iter_mut()
            .find(|intent| intent.kind == kind && intent.to == from)
        {
            intent.to = to.to_string();
            if intent.from == intent.to {
                self.intents.retain(|intent| intent.from != intent.to);
            }
            return;
        }
        self.intents.push(RenameIntent {
            kind,
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    /// Returns the original name of an element renamed to `to`.
    #[must_use]
    pub fn renamed_from(&self, kind: ElementKind, to: &str) -> Option<&str> {
        self.intents
            .iter()
            .find(|intent| intent.kind == kind && intent.to == to)
            .map(|intent| intent.from.as_str())
    }

    pub(crate) fn clear_intents(&mut self) {
        self.intents.clear();
    }

    /// Renames a column and every index, foreign key and primary key entry
    /// that references it.
    pub(crate) fn rename_column_references(&mut self, from: &str, to: &str) {
        for index in &mut self.indexes {
            index.rename_column(from, to);
        }
        for fk in &mut self.foreign_keys {
            fk.rename_column(from, to);
        }
        for column in &mut self.primary_keys {
            if *column == from {
                *column = to.to_string();
            }
        }
    }

    /// Removes indexes, foreign keys and primary key entries that
    /// reference `column`.
    pub(crate) fn forget_column_references(&mut self, column: &str) {
        self.indexes.retain(|index| !index.references_column(column));
        self.foreign_keys.retain(|fk| !fk.references_column(column));
        self.primary_keys.retain(|c| c != column);
    }

    /// Points every element at a renamed table.
    pub(crate) fn retarget(&mut self, table: &str) {
        self.name = table.to_string();
        for column in &mut self.columns {
            column.table = table.to_string();
        }
        for index in &mut self.indexes {
            index.table = table.to_string();
        }
        for fk in &mut self.foreign_keys {
            fk.table = table.to_string();
        }
    }
}

fn same_columns<S: AsRef<str>>(left: &[String], right: &[S]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(l, r)| l == r.as_ref())
}
