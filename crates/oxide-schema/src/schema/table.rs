//! Declarative table handle.

use std::sync::Arc;

use tracing::debug;

use super::state::ElementKind;
use super::{Column, Comparator, ForeignKey, Index, State};
use crate::dialect::{self, Dialect};
use crate::driver::Driver;
use crate::error::{Result, SchemaError};
use crate::handler::{handler_for, SyncBehavior};

/// A table as it exists in the database (the initial state) and as the
/// caller wants it to be (the current state).
///
/// The initial state is introspected once when the table is opened. Every
/// mutation only touches the current state; [`Table::save`] applies the
/// difference. Table names are always stored with the driver's prefix.
///
/// ```ignore
/// let mut users = Table::open(driver, "users").await?;
/// users.column("id")?.primary();
/// users.column("name")?.string(255).nullable(false);
/// users.index(&["name"])?.unique(true);
/// users.save().await?;
/// ```
#[derive(Debug)]
pub struct Table {
    driver: Arc<dyn Driver>,
    initial: State,
    current: State,
}

impl Table {
    /// Opens `name` (without prefix), introspecting its live state.
    pub async fn open(driver: Arc<dyn Driver>, name: &str) -> Result<Self> {
        let full_name = format!("{}{name}", driver.prefix());
        let initial = dialect::fetch_state(driver.as_ref(), &full_name).await?;
        debug!(
            table = %full_name,
            exists = initial.exists(),
            columns = initial.columns().len(),
            "Loaded table state"
        );
        Ok(Self::from_state(driver, initial))
    }

    /// Builds a table from an already known initial state.
    #[must_use]
    pub fn from_state(driver: Arc<dyn Driver>, initial: State) -> Self {
        let current = initial.clone();
        Self {
            driver,
            initial,
            current,
        }
    }

    /// Full (prefixed) table name, as currently declared.
    #[must_use]
    pub fn name(&self) -> &str {
        self.current.name()
    }

    /// Table prefix of the owning driver.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.driver.prefix()
    }

    #[must_use]
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    /// Returns whether the table exists in the database.
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.initial.exists()
    }

    /// State as last read from (or applied to) the database.
    #[must_use]
    pub const fn initial_state(&self) -> &State {
        &self.initial
    }

    /// Declared state.
    #[must_use]
    pub const fn state(&self) -> &State {
        &self.current
    }

    /// Fresh diff between the initial and the declared state.
    #[must_use]
    pub fn comparator(&self) -> Comparator<'_> {
        Comparator::new(&self.initial, &self.current)
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.comparator().has_changes()
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        self.current.columns()
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.current.has_column(name)
    }

    #[must_use]
    pub fn indexes(&self) -> &[Index] {
        self.current.indexes()
    }

    #[must_use]
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        self.current.foreign_keys()
    }

    #[must_use]
    pub fn primary_keys(&self) -> Vec<String> {
        self.current.primary_keys()
    }

    /// Returns the column named `name`, declaring it if needed.
    pub fn column(&mut self, name: &str) -> Result<&mut Column> {
        self.ensure_declared()?;
        if !self.current.has_column(name) {
            let column = Column::new(self.dialect(), self.current.name(), name)
                .with_timezone(self.driver.timezone());
            self.current.register_column(column);
        }
        self.current
            .column_mut(name)
            .ok_or_else(|| SchemaError::schema(format!("Undefined column '{name}'")))
    }

    /// Returns the index over exactly `columns`, declaring it if needed.
    pub fn index<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<&mut Index> {
        self.ensure_declared()?;
        if columns.is_empty() {
            return Err(SchemaError::schema(format!(
                "Index of table '{}' must have at least one column",
                self.current.name()
            )));
        }
        if self.current.find_index(columns).is_none() {
            let name = Index::generate_name(self.current.name(), columns);
            let mut index = Index::new(self.dialect(), self.current.name(), name);
            index.set_columns(columns);
            self.current.register_index(index);
        }
        self.current
            .find_index_mut(columns)
            .ok_or_else(|| SchemaError::schema("Undefined index"))
    }

    /// Returns the foreign key over exactly `columns`, declaring it if
    /// needed.
    pub fn foreign_key<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<&mut ForeignKey> {
        self.ensure_declared()?;
        if columns.is_empty() {
            return Err(SchemaError::schema(format!(
                "Foreign key of table '{}' must have at least one column",
                self.current.name()
            )));
        }
        if self.current.find_foreign_key(columns).is_none() {
            let name = ForeignKey::generate_name(self.current.name(), columns);
            let mut fk = ForeignKey::new(
                self.dialect(),
                self.current.name(),
                name,
                self.driver.prefix(),
            );
            fk.set_columns(columns);
            self.current.register_foreign_key(fk);
        }
        self.current
            .find_foreign_key_mut(columns)
            .ok_or_else(|| SchemaError::schema("Undefined foreign key"))
    }

    /// Sets an explicit primary key.
    pub fn set_primary_keys<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<()> {
        self.ensure_declared()?;
        self.current.set_primary_keys(columns);
        Ok(())
    }

    /// Renames a column, keeping its definition and every reference to it.
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        self.ensure_declared()?;
        if self.current.has_column(to) {
            return Err(SchemaError::schema(format!(
                "Unable to rename column '{from}' of table '{}': column '{to}' already exists",
                self.current.name()
            )));
        }
        if !self.current.has_column(from) {
            return Err(SchemaError::schema(format!(
                "Undefined column '{from}' in table '{}'",
                self.current.name()
            )));
        }
        if let Some(column) = self.current.column_mut(from) {
            column.name = to.to_string();
        }
        self.current.rename_column_references(from, to);
        self.current.record_rename(ElementKind::Column, from, to);
        Ok(())
    }

    /// Renames an index.
    pub fn rename_index(&mut self, from: &str, to: &str) -> Result<()> {
        self.ensure_declared()?;
        if self.current.index(to).is_some() {
            return Err(SchemaError::schema(format!(
                "Unable to rename index '{from}': index '{to}' already exists"
            )));
        }
        let Some(mut index) = self.current.index(from).cloned() else {
            return Err(SchemaError::schema(format!(
                "Undefined index '{from}' in table '{}'",
                self.current.name()
            )));
        };
        index.name = to.to_string();
        self.current.replace_index(from, index);
        self.current.record_rename(ElementKind::Index, from, to);
        Ok(())
    }

    /// Drops a column together with the indexes and foreign keys using it.
    pub fn drop_column(&mut self, name: &str) -> Result<()> {
        self.ensure_declared()?;
        if self.current.forget_column(name).is_none() {
            return Err(SchemaError::schema(format!(
                "Undefined column '{name}' in table '{}'",
                self.current.name()
            )));
        }
        self.current.forget_column_references(name);
        Ok(())
    }

    /// Drops the index over exactly `columns`.
    pub fn drop_index<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<()> {
        self.ensure_declared()?;
        let name = self
            .current
            .find_index(columns)
            .map(|index| index.name().to_string())
            .ok_or_else(|| {
                SchemaError::schema(format!(
                    "Undefined index ({}) in table '{}'",
                    join(columns),
                    self.current.name()
                ))
            })?;
        self.current.forget_index(&name);
        Ok(())
    }

    /// Drops the foreign key over exactly `columns`.
    pub fn drop_foreign_key<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<()> {
        self.ensure_declared()?;
        let name = self
            .current
            .find_foreign_key(columns)
            .map(|fk| fk.name().to_string())
            .ok_or_else(|| {
                SchemaError::schema(format!(
                    "Undefined foreign key ({}) in table '{}'",
                    join(columns),
                    self.current.name()
                ))
            })?;
        self.current.forget_foreign_key(&name);
        Ok(())
    }

    /// Renames the table; `name` is given without prefix.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.ensure_declared()?;
        let full_name = format!("{}{name}", self.driver.prefix());
        self.current.retarget(&full_name);
        Ok(())
    }

    /// Declares the table dropped. The next save drops it.
    pub fn declare_dropped(&mut self) -> Result<()> {
        if !self.initial.exists() {
            return Err(SchemaError::schema(format!(
                "Unable to drop table '{}': table does not exist",
                self.initial.name()
            )));
        }
        self.current.declare_dropped();
        Ok(())
    }

    /// Resets the declared state to the initial state.
    pub fn discard_changes(&mut self) {
        self.current = self.initial.clone();
    }

    /// Applies every pending change.
    pub async fn save(&mut self) -> Result<()> {
        self.save_with(SyncBehavior::DO_ALL).await
    }

    /// Applies the pending changes selected by `behavior`.
    ///
    /// The initial state is updated after each applied statement, so a
    /// partial run followed by another one never repeats work.
    pub async fn save_with(&mut self, behavior: SyncBehavior) -> Result<()> {
        let handler = handler_for(Arc::clone(&self.driver));
        handler.sync_table(self, behavior).await
    }

    /// Marks the declared state as applied. Constraint names the database
    /// assigned while applying it are kept.
    pub(crate) fn commit_state(&mut self) {
        self.current.clear_intents();
        for column in self.current.columns_mut() {
            if let Some(applied) = self.initial.column(column.name()) {
                column.constraints.clone_from(&applied.constraints);
            }
        }
        self.initial = self.current.clone();
    }

    pub(crate) fn initial_state_mut(&mut self) -> &mut State {
        &mut self.initial
    }

    /// Mutations are rejected once the table is declared dropped. Any
    /// mutation of a missing table declares it.
    fn ensure_declared(&mut self) -> Result<()> {
        if self.initial.exists() && !self.current.exists() {
            return Err(SchemaError::schema(format!(
                "Table '{}' is declared dropped",
                self.current.name()
            )));
        }
        self.current.set_exists(true);
        Ok(())
    }
}

fn join<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}
