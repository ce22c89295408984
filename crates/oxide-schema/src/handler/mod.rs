//! Schema handlers.
//!
//! A handler turns the difference between a table's initial and declared
//! state into DDL for one dialect. [`synchronize`] holds the ordering every
//! dialect shares; handlers override the individual statements.
//!
//! Every statement that succeeds is mirrored into the table's initial
//! state right away, so a failed run leaves the table describing what the
//! database actually holds and a retry only replays what is missing.

mod mysql;
mod postgres;
mod sqlite;
mod sqlserver;

pub use mysql::MySqlHandler;
pub use postgres::PostgresHandler;
pub use sqlite::SqliteHandler;
pub use sqlserver::SqlServerHandler;

use std::fmt;
use std::ops::{BitOr, BitOrAssign, Sub};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::dialect::{Capability, Dialect};
use crate::driver::Driver;
use crate::error::{Result, SchemaError};
use crate::schema::{Column, ForeignKey, Index, State, Table};

/// Set of synchronization steps a run may perform.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SyncBehavior(u32);

impl SyncBehavior {
    pub const DROP_FOREIGN_KEYS: Self = Self(1);
    pub const DROP_INDEXES: Self = Self(1 << 1);
    pub const DROP_COLUMNS: Self = Self(1 << 2);
    pub const CREATE_COLUMNS: Self = Self(1 << 3);
    pub const ALTER_COLUMNS: Self = Self(1 << 4);
    pub const CREATE_INDEXES: Self = Self(1 << 5);
    pub const ALTER_INDEXES: Self = Self(1 << 6);
    pub const CREATE_FOREIGN_KEYS: Self = Self(1 << 7);
    pub const ALTER_FOREIGN_KEYS: Self = Self(1 << 8);
    pub const DO_RENAME: Self = Self(1 << 9);
    pub const DO_DROP: Self = Self(1 << 10);
    pub const DO_ALL: Self = Self((1 << 11) - 1);

    /// Steps that change columns or foreign keys. SQLite can only perform
    /// them by rebuilding the table.
    const REBUILD: Self = Self(
        Self::DROP_FOREIGN_KEYS.0
            | Self::DROP_COLUMNS.0
            | Self::CREATE_COLUMNS.0
            | Self::ALTER_COLUMNS.0
            | Self::CREATE_FOREIGN_KEYS.0
            | Self::ALTER_FOREIGN_KEYS.0,
    );

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns whether every step of `other` is enabled.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns whether any step of `other` is enabled.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for SyncBehavior {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SyncBehavior {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Sub for SyncBehavior {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 & !rhs.0)
    }
}

impl fmt::Debug for SyncBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(SyncBehavior, &str); 11] = [
            (SyncBehavior::DROP_FOREIGN_KEYS, "DROP_FOREIGN_KEYS"),
            (SyncBehavior::DROP_INDEXES, "DROP_INDEXES"),
            (SyncBehavior::DROP_COLUMNS, "DROP_COLUMNS"),
            (SyncBehavior::CREATE_COLUMNS, "CREATE_COLUMNS"),
            (SyncBehavior::ALTER_COLUMNS, "ALTER_COLUMNS"),
            (SyncBehavior::CREATE_INDEXES, "CREATE_INDEXES"),
            (SyncBehavior::ALTER_INDEXES, "ALTER_INDEXES"),
            (SyncBehavior::CREATE_FOREIGN_KEYS, "CREATE_FOREIGN_KEYS"),
            (SyncBehavior::ALTER_FOREIGN_KEYS, "ALTER_FOREIGN_KEYS"),
            (SyncBehavior::DO_RENAME, "DO_RENAME"),
            (SyncBehavior::DO_DROP, "DO_DROP"),
        ];
        if *self == Self::DO_ALL {
            return f.write_str("DO_ALL");
        }
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "SyncBehavior({})", names.join(" | "))
    }
}

/// Returns the handler matching the driver's dialect.
#[must_use]
pub fn handler_for(driver: Arc<dyn Driver>) -> Box<dyn SchemaHandler> {
    match driver.dialect() {
        Dialect::MySql => Box::new(MySqlHandler::new(driver)),
        Dialect::Postgres => Box::new(PostgresHandler::new(driver)),
        Dialect::Sqlite => Box::new(SqliteHandler::new(driver)),
        Dialect::SqlServer => Box::new(SqlServerHandler::new(driver)),
    }
}

/// DDL generation and execution for one dialect.
///
/// Statements targeting an existing table use the name in the table's
/// initial state, which tracks renames as they are applied.
#[async_trait]
pub trait SchemaHandler: Send + Sync {
    fn driver(&self) -> &dyn Driver;

    fn dialect(&self) -> Dialect {
        self.driver().dialect()
    }

    /// Runs once per driver before a batch of tables is synchronized.
    async fn before_sync(&self) -> Result<()> {
        Ok(())
    }

    /// Runs once per driver after a batch, whether it succeeded or not.
    async fn after_sync(&self) -> Result<()> {
        Ok(())
    }

    /// Brings the database in line with the table's declared state.
    async fn sync_table(&self, table: &mut Table, behavior: SyncBehavior) -> Result<()> {
        synchronize(self, table, behavior).await
    }

    /// Executes one DDL statement.
    async fn run(&self, sql: &str) -> Result<()> {
        debug!(sql = %sql, "Executing statement");
        self.driver().execute(sql, &[]).await?;
        Ok(())
    }

    /// Table-level primary key clause, if one is needed.
    fn primary_key_clause(&self, state: &State) -> Option<String> {
        let keys = state.primary_keys();
        if keys.is_empty() {
            return None;
        }
        Some(format!("PRIMARY KEY ({})", self.dialect().quote_list(&keys)))
    }

    /// Renders `CREATE TABLE` for `state` under `name`.
    fn create_table_sql(&self, state: &State, name: &str, with_foreign_keys: bool) -> String {
        let mut items: Vec<String> = state.columns().iter().map(Column::sql_statement).collect();
        items.extend(self.primary_key_clause(state));
        if with_foreign_keys {
            items.extend(state.foreign_keys().iter().map(ForeignKey::sql_statement));
        }
        format!(
            "CREATE TABLE {} ({})",
            self.dialect().quote(name),
            items.join(", ")
        )
    }

    /// Names of the constraints the database holds for `column` once this
    /// handler created it.
    fn owned_constraints(&self, _column: &Column) -> Vec<String> {
        Vec::new()
    }

    /// Checks a column before any DDL touches it.
    fn validate_column(&self, column: &Column) -> Result<()> {
        if column.dialect() != self.dialect() {
            return Err(SchemaError::schema(format!(
                "Column '{}' of dialect {} cannot be handled by the {} handler",
                column.name(),
                column.dialect(),
                self.dialect()
            )));
        }
        if column.internal_type().is_empty() {
            return Err(SchemaError::schema(format!(
                "Column '{}' of table '{}' has no type",
                column.name(),
                column.table()
            )));
        }
        if column.has_forbidden_default() {
            return Err(SchemaError::schema(format!(
                "Column '{}' of type {} cannot have a default value",
                column.name(),
                column.internal_type()
            )));
        }
        Ok(())
    }

    fn validate_foreign_key(&self, foreign_key: &ForeignKey) -> Result<()> {
        if foreign_key.dialect() != self.dialect() {
            return Err(SchemaError::schema(format!(
                "Foreign key '{}' of dialect {} cannot be handled by the {} handler",
                foreign_key.name(),
                foreign_key.dialect(),
                self.dialect()
            )));
        }
        foreign_key.validate()
    }

    fn validate_index(&self, index: &Index) -> Result<()> {
        if index.dialect() != self.dialect() {
            return Err(SchemaError::schema(format!(
                "Index '{}' of dialect {} cannot be handled by the {} handler",
                index.name(),
                index.dialect(),
                self.dialect()
            )));
        }
        if index.columns().is_empty() {
            return Err(SchemaError::schema(format!(
                "Index '{}' has no columns",
                index.name()
            )));
        }
        Ok(())
    }

    /// Creates the table with its columns and primary key, and with its
    /// foreign keys when `with_foreign_keys` is set. Indexes are created
    /// separately.
    async fn create_table(&self, table: &Table, with_foreign_keys: bool) -> Result<()> {
        let state = table.state();
        if state.columns().is_empty() {
            return Err(SchemaError::schema(format!(
                "Table '{}' must have at least one column",
                state.name()
            )));
        }
        for column in state.columns() {
            self.validate_column(column)?;
        }
        if with_foreign_keys {
            for foreign_key in state.foreign_keys() {
                self.validate_foreign_key(foreign_key)?;
            }
        }
        self.run(&self.create_table_sql(state, state.name(), with_foreign_keys))
            .await
    }

    async fn drop_table(&self, table: &Table) -> Result<()> {
        let sql = format!(
            "DROP TABLE {}",
            self.dialect().quote(table.initial_state().name())
        );
        self.run(&sql).await
    }

    async fn rename_table(&self, from: &str, to: &str) -> Result<()> {
        let dialect = self.dialect();
        let sql = format!(
            "ALTER TABLE {} RENAME TO {}",
            dialect.quote(from),
            dialect.quote(to)
        );
        self.run(&sql).await
    }

    async fn create_column(&self, table: &Table, column: &Column) -> Result<()> {
        self.validate_column(column)?;
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.dialect().quote(table.initial_state().name()),
            column.sql_statement()
        );
        self.run(&sql).await
    }

    /// Changes `initial` into `current` in place.
    async fn alter_column(&self, table: &Table, initial: &Column, current: &Column) -> Result<()> {
        let _ = (initial, current);
        Err(SchemaError::driver(format!(
            "Dialect {} cannot alter columns of table '{}' in place",
            self.dialect(),
            table.initial_state().name()
        )))
    }

    async fn drop_column(&self, table: &Table, column: &Column) -> Result<()> {
        let dialect = self.dialect();
        let sql = format!(
            "ALTER TABLE {} DROP COLUMN {}",
            dialect.quote(table.initial_state().name()),
            dialect.quote(column.name())
        );
        self.run(&sql).await
    }

    async fn create_index(&self, table: &Table, index: &Index) -> Result<()> {
        self.validate_index(index)?;
        self.run(&index.create_sql(table.initial_state().name()))
            .await
    }

    /// `ALTER ... RENAME` for an index, if the dialect can rename one.
    fn rename_index_sql(&self, table: &str, from: &str, to: &str) -> Option<String> {
        let _ = table;
        let dialect = self.dialect();
        Some(format!(
            "ALTER INDEX {} RENAME TO {}",
            dialect.quote(from),
            dialect.quote(to)
        ))
    }

    /// Renames the index when only its name changed, otherwise drops and
    /// recreates it.
    async fn alter_index(&self, table: &Table, initial: &Index, current: &Index) -> Result<()> {
        if initial.compare_definition(current) && self.dialect().supports(Capability::RenameIndex) {
            let live = table.initial_state().name();
            if let Some(sql) = self.rename_index_sql(live, initial.name(), current.name()) {
                return self.run(&sql).await;
            }
        }
        self.drop_index(table, initial).await?;
        self.create_index(table, current).await
    }

    async fn drop_index(&self, table: &Table, index: &Index) -> Result<()> {
        let _ = table;
        self.run(&format!("DROP INDEX {}", self.dialect().quote(index.name())))
            .await
    }

    async fn create_foreign_key(&self, table: &Table, foreign_key: &ForeignKey) -> Result<()> {
        self.validate_foreign_key(foreign_key)?;
        let sql = format!(
            "ALTER TABLE {} ADD {}",
            self.dialect().quote(table.initial_state().name()),
            foreign_key.sql_statement()
        );
        self.run(&sql).await
    }

    async fn alter_foreign_key(
        &self,
        table: &Table,
        initial: &ForeignKey,
        current: &ForeignKey,
    ) -> Result<()> {
        self.drop_foreign_key(table, initial).await?;
        self.create_foreign_key(table, current).await
    }

    async fn drop_foreign_key(&self, table: &Table, foreign_key: &ForeignKey) -> Result<()> {
        let dialect = self.dialect();
        let sql = format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            dialect.quote(table.initial_state().name()),
            dialect.quote(foreign_key.name())
        );
        self.run(&sql).await
    }

    /// Replaces the primary key with the declared one.
    async fn alter_primary_keys(&self, table: &Table) -> Result<()> {
        Err(SchemaError::dbal(format!(
            "Unable to change primary keys of existing table '{}'",
            table.initial_state().name()
        )))
    }

    /// Recreates the table with its declared state, preserving data.
    /// Dialects that alter in place never need this.
    async fn rebuild_table(&self, table: &mut Table) -> Result<()> {
        Err(SchemaError::driver(format!(
            "Dialect {} cannot rebuild table '{}'",
            self.dialect(),
            table.initial_state().name()
        )))
    }
}

/// Owned copy of a table diff, so DDL can run while the table's initial
/// state is being updated.
struct Plan {
    added_columns: Vec<Column>,
    altered_columns: Vec<(Column, Column)>,
    dropped_columns: Vec<Column>,
    added_indexes: Vec<Index>,
    altered_indexes: Vec<(Index, Index)>,
    dropped_indexes: Vec<Index>,
    /// Indexes over altered columns, dropped before and restored after.
    detached_indexes: Vec<(Index, Index)>,
    added_foreign_keys: Vec<ForeignKey>,
    altered_foreign_keys: Vec<(ForeignKey, ForeignKey)>,
    dropped_foreign_keys: Vec<ForeignKey>,
    detached_foreign_keys: Vec<(ForeignKey, ForeignKey)>,
    primary_changed: bool,
}

impl Plan {
    fn new(table: &Table) -> Self {
        let comparator = table.comparator();
        let altered_columns: Vec<(Column, Column)> = comparator
            .altered_columns()
            .into_iter()
            .map(|(current, initial)| (current.clone(), initial.clone()))
            .collect();
        let touches = |references: &dyn Fn(&str) -> bool| {
            altered_columns
                .iter()
                .any(|(_, initial)| references(initial.name()))
        };

        let detached_indexes: Vec<(Index, Index)> = comparator
            .paired_indexes()
            .into_iter()
            .filter(|(_, initial)| touches(&|column| initial.references_column(column)))
            .map(|(current, initial)| (current.clone(), initial.clone()))
            .collect();
        let detached_foreign_keys: Vec<(ForeignKey, ForeignKey)> = table
            .initial_state()
            .foreign_keys()
            .iter()
            .filter(|initial| touches(&|column| initial.references_column(column)))
            .filter_map(|initial| {
                table
                    .state()
                    .foreign_key(initial.name())
                    .map(|current| (current.clone(), initial.clone()))
            })
            .collect();

        let altered_indexes = comparator
            .altered_indexes()
            .into_iter()
            .filter(|(_, initial)| {
                !detached_indexes
                    .iter()
                    .any(|(_, detached)| detached.name() == initial.name())
            })
            .map(|(current, initial)| (current.clone(), initial.clone()))
            .collect();
        let altered_foreign_keys = comparator
            .altered_foreign_keys()
            .into_iter()
            .filter(|(_, initial)| {
                !detached_foreign_keys
                    .iter()
                    .any(|(_, detached)| detached.name() == initial.name())
            })
            .map(|(current, initial)| (current.clone(), initial.clone()))
            .collect();

        Self {
            added_columns: comparator.added_columns().into_iter().cloned().collect(),
            dropped_columns: comparator.dropped_columns().into_iter().cloned().collect(),
            altered_columns,
            added_indexes: comparator.added_indexes().into_iter().cloned().collect(),
            altered_indexes,
            dropped_indexes: comparator.dropped_indexes().into_iter().cloned().collect(),
            detached_indexes,
            added_foreign_keys: comparator
                .added_foreign_keys()
                .into_iter()
                .cloned()
                .collect(),
            altered_foreign_keys,
            dropped_foreign_keys: comparator
                .dropped_foreign_keys()
                .into_iter()
                .cloned()
                .collect(),
            detached_foreign_keys,
            primary_changed: comparator.is_primary_changed(),
        }
    }

    /// Returns whether anything but indexes changed.
    fn requires_rebuild(&self) -> bool {
        !self.added_columns.is_empty()
            || !self.altered_columns.is_empty()
            || !self.dropped_columns.is_empty()
            || !self.added_foreign_keys.is_empty()
            || !self.altered_foreign_keys.is_empty()
            || !self.dropped_foreign_keys.is_empty()
            || !self.detached_foreign_keys.is_empty()
    }
}

/// Shared synchronization order.
///
/// 1. A table declared dropped is dropped.
/// 2. A missing table is created, then its indexes.
/// 3. A renamed table is renamed.
/// 4. Dialects without in-place alteration rebuild the table.
/// 5. Otherwise: drop foreign keys and indexes, add, alter and drop
///    columns, create and alter indexes, create and alter foreign keys,
///    then replace the primary key.
///
/// `DO_ALL` runs commit the declared state as the new initial state.
pub async fn synchronize<H>(handler: &H, table: &mut Table, behavior: SyncBehavior) -> Result<()>
where
    H: SchemaHandler + ?Sized,
{
    if table.dialect() != handler.dialect() {
        return Err(SchemaError::schema(format!(
            "Table '{}' of dialect {} cannot be handled by the {} handler",
            table.name(),
            table.dialect(),
            handler.dialect()
        )));
    }
    if !table.has_changes() {
        return Ok(());
    }

    let initial_exists = table.initial_state().exists();
    let current_exists = table.state().exists();

    if initial_exists && !current_exists {
        if behavior.contains(SyncBehavior::DO_DROP) {
            handler.drop_table(table).await?;
            info!(table = %table.initial_state().name(), "Dropped table");
            let name = table.initial_state().name().to_string();
            *table.initial_state_mut() = State::new(name);
        }
        return finish(table, behavior);
    }

    if !initial_exists {
        if behavior.contains(SyncBehavior::CREATE_COLUMNS) {
            create(handler, table, behavior).await?;
        }
        return finish(table, behavior);
    }

    if behavior.contains(SyncBehavior::DO_RENAME) && table.comparator().is_renamed() {
        let from = table.initial_state().name().to_string();
        let to = table.name().to_string();
        handler.rename_table(&from, &to).await?;
        info!(from = %from, to = %to, "Renamed table");
        table.initial_state_mut().retarget(&to);
    }

    let plan = Plan::new(table);

    if !handler.dialect().supports(Capability::InPlaceAlter) {
        if plan.primary_changed {
            return Err(SchemaError::dbal(format!(
                "Unable to change primary keys of existing table '{}'",
                table.initial_state().name()
            )));
        }
        if plan.requires_rebuild() && behavior.intersects(SyncBehavior::REBUILD) {
            handler.rebuild_table(table).await?;
            return finish(table, behavior);
        }
    }

    alter(handler, table, &plan, behavior).await?;
    finish(table, behavior)
}

async fn create<H>(handler: &H, table: &mut Table, behavior: SyncBehavior) -> Result<()>
where
    H: SchemaHandler + ?Sized,
{
    let inline_foreign_keys = behavior.contains(SyncBehavior::CREATE_FOREIGN_KEYS)
        || !handler.dialect().supports(Capability::InPlaceAlter);
    handler.create_table(table, inline_foreign_keys).await?;
    info!(
        table = %table.name(),
        columns = table.columns().len(),
        "Created table"
    );

    let mut created = table.state().clone();
    created.clear_intents();
    for index in table.indexes() {
        created.forget_index(index.name());
    }
    if !inline_foreign_keys {
        for foreign_key in table.foreign_keys() {
            created.forget_foreign_key(foreign_key.name());
        }
    }
    for column in created.columns_mut() {
        column.constraints = handler.owned_constraints(column);
    }
    *table.initial_state_mut() = created;

    if behavior.contains(SyncBehavior::CREATE_INDEXES) {
        for index in table.indexes().to_vec() {
            handler.create_index(table, &index).await?;
            table.initial_state_mut().register_index(index);
        }
    }
    Ok(())
}

async fn alter<H>(handler: &H, table: &mut Table, plan: &Plan, behavior: SyncBehavior) -> Result<()>
where
    H: SchemaHandler + ?Sized,
{
    let alter_columns = behavior.contains(SyncBehavior::ALTER_COLUMNS);

    if behavior.contains(SyncBehavior::DROP_FOREIGN_KEYS) {
        for foreign_key in &plan.dropped_foreign_keys {
            handler.drop_foreign_key(table, foreign_key).await?;
            table.initial_state_mut().forget_foreign_key(foreign_key.name());
        }
    }
    if alter_columns {
        for (_, initial) in &plan.detached_foreign_keys {
            handler.drop_foreign_key(table, initial).await?;
            table.initial_state_mut().forget_foreign_key(initial.name());
        }
    }

    if behavior.contains(SyncBehavior::DROP_INDEXES) {
        for index in &plan.dropped_indexes {
            handler.drop_index(table, index).await?;
            table.initial_state_mut().forget_index(index.name());
        }
    }
    if alter_columns {
        for (_, initial) in &plan.detached_indexes {
            handler.drop_index(table, initial).await?;
            table.initial_state_mut().forget_index(initial.name());
        }
    }

    if behavior.contains(SyncBehavior::CREATE_COLUMNS) {
        for column in &plan.added_columns {
            handler.create_column(table, column).await?;
            let mut applied = column.clone();
            applied.constraints = handler.owned_constraints(column);
            table.initial_state_mut().register_column(applied);
        }
    }
    if alter_columns {
        for (current, initial) in &plan.altered_columns {
            handler.alter_column(table, initial, current).await?;
            let mut applied = current.clone();
            applied.constraints = handler.owned_constraints(current);
            let mirror = table.initial_state_mut();
            mirror.replace_column(initial.name(), applied);
            if initial.name() != current.name() {
                mirror.rename_column_references(initial.name(), current.name());
            }
        }
    }
    if behavior.contains(SyncBehavior::DROP_COLUMNS) {
        for column in &plan.dropped_columns {
            handler.drop_column(table, column).await?;
            table.initial_state_mut().forget_column(column.name());
        }
    }

    if behavior.contains(SyncBehavior::CREATE_INDEXES) {
        for index in &plan.added_indexes {
            handler.create_index(table, index).await?;
            table.initial_state_mut().register_index(index.clone());
        }
    }
    if alter_columns {
        for (current, _) in &plan.detached_indexes {
            handler.create_index(table, current).await?;
            table.initial_state_mut().register_index(current.clone());
        }
    }
    if behavior.contains(SyncBehavior::ALTER_INDEXES) {
        for (current, initial) in &plan.altered_indexes {
            handler.alter_index(table, initial, current).await?;
            let mirror = table.initial_state_mut();
            mirror.forget_index(initial.name());
            mirror.register_index(current.clone());
        }
    }

    if behavior.contains(SyncBehavior::CREATE_FOREIGN_KEYS) {
        for foreign_key in &plan.added_foreign_keys {
            handler.create_foreign_key(table, foreign_key).await?;
            table
                .initial_state_mut()
                .register_foreign_key(foreign_key.clone());
        }
    }
    if alter_columns {
        for (current, _) in &plan.detached_foreign_keys {
            handler.create_foreign_key(table, current).await?;
            table.initial_state_mut().register_foreign_key(current.clone());
        }
    }
    if behavior.contains(SyncBehavior::ALTER_FOREIGN_KEYS) {
        for (current, initial) in &plan.altered_foreign_keys {
            handler.alter_foreign_key(table, initial, current).await?;
            let mirror = table.initial_state_mut();
            mirror.forget_foreign_key(initial.name());
            mirror.register_foreign_key(current.clone());
        }
    }

    if plan.primary_changed && alter_columns {
        if !handler.dialect().supports(Capability::AlterPrimaryKey) {
            return Err(SchemaError::dbal(format!(
                "Unable to change primary keys of existing table '{}'",
                table.initial_state().name()
            )));
        }
        handler.alter_primary_keys(table).await?;
        let keys = table.primary_keys();
        table.initial_state_mut().set_primary_keys(&keys);
    }
    Ok(())
}

fn finish(table: &mut Table, behavior: SyncBehavior) -> Result<()> {
    if behavior.contains(SyncBehavior::DO_ALL) {
        table.commit_state();
    }
    Ok(())
}
