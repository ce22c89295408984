//! SQL Server handler.
//!
//! SQL Server refuses to alter a column while constraints or indexes
//! depend on it. Indexes and foreign keys over the column are detached
//! by the generic synchronization before `alter_column` runs and restored
//! after it; the column's own default and check constraints are handled
//! here by walking through [`AlterPhase`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::SchemaHandler;
use crate::dialect::{self, sqlserver, Dialect};
use crate::driver::{Driver, Value};
use crate::error::Result;
use crate::schema::{Column, Index, Table};

pub struct SqlServerHandler {
    driver: Arc<dyn Driver>,
}

/// Steps of an in-place column change, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlterPhase {
    DropConstraints,
    Rename,
    AlterType,
    RestoreDefault,
    RestoreEnum,
    Done,
}

impl SqlServerHandler {
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    /// Constraints the database holds for `column`: the introspected
    /// names, or the generated ones when nothing was introspected.
    fn constraints_of(&self, column: &Column) -> Vec<String> {
        if column.constraints().is_empty() {
            self.owned_constraints(column)
        } else {
            column.constraints().to_vec()
        }
    }

    async fn drop_constraints(&self, table: &str, column: &Column) -> Result<()> {
        let dialect = Dialect::SqlServer;
        for name in self.constraints_of(column) {
            self.run(&format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                dialect.quote(table),
                dialect.quote(&name)
            ))
            .await?;
        }
        Ok(())
    }

    async fn sp_rename(&self, from: &str, to: &str, kind: Option<&str>) -> Result<()> {
        let dialect = Dialect::SqlServer;
        let mut sql = format!(
            "EXEC sp_rename {}, {}",
            dialect.quote_string(from),
            dialect.quote_string(to)
        );
        if let Some(kind) = kind {
            sql.push_str(", ");
            sql.push_str(&dialect.quote_string(kind));
        }
        self.run(&sql).await
    }
}

#[async_trait]
impl SchemaHandler for SqlServerHandler {
    fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    fn owned_constraints(&self, column: &Column) -> Vec<String> {
        let mut names = Vec::new();
        if column.comparable_default().is_some() {
            names.push(sqlserver::default_constraint_name(column));
        }
        if column.internal_type() == "enum" {
            names.push(dialect::enum_constraint_name(column));
        }
        names
    }

    async fn rename_table(&self, from: &str, to: &str) -> Result<()> {
        self.sp_rename(from, to, None).await
    }

    async fn create_column(&self, table: &Table, column: &Column) -> Result<()> {
        self.validate_column(column)?;
        let sql = format!(
            "ALTER TABLE {} ADD {}",
            Dialect::SqlServer.quote(table.initial_state().name()),
            column.sql_statement()
        );
        self.run(&sql).await
    }

    async fn alter_column(&self, table: &Table, initial: &Column, current: &Column) -> Result<()> {
        self.validate_column(current)?;
        let dialect = Dialect::SqlServer;
        let live = table.initial_state().name();
        let quoted_table = dialect.quote(live);

        if initial.is_auto_increment() != current.is_auto_increment() {
            warn!(
                table = %live,
                column = %current.name(),
                "Identity cannot be changed on an existing column"
            );
        }

        let mut phase = AlterPhase::DropConstraints;
        while phase != AlterPhase::Done {
            debug!(table = %live, column = %current.name(), phase = ?phase, "Altering column");
            phase = match phase {
                AlterPhase::DropConstraints => {
                    self.drop_constraints(live, initial).await?;
                    AlterPhase::Rename
                }
                AlterPhase::Rename => {
                    if initial.name() != current.name() {
                        self.sp_rename(
                            &format!("{live}.{}", initial.name()),
                            current.name(),
                            Some("COLUMN"),
                        )
                        .await?;
                    }
                    AlterPhase::AlterType
                }
                AlterPhase::AlterType => {
                    self.run(&format!(
                        "ALTER TABLE {quoted_table} ALTER COLUMN {} {} {}",
                        dialect.quote(current.name()),
                        sqlserver::type_sql(current),
                        if current.is_nullable() { "NULL" } else { "NOT NULL" }
                    ))
                    .await?;
                    AlterPhase::RestoreDefault
                }
                AlterPhase::RestoreDefault => {
                    let default = current
                        .default_sql()
                        .filter(|_| current.comparable_default().is_some());
                    if let Some(default) = default {
                        self.run(&format!(
                            "ALTER TABLE {quoted_table} ADD CONSTRAINT {} DEFAULT {default} FOR {}",
                            dialect.quote(&sqlserver::default_constraint_name(current)),
                            dialect.quote(current.name())
                        ))
                        .await?;
                    }
                    AlterPhase::RestoreEnum
                }
                AlterPhase::RestoreEnum => {
                    if current.internal_type() == "enum" {
                        self.run(&format!(
                            "ALTER TABLE {quoted_table} ADD {}",
                            sqlserver::enum_constraint_sql(current)
                        ))
                        .await?;
                    }
                    AlterPhase::Done
                }
                AlterPhase::Done => AlterPhase::Done,
            };
        }
        Ok(())
    }

    async fn drop_column(&self, table: &Table, column: &Column) -> Result<()> {
        let dialect = Dialect::SqlServer;
        let live = table.initial_state().name();
        self.drop_constraints(live, column).await?;
        self.run(&format!(
            "ALTER TABLE {} DROP COLUMN {}",
            dialect.quote(live),
            dialect.quote(column.name())
        ))
        .await
    }

    fn rename_index_sql(&self, table: &str, from: &str, to: &str) -> Option<String> {
        let dialect = Dialect::SqlServer;
        Some(format!(
            "EXEC sp_rename {}, {}, 'INDEX'",
            dialect.quote_string(&format!("{table}.{from}")),
            dialect.quote_string(to)
        ))
    }

    async fn drop_index(&self, table: &Table, index: &Index) -> Result<()> {
        let dialect = Dialect::SqlServer;
        self.run(&format!(
            "DROP INDEX {} ON {}",
            dialect.quote(index.name()),
            dialect.quote(table.initial_state().name())
        ))
        .await
    }

    /// The primary key constraint name is looked up since SQL Server
    /// generates it when none is given.
    async fn alter_primary_keys(&self, table: &Table) -> Result<()> {
        let dialect = Dialect::SqlServer;
        let live = table.initial_state().name();
        let quoted = dialect.quote(live);

        let rows = self
            .driver
            .query(
                "SELECT name FROM sys.key_constraints WHERE type = 'PK' AND parent_object_id = OBJECT_ID(@P1)",
                &[Value::from(live)],
            )
            .await?;
        if let Some(name) = rows.first().and_then(|row| row.str("name")) {
            self.run(&format!(
                "ALTER TABLE {quoted} DROP CONSTRAINT {}",
                dialect.quote(name)
            ))
            .await?;
        }

        let keys = table.primary_keys();
        if keys.is_empty() {
            return Ok(());
        }
        self.run(&format!(
            "ALTER TABLE {quoted} ADD CONSTRAINT {} PRIMARY KEY ({})",
            dialect.quote(&format!("{live}_pk")),
            dialect.quote_list(&keys)
        ))
        .await
    }
}
