//! PostgreSQL handler.
//!
//! Column changes are applied as one `ALTER TABLE` carrying only the
//! clauses that differ, after a separate `RENAME COLUMN` if needed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::SchemaHandler;
use crate::dialect::{self, postgres, sized_type, Dialect};
use crate::driver::Driver;
use crate::error::Result;
use crate::schema::{Column, Table};

pub struct PostgresHandler {
    driver: Arc<dyn Driver>,
}

impl PostgresHandler {
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }
}

/// Type used by `ALTER COLUMN ... TYPE`, where serial pseudo types are not
/// accepted.
fn alter_type_sql(column: &Column) -> String {
    if column.user_type().is_none() && column.is_auto_increment() {
        sized_type(column)
    } else {
        postgres::type_sql(column)
    }
}

fn is_enum(column: &Column) -> bool {
    column.internal_type() == "enum"
}

/// Clauses turning `initial` into `current`, in execution order.
fn alter_clauses(initial: &Column, current: &Column) -> Vec<String> {
    let quoted = Dialect::Postgres.quote(current.name());
    let mut clauses = Vec::new();

    let enum_changed = (is_enum(initial) || is_enum(current))
        && (is_enum(initial) != is_enum(current)
            || !initial.compare_enum_values(current, false));
    if enum_changed && is_enum(initial) {
        let mut names: Vec<String> = initial.constraints().to_vec();
        let generated = dialect::enum_constraint_name(initial);
        if !names.contains(&generated) {
            names.push(generated);
        }
        for name in names {
            clauses.push(format!(
                "DROP CONSTRAINT IF EXISTS {}",
                Dialect::Postgres.quote(&name)
            ));
        }
    }

    let type_changed = !initial
        .internal_type()
        .eq_ignore_ascii_case(current.internal_type())
        || initial.size() != current.size()
        || initial.precision() != current.precision()
        || initial.scale() != current.scale()
        || initial.user_type() != current.user_type()
        || (is_enum(current) && enum_changed);
    if type_changed {
        let type_sql = alter_type_sql(current);
        clauses.push(format!(
            "ALTER COLUMN {quoted} TYPE {type_sql} USING {quoted}::{type_sql}"
        ));
    }

    if !current.is_auto_increment() && initial.comparable_default() != current.comparable_default()
    {
        match current.default_sql().filter(|_| current.comparable_default().is_some()) {
            Some(default) => clauses.push(format!("ALTER COLUMN {quoted} SET DEFAULT {default}")),
            None => clauses.push(format!("ALTER COLUMN {quoted} DROP DEFAULT")),
        }
    }

    if initial.is_nullable() != current.is_nullable() {
        clauses.push(format!(
            "ALTER COLUMN {quoted} {} NOT NULL",
            if current.is_nullable() { "DROP" } else { "SET" }
        ));
    }

    if enum_changed && is_enum(current) {
        clauses.push(format!("ADD {}", postgres::enum_constraint_sql(current)));
    }
    clauses
}

#[async_trait]
impl SchemaHandler for PostgresHandler {
    fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    fn owned_constraints(&self, column: &Column) -> Vec<String> {
        if is_enum(column) {
            vec![dialect::enum_constraint_name(column)]
        } else {
            Vec::new()
        }
    }

    async fn alter_column(&self, table: &Table, initial: &Column, current: &Column) -> Result<()> {
        self.validate_column(current)?;
        let dialect = Dialect::Postgres;
        let live = dialect.quote(table.initial_state().name());

        if initial.name() != current.name() {
            self.run(&format!(
                "ALTER TABLE {live} RENAME COLUMN {} TO {}",
                dialect.quote(initial.name()),
                dialect.quote(current.name())
            ))
            .await?;
        }

        if initial.is_auto_increment() != current.is_auto_increment() {
            warn!(
                table = %table.initial_state().name(),
                column = %current.name(),
                "Auto-increment cannot be changed on an existing column"
            );
        }

        let clauses = alter_clauses(initial, current);
        if clauses.is_empty() {
            return Ok(());
        }
        self.run(&format!("ALTER TABLE {live} {}", clauses.join(", ")))
            .await
    }

    async fn alter_primary_keys(&self, table: &Table) -> Result<()> {
        let dialect = Dialect::Postgres;
        let live = table.initial_state().name();
        let mut clauses = vec![format!(
            "DROP CONSTRAINT IF EXISTS {}",
            dialect.quote(&format!("{live}_pkey"))
        )];
        let keys = table.primary_keys();
        if !keys.is_empty() {
            clauses.push(format!("ADD PRIMARY KEY ({})", dialect.quote_list(&keys)));
        }
        self.run(&format!(
            "ALTER TABLE {} {}",
            dialect.quote(live),
            clauses.join(", ")
        ))
        .await
    }
}
