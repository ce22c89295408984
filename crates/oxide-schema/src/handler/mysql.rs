//! MySQL handler.

use std::sync::Arc;

use async_trait::async_trait;

use super::SchemaHandler;
use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::Result;
use crate::schema::{Column, ForeignKey, Index, Table};

pub struct MySqlHandler {
    driver: Arc<dyn Driver>,
}

impl MySqlHandler {
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl SchemaHandler for MySqlHandler {
    fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    async fn before_sync(&self) -> Result<()> {
        self.run("SET FOREIGN_KEY_CHECKS = 0").await
    }

    async fn after_sync(&self) -> Result<()> {
        self.run("SET FOREIGN_KEY_CHECKS = 1").await
    }

    async fn rename_table(&self, from: &str, to: &str) -> Result<()> {
        let dialect = Dialect::MySql;
        self.run(&format!(
            "RENAME TABLE {} TO {}",
            dialect.quote(from),
            dialect.quote(to)
        ))
        .await
    }

    /// `CHANGE` renames and redefines in one statement.
    async fn alter_column(&self, table: &Table, initial: &Column, current: &Column) -> Result<()> {
        self.validate_column(current)?;
        let dialect = Dialect::MySql;
        let sql = format!(
            "ALTER TABLE {} CHANGE {} {}",
            dialect.quote(table.initial_state().name()),
            dialect.quote(initial.name()),
            current.sql_statement()
        );
        self.run(&sql).await
    }

    fn rename_index_sql(&self, table: &str, from: &str, to: &str) -> Option<String> {
        let dialect = Dialect::MySql;
        Some(format!(
            "ALTER TABLE {} RENAME INDEX {} TO {}",
            dialect.quote(table),
            dialect.quote(from),
            dialect.quote(to)
        ))
    }

    async fn drop_index(&self, table: &Table, index: &Index) -> Result<()> {
        let dialect = Dialect::MySql;
        self.run(&format!(
            "DROP INDEX {} ON {}",
            dialect.quote(index.name()),
            dialect.quote(table.initial_state().name())
        ))
        .await
    }

    async fn drop_foreign_key(&self, table: &Table, foreign_key: &ForeignKey) -> Result<()> {
        let dialect = Dialect::MySql;
        self.run(&format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            dialect.quote(table.initial_state().name()),
            dialect.quote(foreign_key.name())
        ))
        .await
    }

    async fn alter_primary_keys(&self, table: &Table) -> Result<()> {
        let dialect = Dialect::MySql;
        let mut clauses = Vec::new();
        if !table.initial_state().primary_keys().is_empty() {
            clauses.push("DROP PRIMARY KEY".to_string());
        }
        let keys = table.primary_keys();
        if !keys.is_empty() {
            clauses.push(format!("ADD PRIMARY KEY ({})", dialect.quote_list(&keys)));
        }
        self.run(&format!(
            "ALTER TABLE {} {}",
            dialect.quote(table.initial_state().name()),
            clauses.join(", ")
        ))
        .await
    }
}
