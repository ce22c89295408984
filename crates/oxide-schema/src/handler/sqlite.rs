//! SQLite handler.
//!
//! SQLite cannot alter columns or foreign keys in place. Any such change
//! rebuilds the table: the declared state is created under a temporary
//! name, the paired columns are copied over, the original is dropped and
//! the copy renamed back.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::SchemaHandler;
use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::Result;
use crate::schema::{Index, State, Table};

pub struct SqliteHandler {
    driver: Arc<dyn Driver>,
}

impl SqliteHandler {
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    /// Returns whether foreign key enforcement is currently on.
    async fn foreign_keys_enabled(&self) -> Result<bool> {
        let rows = self.driver.query("PRAGMA foreign_keys", &[]).await?;
        Ok(rows
            .first()
            .and_then(|row| row.i64("foreign_keys"))
            .is_some_and(|enabled| enabled == 1))
    }

    async fn copy_table(&self, table: &Table, temporary: &str) -> Result<()> {
        let dialect = Dialect::Sqlite;
        let live = table.initial_state().name();

        self.run(&self.create_table_sql(table.state(), temporary, true))
            .await?;

        let (targets, sources): (Vec<&str>, Vec<&str>) = table
            .comparator()
            .paired_columns()
            .into_iter()
            .map(|(current, initial)| (current.name(), initial.name()))
            .unzip();
        if !targets.is_empty() {
            let sql = format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                dialect.quote(temporary),
                dialect.quote_list(&targets),
                dialect.quote_list(&sources),
                dialect.quote(live)
            );
            self.run(&sql).await?;
        }

        self.run(&format!("DROP TABLE {}", dialect.quote(live)))
            .await?;
        self.rename_table(temporary, live).await?;

        let indexes: Vec<Index> = table.indexes().to_vec();
        for index in &indexes {
            self.create_index(table, index).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaHandler for SqliteHandler {
    fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    async fn before_sync(&self) -> Result<()> {
        self.run("PRAGMA foreign_keys = OFF").await
    }

    async fn after_sync(&self) -> Result<()> {
        if self.driver.config().foreign_keys {
            self.run("PRAGMA foreign_keys = ON").await?;
        }
        Ok(())
    }

    /// An auto-increment column already declares itself the primary key.
    fn primary_key_clause(&self, state: &State) -> Option<String> {
        let keys = state.primary_keys();
        match keys.as_slice() {
            [] => None,
            [single] if state.column(single).is_some_and(|c| c.is_auto_increment()) => None,
            _ => Some(format!(
                "PRIMARY KEY ({})",
                Dialect::Sqlite.quote_list(&keys)
            )),
        }
    }

    async fn rebuild_table(&self, table: &mut Table) -> Result<()> {
        for column in table.columns() {
            self.validate_column(column)?;
        }
        for foreign_key in table.foreign_keys() {
            self.validate_foreign_key(foreign_key)?;
        }

        let live = table.initial_state().name().to_string();
        let temporary = format!("{live}__rebuild");
        info!(table = %live, "Rebuilding table");

        // Dropping the original must not cascade into referencing tables.
        let enforced = self.foreign_keys_enabled().await?;
        if enforced {
            self.run("PRAGMA foreign_keys = OFF").await?;
        }
        let result = self.copy_table(table, &temporary).await;
        if enforced {
            if let Err(err) = self.run("PRAGMA foreign_keys = ON").await {
                warn!(table = %live, error = %err, "Unable to re-enable foreign keys");
            }
        }
        result?;

        let mut rebuilt = table.state().clone();
        rebuilt.clear_intents();
        rebuilt.retarget(&live);
        *table.initial_state_mut() = rebuilt;
        Ok(())
    }
}
