//! Foreign key definitions.

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    ///
    /// SQL Server has no `RESTRICT`; it is rendered as `NO ACTION`.
    #[must_use]
    pub const fn to_sql(self, dialect: Dialect) -> &'static str {
        match (self, dialect) {
            (Self::NoAction, _) | (Self::Restrict, Dialect::SqlServer) => "NO ACTION",
            (Self::Restrict, _) => "RESTRICT",
            (Self::Cascade, _) => "CASCADE",
            (Self::SetNull, _) => "SET NULL",
        }
    }

    /// Parses an action as reported by catalog views (`SET NULL`,
    /// `SET_NULL`, `CASCADE`, ...). Unknown actions map to `NoAction`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_uppercase().replace('_', " ").as_str() {
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "RESTRICT" => Self::Restrict,
            _ => Self::NoAction,
        }
    }
}

/// A foreign key from columns of one table to columns of another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub(crate) dialect: Dialect,
    pub(crate) table: String,
    pub(crate) name: String,
    pub(crate) columns: Vec<String>,
    pub(crate) foreign_table: String,
    pub(crate) foreign_keys: Vec<String>,
    pub(crate) on_delete: ForeignKeyAction,
    pub(crate) on_update: ForeignKeyAction,
    /// Prefix applied to referenced table names.
    #[serde(default)]
    pub(crate) prefix: String,
}

impl ForeignKey {
    #[must_use]
    pub fn new(
        dialect: Dialect,
        table: impl Into<String>,
        name: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            dialect,
            table: table.into(),
            name: name.into(),
            columns: Vec::new(),
            foreign_table: String::new(),
            foreign_keys: Vec::new(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
            prefix: prefix.into(),
        }
    }

    /// Deterministic name for a foreign key of `table` over `columns`.
    /// `table` is the full, prefixed table name.
    #[must_use]
    pub fn generate_name<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
        let columns: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
        format!("{table}_{}_fk", columns.join("_"))
    }

    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Referenced table, prefixed.
    #[must_use]
    pub fn foreign_table(&self) -> &str {
        &self.foreign_table
    }

    /// Referenced columns.
    #[must_use]
    pub fn foreign_keys(&self) -> &[String] {
        &self.foreign_keys
    }

    #[must_use]
    pub const fn delete_rule(&self) -> ForeignKeyAction {
        self.on_delete
    }

    #[must_use]
    pub const fn update_rule(&self) -> ForeignKeyAction {
        self.on_update
    }

    pub fn set_columns<S: AsRef<str>>(&mut self, columns: &[S]) -> &mut Self {
        self.columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    /// Points the key at `columns` of `table`; the table prefix is applied.
    pub fn references<S: AsRef<str>>(&mut self, table: &str, columns: &[S]) -> &mut Self {
        self.foreign_table = format!("{}{table}", self.prefix);
        self.foreign_keys = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn on_delete(&mut self, action: ForeignKeyAction) -> &mut Self {
        self.on_delete = action;
        self
    }

    pub fn on_update(&mut self, action: ForeignKeyAction) -> &mut Self {
        self.on_update = action;
        self
    }

    /// Checks that the key has columns and a referenced table, and that
    /// both column lists have the same length.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() || self.foreign_table.is_empty() {
            return Err(SchemaError::schema(format!(
                "Foreign key '{}' of table '{}' has no columns or referenced table",
                self.name, self.table
            )));
        }
        if self.columns.len() != self.foreign_keys.len() {
            return Err(SchemaError::schema(format!(
                "Foreign key '{}' maps {} column(s) to {} referenced column(s)",
                self.name,
                self.columns.len(),
                self.foreign_keys.len()
            )));
        }
        Ok(())
    }

    /// Compares name, columns, referenced table and columns, and actions.
    #[must_use]
    pub fn compare(&self, other: &Self) -> bool {
        self.name == other.name
            && self.columns == other.columns
            && self.foreign_table == other.foreign_table
            && self.foreign_keys == other.foreign_keys
            && self.on_delete.to_sql(self.dialect) == other.on_delete.to_sql(other.dialect)
            && self.on_update.to_sql(self.dialect) == other.on_update.to_sql(other.dialect)
    }

    /// Renders the constraint clause used in `CREATE TABLE` and
    /// `ALTER TABLE ... ADD`.
    #[must_use]
    pub fn sql_statement(&self) -> String {
        let dialect = self.dialect;
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            dialect.quote(&self.name),
            dialect.quote_list(&self.columns),
            dialect.quote(&self.foreign_table),
            dialect.quote_list(&self.foreign_keys),
            self.on_delete.to_sql(dialect),
            self.on_update.to_sql(dialect),
        )
    }

    pub(crate) fn rename_column(&mut self, from: &str, to: &str) {
        for column in &mut self.columns {
            if *column == from {
                *column = to.to_string();
            }
        }
    }

    pub(crate) fn references_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}
