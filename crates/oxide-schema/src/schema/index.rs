//! Index definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;

/// Sort direction of an indexed column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// An index over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub(crate) dialect: Dialect,
    pub(crate) table: String,
    pub(crate) name: String,
    pub(crate) columns: Vec<String>,
    pub(crate) unique: bool,
    /// Descending columns; ascending is implied for the rest.
    pub(crate) sort: BTreeMap<String, SortOrder>,
}

impl Index {
    /// Creates an index with no columns.
    #[must_use]
    pub fn new(dialect: Dialect, table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            dialect,
            table: table.into(),
            name: name.into(),
            columns: Vec::new(),
            unique: false,
            sort: BTreeMap::new(),
        }
    }

    /// Deterministic name for an index of `table` over `columns`.
    #[must_use]
    pub fn generate_name<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
        let columns: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
        format!("{table}_index_{}", columns.join("_"))
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

    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    /// Sort direction of `column`.
    #[must_use]
    pub fn sort_order(&self, column: &str) -> SortOrder {
        self.sort.get(column).copied().unwrap_or_default()
    }

    pub fn set_columns<S: AsRef<str>>(&mut self, columns: &[S]) -> &mut Self {
        self.columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self.sort.retain(|column, _| self.columns.contains(column));
        self
    }

    pub fn unique(&mut self, unique: bool) -> &mut Self {
        self.unique = unique;
        self
    }

    /// Sets the sort direction of one indexed column.
    pub fn sort(&mut self, column: &str, order: SortOrder) -> &mut Self {
        match order {
            SortOrder::Asc => {
                self.sort.remove(column);
            }
            SortOrder::Desc => {
                self.sort.insert(column.to_string(), order);
            }
        }
        self
    }

    /// Compares name, columns, uniqueness and sort directions.
    #[must_use]
    pub fn compare(&self, other: &Self) -> bool {
        self.name == other.name && self.compare_definition(other)
    }

    /// Compares everything but the name.
    #[must_use]
    pub fn compare_definition(&self, other: &Self) -> bool {
        self.columns == other.columns && self.unique == other.unique && self.sort == other.sort
    }

    /// Renders the `CREATE INDEX` statement.
    #[must_use]
    pub fn sql_statement(&self) -> String {
        self.create_sql(&self.table)
    }

    /// Renders the `CREATE INDEX` statement against `table`.
    pub(crate) fn create_sql(&self, table: &str) -> String {
        let dialect = self.dialect;
        let columns = self
            .columns
            .iter()
            .map(|column| match self.sort_order(column) {
                SortOrder::Asc => dialect.quote(column),
                SortOrder::Desc => format!("{} DESC", dialect.quote(column)),
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "CREATE {}INDEX {} ON {} ({columns})",
            if self.unique { "UNIQUE " } else { "" },
            dialect.quote(&self.name),
            dialect.quote(table),
        )
    }

    pub(crate) fn rename_column(&mut self, from: &str, to: &str) {
        for column in &mut self.columns {
            if *column == from {
                *column = to.to_string();
            }
        }
        if let Some(order) = self.sort.remove(from) {
            self.sort.insert(to.to_string(), order);
        }
    }

    pub(crate) fn references_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_name_is_deterministic() {
        assert_eq!(
            Index::generate_name("users", &["email", "tenant_id"]),
            "users_index_email_tenant_id"
        );
    }

    #[test]
    fn test_sql_statement() {
        let mut index = Index::new(Dialect::Postgres, "users", "users_index_email");
        index.set_columns(&["email", "created_at"]).unique(true);
        index.sort("created_at", SortOrder::Desc);
        assert_eq!(
            index.sql_statement(),
            "CREATE UNIQUE INDEX \"users_index_email\" ON \"users\" (\"email\", \"created_at\" DESC)"
        );
    }

    #[test]
    fn test_compare_ignores_explicit_ascending() {
        let mut a = Index::new(Dialect::Sqlite, "t", "i");
        a.set_columns(&["x"]);
        let mut b = a.clone();
        b.sort("x", SortOrder::Asc);
        assert!(a.compare(&b));

        b.sort("x", SortOrder::Desc);
        assert!(!a.compare(&b));
        assert_eq!(b.sort_order("x"), SortOrder::Desc);
    }

    #[test]
    fn test_rename_column_moves_sort() {
        let mut index = Index::new(Dialect::MySql, "t", "i");
        index.set_columns(&["a", "b"]).sort("a", SortOrder::Desc);
        index.rename_column("a", "c");
        assert_eq!(index.columns(), ["c", "b"]);
        assert_eq!(index.sort_order("c"), SortOrder::Desc);
        assert!(!index.references_column("a"));
    }
}
