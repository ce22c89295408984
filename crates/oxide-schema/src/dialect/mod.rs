//! Database dialects.
//!
//! Each dialect registers a [`DialectSpec`]: its type tables, column
//! formatter, comparison exclusions and capabilities. Elements carry a
//! [`Dialect`] tag and look their behavior up here.

mod mysql;
pub(crate) mod postgres;
mod sqlite;
pub(crate) mod sqlserver;
mod types;

pub use types::{AbstractType, NativeType, ReverseRule, TypeMapping};

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::driver::{Driver, Row};
use crate::error::Result;
use crate::schema::{Column, ColumnField, State};

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
    SqlServer,
}

impl Dialect {
    /// Every supported dialect.
    pub const ALL: [Self; 4] = [Self::MySql, Self::Postgres, Self::Sqlite, Self::SqlServer];

    /// Returns the dialect name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::SqlServer => "sqlserver",
        }
    }

    /// Returns the dialect's behavior table.
    #[must_use]
    pub fn spec(self) -> &'static DialectSpec {
        match self {
            Self::MySql => &mysql::SPEC,
            Self::Postgres => &postgres::SPEC,
            Self::Sqlite => &sqlite::SPEC,
            Self::SqlServer => &sqlserver::SPEC,
        }
    }

    /// Returns whether the dialect has `capability`.
    #[must_use]
    pub fn supports(self, capability: Capability) -> bool {
        self.spec().capabilities.contains(&capability)
    }

    /// Quotes an identifier, doubling embedded quote characters.
    #[must_use]
    pub fn quote(self, identifier: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", identifier.replace('`', "``")),
            Self::SqlServer => format!("[{}]", identifier.replace(']', "]]")),
            Self::Postgres | Self::Sqlite => format!("\"{}\"", identifier.replace('"', "\"\"")),
        }
    }

    /// Quotes a comma separated identifier list.
    #[must_use]
    pub fn quote_list<S: AsRef<str>>(self, identifiers: &[S]) -> String {
        identifiers
            .iter()
            .map(|identifier| self.quote(identifier.as_ref()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Quotes a string literal.
    #[must_use]
    pub fn quote_string(self, value: &str) -> String {
        let escaped = value.replace('\'', "''");
        match self {
            Self::MySql => format!("'{}'", escaped.replace('\\', "\\\\")),
            _ => format!("'{escaped}'"),
        }
    }

    /// Returns the positional placeholder for the `index`th parameter,
    /// starting at 1.
    #[must_use]
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${index}"),
            Self::SqlServer => format!("@P{index}"),
            Self::MySql | Self::Sqlite => "?".to_string(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional behavior a dialect may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Columns and foreign keys can be added, altered and dropped on an
    /// existing table. Without it the table is rebuilt.
    InPlaceAlter,
    /// The primary key of an existing table can be replaced.
    AlterPrimaryKey,
    /// Foreign key names are stored by the database and survive
    /// introspection.
    NamedForeignKeys,
    /// Constraint checks can be suspended for the duration of a batch.
    DeferredConstraintChecks,
    /// Indexes can be renamed without being rebuilt.
    RenameIndex,
}

/// Behavior table of one dialect.
#[derive(Debug)]
pub struct DialectSpec {
    pub dialect: Dialect,
    pub capabilities: &'static [Capability],
    pub mapping: TypeMapping,
    /// Renders a column definition.
    pub column_sql: fn(&Column) -> String,
    /// Column fields ignored when comparing two columns.
    pub ignored_fields: &'static [ColumnField],
    /// Native types that cannot carry a non-null default value.
    pub forbidden_defaults: &'static [&'static str],
    /// Whether enum value order is significant.
    pub ordered_enums: bool,
}

/// Introspects the live state of `table`.
pub(crate) async fn fetch_state(driver: &dyn Driver, table: &str) -> Result<State> {
    match driver.dialect() {
        Dialect::MySql => mysql::fetch_state(driver, table).await,
        Dialect::Postgres => postgres::fetch_state(driver, table).await,
        Dialect::Sqlite => sqlite::fetch_state(driver, table).await,
        Dialect::SqlServer => sqlserver::fetch_state(driver, table).await,
    }
}

/// Renders `name(size)` or `name(precision, scale)`.
pub(crate) fn sized_type(column: &Column) -> String {
    let name = column.internal_type();
    if column.precision() > 0 {
        format!("{name}({}, {})", column.precision(), column.scale())
    } else if column.size() > 0 {
        format!("{name}({})", column.size())
    } else {
        name.to_string()
    }
}

/// Renders `CHECK (column IN ('a', 'b'))` for enum columns.
pub(crate) fn enum_check(column: &Column) -> String {
    let dialect = column.dialect();
    let values = column
        .enum_values()
        .iter()
        .map(|value| dialect.quote_string(value))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CHECK ({} IN ({values}))", dialect.quote(column.name()))
}

/// Name given to the check constraint emulating an enum column.
pub(crate) fn enum_constraint_name(column: &Column) -> String {
    format!("{}_{}_enum", column.table(), column.name())
}

/// Length of the longest enum value, used to size emulated enum columns.
pub(crate) fn enum_size(column: &Column) -> usize {
    column
        .enum_values()
        .iter()
        .map(|value| value.chars().count())
        .max()
        .unwrap_or(1)
        .max(1)
}

static QUOTED_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'((?:[^']|'')*)'").expect("valid quoted value regex"));

static IN_CHECK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)CHECK\s*\(\s*[`"\[]?(\w+)[`"\]]?\s+IN\s*\(((?:\s*'(?:[^']|'')*'\s*,?)+)\)\s*\)"#)
        .expect("valid enum check regex")
});

/// Extracts every single-quoted literal of `list`, unescaping `''`.
pub(crate) fn quoted_values(list: &str) -> Vec<String> {
    QUOTED_VALUE
        .captures_iter(list)
        .map(|captures| captures[1].replace("''", "'"))
        .collect()
}

/// Finds `CHECK (column IN (...))` clauses in a table or constraint
/// definition, returning `(column, values)` pairs.
pub(crate) fn in_checks(definition: &str) -> Vec<(String, Vec<String>)> {
    IN_CHECK
        .captures_iter(definition)
        .map(|captures| (captures[1].to_string(), quoted_values(&captures[2])))
        .collect()
}

static TYPE_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([a-zA-Z][a-zA-Z0-9_ ]*?)\s*(?:\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\))?\s*$")
        .expect("valid type regex")
});

/// Parsed `name(size)` / `name(precision, scale)` type declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeclaredType {
    pub name: String,
    pub first: Option<u32>,
    pub second: Option<u32>,
}

/// Parses a declared type such as `varchar(255)` or `numeric(10, 2)`.
pub(crate) fn parse_declared_type(declared: &str) -> DeclaredType {
    TYPE_STRING.captures(declared).map_or_else(
        || DeclaredType {
            name: declared.trim().to_lowercase(),
            first: None,
            second: None,
        },
        |captures| DeclaredType {
            name: captures[1].to_lowercase(),
            first: captures.get(2).and_then(|m| m.as_str().parse().ok()),
            second: captures.get(3).and_then(|m| m.as_str().parse().ok()),
        },
    )
}

/// Strips one level of wrapping parentheses, as SQL Server stores
/// defaults and check definitions.
pub(crate) fn strip_parens(value: &str) -> &str {
    let mut value = value.trim();
    while value.starts_with('(') && value.ends_with(')') && balanced(&value[1..value.len() - 1]) {
        value = value[1..value.len() - 1].trim();
    }
    value
}

fn balanced(value: &str) -> bool {
    let mut depth = 0_i32;
    let mut quoted = false;
    for ch in value.chars() {
        match ch {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Groups rows by the text value of `key`, keeping first-seen order.
pub(crate) fn group_rows<'r>(rows: &'r [Row], key: &str) -> Vec<(String, Vec<&'r Row>)> {
    let mut groups: Vec<(String, Vec<&'r Row>)> = Vec::new();
    for row in rows {
        let name = row.string(key);
        match groups.iter_mut().find(|(group, _)| *group == name) {
            Some((_, members)) => members.push(row),
            None => groups.push((name, vec![row])),
        }
    }
    groups
}

/// Parses a literal default value as stored by SQLite and SQL Server.
pub(crate) fn parse_literal_default(value: &str) -> crate::schema::DefaultValue {
    use crate::schema::DefaultValue;

    let value = value.trim();
    if value.eq_ignore_ascii_case("null") {
        return DefaultValue::Null;
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return DefaultValue::String(value[1..value.len() - 1].replace("''", "'"));
    }
    if let Ok(integer) = value.parse::<i64>() {
        return DefaultValue::Integer(integer);
    }
    if let Ok(float) = value.parse::<f64>() {
        return DefaultValue::Float(float);
    }
    DefaultValue::Expression(value.to_string())
}
