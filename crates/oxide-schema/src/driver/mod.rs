//! Database drivers.
//!
//! A driver executes SQL and returns plain rows. The schema layer only needs
//! introspection queries and DDL statements, so rows are a list of named
//! [`Value`]s rather than typed records.

mod recording;
mod sqlite;

pub use recording::RecordingDriver;
pub use sqlite::SqliteDriver;

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::DriverConfig;
use crate::dialect::Dialect;
use crate::error::Result;

/// A single SQL value, used for parameters and introspection rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Text(String),
    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns whether the value is `NULL`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value as text, if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the value as an integer, parsing text when needed.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Bool(value) => Some(i64::from(*value)),
            Self::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as a boolean.
    ///
    /// Integers are true when non-zero; text accepts the spellings used by
    /// catalog views (`YES`, `t`, `true`, `1`).
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Integer(value) => Some(*value != 0),
            Self::Text(value) => match value.to_ascii_lowercase().as_str() {
                "yes" | "y" | "t" | "true" | "1" => Some(true),
                "no" | "n" | "f" | "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "'{value}'"),
            Self::Bytes(value) => write!(f, "<{} bytes>", value.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A result row: column names paired with values, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<(String, Value)>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    /// Appends a column in place.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.push((name.into(), value.into()));
    }

    /// Returns a value by column name, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Returns a non-null text value.
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Returns a text value, or an empty string.
    #[must_use]
    pub fn string(&self, name: &str) -> String {
        self.str(name).unwrap_or_default().to_string()
    }

    /// Returns an integer value.
    #[must_use]
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Returns a boolean value, `false` when absent or null.
    #[must_use]
    pub fn bool(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Returns whether the column is absent or null.
    #[must_use]
    pub fn is_null(&self, name: &str) -> bool {
        self.get(name).map_or(true, Value::is_null)
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Connection to a database, as seen by the schema layer.
#[async_trait]
pub trait Driver: Send + Sync + fmt::Debug {
    /// Returns the SQL dialect spoken by this driver.
    fn dialect(&self) -> Dialect;

    /// Returns the configuration this driver was built with.
    fn config(&self) -> &DriverConfig;

    /// Runs a query and returns its rows.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Executes a statement and returns the number of affected rows.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Quotes an identifier for this driver's dialect.
    fn quote(&self, identifier: &str) -> String {
        self.dialect().quote(identifier)
    }

    /// Returns the timezone used to render timestamp defaults.
    fn timezone(&self) -> FixedOffset {
        self.config()
            .timezone_offset()
            .unwrap_or_else(|_| crate::config::utc())
    }

    /// Returns the table prefix.
    fn prefix(&self) -> &str {
        &self.config().prefix
    }
}

/// Runs `op`, replaying it once if it failed because the connection was
/// lost and `reconnect` is enabled.
pub(crate) async fn retry_on_connection_loss<T, F, Fut>(
    reconnect: bool,
    sql: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T>> + Send,
{
    match op().await {
        Err(err) if reconnect && err.is_connection_lost() => {
            warn!(sql = %sql, error = %err, "Connection lost, reconnecting and retrying once");
            op().await
        }
        result => result,
    }
}
