//! Error types for schema introspection and synchronization.

use std::fmt;

use crate::driver::Value;

/// Errors that can occur while reading or synchronizing a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Invalid schema operation or definition (unknown column, wrong
    /// dialect, forbidden default value, ...).
    #[error("Schema error: {0}")]
    Schema(String),

    /// Operation the database abstraction layer refuses to perform, such as
    /// changing the primary key of an existing SQLite table.
    #[error("DBAL error: {0}")]
    Dbal(String),

    /// Driver level failure that is not tied to a single statement.
    #[error("Driver error: {0}")]
    Driver(String),

    /// A statement failed to execute.
    #[error(transparent)]
    Statement(#[from] StatementError),
}

impl SchemaError {
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub(crate) fn dbal(message: impl Into<String>) -> Self {
        Self::Dbal(message.into())
    }

    pub(crate) fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    /// Returns the statement error if this error was raised by a statement.
    #[must_use]
    pub const fn as_statement(&self) -> Option<&StatementError> {
        match self {
            Self::Statement(err) => Some(err),
            _ => None,
        }
    }

    /// Returns whether the error was caused by a lost connection.
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        self.as_statement()
            .is_some_and(|err| err.kind == StatementErrorKind::Connection)
    }
}

/// Classification of a failed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementErrorKind {
    /// The connection to the server was lost.
    Connection,
    /// An integrity constraint was violated.
    Constraint,
    /// Any other statement failure.
    Query,
}

impl fmt::Display for StatementErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection lost"),
            Self::Constraint => write!(f, "constraint violation"),
            Self::Query => write!(f, "statement failed"),
        }
    }
}

/// Messages drivers use to report a dropped connection.
const CONNECTION_LOST_MESSAGES: &[&str] = &[
    "server has gone away",
    "lost connection",
    "broken pipe",
    "connection reset",
    "connection refused",
    "no connection to the server",
    "is dead or not enabled",
    "error while sending",
    "ssl connection has been closed unexpectedly",
    "error writing data to the connection",
    "connection timed out",
    "decryption failed or bad record mac",
];

impl StatementErrorKind {
    /// Classifies a failure from its SQLSTATE or vendor code and message.
    ///
    /// SQLSTATE class `08` is a connection exception and class `23` an
    /// integrity constraint violation. SQLite reports extended result
    /// codes whose low byte is the primary code, `19` for constraints.
    #[must_use]
    pub fn classify(code: Option<&str>, message: &str) -> Self {
        if let Some(code) = code {
            if code.starts_with("08") {
                return Self::Connection;
            }
            if code.starts_with("23") {
                return Self::Constraint;
            }
            if let Ok(numeric) = code.parse::<i64>() {
                if numeric & 0xff == 19 {
                    return Self::Constraint;
                }
            }
        }

        let message = message.to_lowercase();
        if CONNECTION_LOST_MESSAGES
            .iter()
            .any(|needle| message.contains(needle))
        {
            return Self::Connection;
        }
        if message.contains("constraint failed")
            || (message.contains("violates") && message.contains("constraint"))
        {
            return Self::Constraint;
        }
        Self::Query
    }
}

/// A statement that failed to execute, with the query and its parameters.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message} (query: {query})")]
pub struct StatementError {
    /// Failure classification.
    pub kind: StatementErrorKind,
    /// SQLSTATE or vendor error code, when the driver reported one.
    pub code: Option<String>,
    /// Driver message.
    pub message: String,
    /// The SQL text that failed.
    pub query: String,
    /// Bound parameters.
    pub params: Vec<Value>,
    /// Underlying driver error.
    #[source]
    pub source: Option<sqlx::Error>,
}

impl StatementError {
    /// Creates a statement error, classifying it from code and message.
    #[must_use]
    pub fn new(
        code: Option<String>,
        message: impl Into<String>,
        query: impl Into<String>,
        params: &[Value],
    ) -> Self {
        let message = message.into();
        Self {
            kind: StatementErrorKind::classify(code.as_deref(), &message),
            code,
            message,
            query: query.into(),
            params: params.to_vec(),
            source: None,
        }
    }

    /// Wraps a sqlx error raised while running `query`.
    #[must_use]
    pub fn from_sqlx(err: sqlx::Error, query: &str, params: &[Value]) -> Self {
        let (code, message) = match &err {
            sqlx::Error::Database(db) => (
                db.code().map(std::borrow::Cow::into_owned),
                db.message().to_string(),
            ),
            other => (None, other.to_string()),
        };
        let kind = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StatementErrorKind::Connection,
            _ => StatementErrorKind::classify(code.as_deref(), &message),
        };
        Self {
            kind,
            code,
            message,
            query: query.to_string(),
            params: params.to_vec(),
            source: Some(err),
        }
    }

    /// Returns whether the statement failed because the connection dropped.
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        self.kind == StatementErrorKind::Connection
    }

    /// Returns whether the statement violated an integrity constraint.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        self.kind == StatementErrorKind::Constraint
    }
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_sqlstate() {
        assert_eq!(
            StatementErrorKind::classify(Some("23505"), "duplicate key"),
            StatementErrorKind::Constraint
        );
        assert_eq!(
            StatementErrorKind::classify(Some("23000"), "Duplicate entry"),
            StatementErrorKind::Constraint
        );
        assert_eq!(
            StatementErrorKind::classify(Some("08006"), "terminated"),
            StatementErrorKind::Connection
        );
        assert_eq!(
            StatementErrorKind::classify(Some("42P01"), "relation does not exist"),
            StatementErrorKind::Query
        );
    }

    #[test]
    fn test_classify_sqlite_extended_codes() {
        // SQLITE_CONSTRAINT_UNIQUE and SQLITE_CONSTRAINT_FOREIGNKEY
        assert_eq!(
            StatementErrorKind::classify(Some("2067"), "UNIQUE constraint failed"),
            StatementErrorKind::Constraint
        );
        assert_eq!(
            StatementErrorKind::classify(Some("787"), "FOREIGN KEY constraint failed"),
            StatementErrorKind::Constraint
        );
        assert_eq!(
            StatementErrorKind::classify(Some("1"), "near \"FROM\": syntax error"),
            StatementErrorKind::Query
        );
    }

    #[test]
    fn test_classify_by_message() {
        assert_eq!(
            StatementErrorKind::classify(None, "MySQL server has gone away"),
            StatementErrorKind::Connection
        );
        assert_eq!(
            StatementErrorKind::classify(None, "write: Broken pipe"),
            StatementErrorKind::Connection
        );
        assert_eq!(
            StatementErrorKind::classify(None, "insert violates foreign key constraint"),
            StatementErrorKind::Constraint
        );
    }

    #[test]
    fn test_statement_error_keeps_query() {
        let err = StatementError::new(
            None,
            "lost connection to server",
            "SELECT 1",
            &[Value::Integer(1)],
        );
        assert!(err.is_connection_lost());
        assert_eq!(err.query, "SELECT 1");
        assert_eq!(err.params, vec![Value::Integer(1)]);

        let wrapped = SchemaError::from(err);
        assert!(wrapped.is_connection_lost());
        assert!(wrapped.to_string().contains("SELECT 1"));
    }
}
