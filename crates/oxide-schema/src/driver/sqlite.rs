//! SQLite driver backed by a sqlx connection pool.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column as _, Row as _, TypeInfo as _, ValueRef as _};
use tracing::{debug, info, warn};

use super::{retry_on_connection_loss, Driver, Row, Value};
use crate::config::DriverConfig;
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError, StatementError};

/// SQLite driver.
#[derive(Debug, Clone)]
pub struct SqliteDriver {
    pool: SqlitePool,
    config: DriverConfig,
}

impl SqliteDriver {
    /// Opens a pool for `config.url`.
    ///
    /// Pooled connections never expire so that `:memory:` databases survive
    /// for the lifetime of the driver. With foreign keys enforced the pool
    /// holds a single connection, since table rebuilds toggle
    /// `PRAGMA foreign_keys` and that pragma is per connection.
    pub async fn connect(config: DriverConfig) -> Result<Self> {
        config.timezone_offset()?;

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|err| SchemaError::driver(format!("Invalid SQLite url '{}': {err}", config.url)))?
            .create_if_missing(true)
            .foreign_keys(config.foreign_keys);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size(&config))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|err| StatementError::from_sqlx(err, "CONNECT", &[]))?;

        info!(url = %config.url, "Connected to SQLite");
        Ok(Self { pool, config })
    }

    /// Opens a private in-memory database.
    pub async fn memory() -> Result<Self> {
        Self::connect(DriverConfig::default()).await
    }

    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: SqlitePool, config: DriverConfig) -> Self {
        Self { pool, config }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let rows = bind(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| StatementError::from_sqlx(err, sql, params))?;

        rows.iter()
            .map(|row| convert_row(row).map_err(|err| StatementError::from_sqlx(err, sql, params).into()))
            .collect()
    }

    async fn run(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let result = bind(sqlx::query(sql), params)
            .execute(&self.pool)
            .await
            .map_err(|err| StatementError::from_sqlx(err, sql, params))?;
        Ok(result.rows_affected())
    }
}

fn pool_size(config: &DriverConfig) -> u32 {
    if config.foreign_keys && config.max_connections > 1 {
        warn!(
            max_connections = config.max_connections,
            "Foreign keys are enforced, using a single SQLite connection"
        );
        return 1;
    }
    config.max_connections.max(1)
}

#[async_trait]
impl Driver for SqliteDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn config(&self) -> &DriverConfig {
        &self.config
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        debug!(sql = %sql, params = params.len(), "Running query");
        retry_on_connection_loss(self.config.reconnect, sql, || self.fetch(sql, params)).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        debug!(sql = %sql, params = params.len(), "Executing statement");
        retry_on_connection_loss(self.config.reconnect, sql, || self.run(sql, params)).await
    }
}

fn bind<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(value) => query.bind(*value),
            Value::Integer(value) => query.bind(*value),
            Value::Float(value) => query.bind(*value),
            Value::Text(value) => query.bind(value.as_str()),
            Value::Bytes(value) => query.bind(value.as_slice()),
        };
    }
    query
}

/// Converts a row using the storage class of each value.
fn convert_row(row: &SqliteRow) -> std::result::Result<Row, sqlx::Error> {
    let mut converted = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage = raw.type_info().name().to_ascii_uppercase();
            let decoded = match storage.as_str() {
                "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => row.try_get::<i64, _>(index).map(Value::Integer),
                "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row.try_get::<f64, _>(index).map(Value::Float),
                "BLOB" => row.try_get::<Vec<u8>, _>(index).map(Value::Bytes),
                _ => row.try_get::<String, _>(index).map(Value::Text),
            };
            match decoded {
                Ok(value) => value,
                Err(_) => Value::Text(row.try_get_unchecked::<String, _>(index)?),
            }
        };
        converted.push(column.name(), value);
    }
    Ok(converted)
}
