//! Statement recording driver.
//!
//! In dry-run mode nothing is executed: statements are recorded and
//! introspection queries are answered from canned rows. Wrapping another
//! driver records every statement and forwards it.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::{Driver, Row, Value};
use crate::config::DriverConfig;
use crate::dialect::Dialect;
use crate::error::Result;

/// Driver that records executed statements.
#[derive(Debug)]
pub struct RecordingDriver {
    dialect: Dialect,
    config: DriverConfig,
    inner: Option<Arc<dyn Driver>>,
    responses: Mutex<Vec<(String, Vec<Row>)>>,
    statements: Mutex<Vec<String>>,
}

impl RecordingDriver {
    /// Creates a dry-run driver for `dialect`.
    #[must_use]
    pub fn dry_run(dialect: Dialect) -> Self {
        Self::dry_run_with_config(dialect, DriverConfig::default())
    }

    /// Creates a dry-run driver with an explicit configuration.
    #[must_use]
    pub fn dry_run_with_config(dialect: Dialect, config: DriverConfig) -> Self {
        Self {
            dialect,
            config,
            inner: None,
            responses: Mutex::new(Vec::new()),
            statements: Mutex::new(Vec::new()),
        }
    }

    /// Wraps `inner`, recording every statement before forwarding it.
    #[must_use]
    pub fn wrap(inner: Arc<dyn Driver>) -> Self {
        Self {
            dialect: inner.dialect(),
            config: inner.config().clone(),
            inner: Some(inner),
            responses: Mutex::new(Vec::new()),
            statements: Mutex::new(Vec::new()),
        }
    }

    /// Answers dry-run queries containing `pattern` with `rows`.
    ///
    /// Patterns are matched in registration order; queries without a match
    /// return no rows.
    pub fn respond(&self, pattern: impl Into<String>, rows: Vec<Row>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((pattern.into(), rows));
    }

    /// Returns the statements recorded so far.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns and clears the recorded statements.
    pub fn take_statements(&self) -> Vec<String> {
        std::mem::take(&mut *self.statements.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn record(&self, sql: &str) {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql.to_string());
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn config(&self) -> &DriverConfig {
        &self.config
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        if let Some(inner) = &self.inner {
            return inner.query(sql, params).await;
        }
        let rows = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default();
        debug!(sql = %sql, rows = rows.len(), "Dry-run query");
        Ok(rows)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.record(sql);
        match &self.inner {
            Some(inner) => inner.execute(sql, params).await,
            None => {
                debug!(sql = %sql, "Dry-run statement");
                Ok(0)
            }
        }
    }
}
