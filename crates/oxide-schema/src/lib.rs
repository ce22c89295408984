//! Schema introspection and synchronization for SQL databases.
//!
//! `oxide-schema` reads the live structure of a table, lets you declare
//! the structure you want, and issues the DDL that takes one to the
//! other:
//! - Columns are declared with abstract types and stored as the native
//!   types of the target dialect
//! - Renames are explicit, so data survives them
//! - SQLite tables are rebuilt transparently when they cannot be altered
//!
//! # Architecture
//!
//! - **Driver** - Executes statements and introspection queries
//! - **Dialect** - Type tables, column formatting and catalog queries
//! - **Schema** - Columns, indexes, foreign keys, table states and their diff
//! - **Handler** - Turns a table diff into ordered DDL for one dialect
//! - **Reflector** - Saves several tables in dependency order
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_schema::prelude::*;
//!
//! let driver = Arc::new(SqliteDriver::connect(DriverConfig::new("sqlite://app.db")).await?);
//!
//! let mut users = Table::open(driver.clone(), "users").await?;
//! users.column("id")?.primary();
//! users.column("email")?.string(255).nullable(false);
//! users.index(&["email"])?.unique(true);
//!
//! let mut posts = Table::open(driver.clone(), "posts").await?;
//! posts.column("id")?.primary();
//! posts.column("user_id")?.integer();
//! posts.foreign_key(&["user_id"])?.references("users", &["id"]);
//!
//! let mut reflector = Reflector::new();
//! reflector.add_table(&mut users).add_table(&mut posts);
//! reflector.run().await?;
//! ```

pub mod config;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod handler;
pub mod reflector;
pub mod schema;

/// Prelude for convenient imports.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::config::DriverConfig;
    pub use crate::dialect::{AbstractType, Capability, Dialect};
    pub use crate::driver::{Driver, RecordingDriver, Row, SqliteDriver, Value};
    pub use crate::error::{Result, SchemaError, StatementError};
    pub use crate::handler::{handler_for, SchemaHandler, SyncBehavior};
    pub use crate::reflector::Reflector;
    pub use crate::schema::{
        Column, Comparator, DefaultValue, ForeignKey, ForeignKeyAction, Index, SortOrder, State,
        Table,
    };
}
