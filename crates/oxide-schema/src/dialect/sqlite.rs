//! SQLite dialect.
//!
//! SQLite types are loose: sizes and attributes are kept for rendering but
//! never compared. Enums are emulated with `CHECK (column IN (...))` and
//! booleans with `tinyint(1)`. Foreign key names are not stored by SQLite,
//! so introspected keys get synthesized names.

use std::collections::BTreeMap;

use super::{
    enum_check, in_checks, parse_declared_type, parse_literal_default, sized_type, Capability,
    Dialect, DialectSpec, NativeType, ReverseRule, TypeMapping,
};
use crate::driver::{Driver, Row};
use crate::error::Result;
use crate::schema::{Column, ColumnField, ForeignKey, ForeignKeyAction, Index, SortOrder, State};

use super::AbstractType as T;

pub(super) static SPEC: DialectSpec = DialectSpec {
    dialect: Dialect::Sqlite,
    capabilities: &[Capability::DeferredConstraintChecks],
    mapping: TypeMapping {
        forward: &[
            (T::Primary, NativeType::serial("integer")),
            (T::BigPrimary, NativeType::serial("integer")),
            (T::Enum, NativeType::plain("enum")),
            (T::Boolean, NativeType::sized("tinyint", 1)),
            (T::Integer, NativeType::plain("integer")),
            (T::TinyInteger, NativeType::plain("tinyint")),
            (T::SmallInteger, NativeType::plain("smallint")),
            (T::BigInteger, NativeType::plain("bigint")),
            (T::String, NativeType::sized("varchar", 255)),
            (T::Text, NativeType::plain("text")),
            (T::TinyText, NativeType::plain("text")),
            (T::MediumText, NativeType::plain("text")),
            (T::LongText, NativeType::plain("text")),
            (T::Double, NativeType::plain("double")),
            (T::Float, NativeType::plain("real")),
            (T::Decimal, NativeType::plain("numeric")),
            (T::Datetime, NativeType::plain("datetime")),
            (T::Date, NativeType::plain("date")),
            (T::Time, NativeType::plain("time")),
            (T::Timestamp, NativeType::plain("timestamp")),
            (T::Binary, NativeType::plain("blob")),
            (T::TinyBinary, NativeType::plain("blob")),
            (T::LongBinary, NativeType::plain("blob")),
            (T::Json, NativeType::plain("text")),
            (T::Uuid, NativeType::sized("varchar", 36)),
        ],
        reverse: &[
            ReverseRule::serial(T::Primary, "integer"),
            ReverseRule::sized(T::Boolean, "tinyint", 1),
            ReverseRule::sized(T::Boolean, "boolean", 0),
            ReverseRule::new(T::Enum, "enum"),
            ReverseRule::new(T::Integer, "integer"),
            ReverseRule::new(T::Integer, "int"),
            ReverseRule::new(T::TinyInteger, "tinyint"),
            ReverseRule::new(T::SmallInteger, "smallint"),
            ReverseRule::new(T::BigInteger, "bigint"),
            ReverseRule::sized(T::Uuid, "varchar", 36),
            ReverseRule::new(T::String, "varchar"),
            ReverseRule::new(T::String, "char"),
            ReverseRule::new(T::Text, "text"),
            ReverseRule::new(T::Text, "clob"),
            ReverseRule::new(T::Double, "double"),
            ReverseRule::new(T::Float, "real"),
            ReverseRule::new(T::Float, "float"),
            ReverseRule::new(T::Decimal, "numeric"),
            ReverseRule::new(T::Decimal, "decimal"),
            ReverseRule::new(T::Datetime, "datetime"),
            ReverseRule::new(T::Date, "date"),
            ReverseRule::new(T::Time, "time"),
            ReverseRule::new(T::Timestamp, "timestamp"),
            ReverseRule::new(T::Binary, "blob"),
        ],
    },
    column_sql,
    ignored_fields: &[
        ColumnField::Size,
        ColumnField::Attributes,
        ColumnField::UserType,
        ColumnField::Timezone,
    ],
    forbidden_defaults: &[],
    ordered_enums: false,
};

/// Renders a column definition. Auto-increment columns carry their own
/// `PRIMARY KEY AUTOINCREMENT` clause.
fn column_sql(column: &Column) -> String {
    let dialect = Dialect::Sqlite;
    let mut sql = dialect.quote(column.name());
    sql.push(' ');

    if column.internal_type() == "enum" {
        sql.push_str("text");
    } else {
        sql.push_str(&sized_type(column));
    }

    if column.is_auto_increment() {
        sql.push_str(" PRIMARY KEY AUTOINCREMENT");
    }
    if !column.is_nullable() {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = column.default_sql() {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default);
    }
    if column.internal_type() == "enum" {
        sql.push(' ');
        sql.push_str(&enum_check(column));
    }
    sql
}

/// Reads the live state of `table` from `sqlite_master` and the table
/// pragmas.
pub(super) async fn fetch_state(driver: &dyn Driver, table: &str) -> Result<State> {
    let mut state = State::new(table);
    let rows = driver
        .query(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[table.into()],
        )
        .await?;
    let Some(definition) = rows.first().map(|row| row.string("sql")) else {
        return Ok(state);
    };
    state.set_exists(true);

    let quoted = Dialect::Sqlite.quote(table);
    let timezone = driver.timezone();
    let autoincrement = definition.to_uppercase().contains("AUTOINCREMENT");

    let mut primary: Vec<(i64, String)> = Vec::new();
    for row in driver
        .query(&format!("PRAGMA table_info({quoted})"), &[])
        .await?
    {
        let column = parse_column(table, &row).with_timezone(timezone);
        let position = row.i64("pk").unwrap_or(0);
        if position > 0 {
            primary.push((position, column.name().to_string()));
        }
        state.register_column(column);
    }
    primary.sort_by_key(|(position, _)| *position);
    let primary: Vec<String> = primary.into_iter().map(|(_, name)| name).collect();

    if autoincrement && primary.len() == 1 {
        if let Some(column) = state.column_mut(&primary[0]) {
            if column.internal_type() == "integer" {
                column.auto_increment = true;
            }
        }
    }
    for (name, values) in in_checks(&definition) {
        if let Some(column) = state.column_mut(&name) {
            column.internal_type = "enum".to_string();
            column.size = 0;
            column.enum_values = values;
        }
    }
    state.set_primary_keys(&primary);

    for index in fetch_indexes(driver, table).await? {
        state.register_index(index);
    }
    for fk in fetch_foreign_keys(driver, table).await? {
        state.register_foreign_key(fk);
    }
    Ok(state)
}

fn parse_column(table: &str, row: &Row) -> Column {
    let declared = parse_declared_type(&row.string("type"));
    let mut column = Column::new(Dialect::Sqlite, table, row.string("name"));
    if matches!(declared.name.as_str(), "numeric" | "decimal") {
        column.precision = declared.first.unwrap_or(0);
        column.scale = declared.second.unwrap_or(0);
    } else {
        column.size = declared.first.unwrap_or(0);
    }
    column.internal_type = declared.name;
    column.nullable = !row.bool("notnull");
    if let Some(default) = row.str("dflt_value") {
        column.default = Some(parse_literal_default(default));
    }
    column
}

async fn fetch_indexes(driver: &dyn Driver, table: &str) -> Result<Vec<Index>> {
    let dialect = Dialect::Sqlite;
    let mut indexes = Vec::new();

    for row in driver
        .query(&format!("PRAGMA index_list({})", dialect.quote(table)), &[])
        .await?
    {
        let name = row.string("name");
        if row.str("origin") == Some("pk") || name.starts_with("sqlite_autoindex") {
            continue;
        }

        let mut index = Index::new(dialect, table, name.as_str());
        index.unique = row.bool("unique");
        let mut parts: Vec<(i64, String, bool)> = driver
            .query(&format!("PRAGMA index_xinfo({})", dialect.quote(&name)), &[])
            .await?
            .iter()
            .filter(|part| part.get("key").map_or(true, |_| part.bool("key")))
            .filter(|part| !part.is_null("name"))
            .map(|part| {
                (
                    part.i64("seqno").unwrap_or(0),
                    part.string("name"),
                    part.bool("desc"),
                )
            })
            .collect();
        parts.sort_by_key(|(position, _, _)| *position);

        for (_, column, descending) in parts {
            if descending {
                index.sort.insert(column.clone(), SortOrder::Desc);
            }
            index.columns.push(column);
        }
        indexes.push(index);
    }
    Ok(indexes)
}

async fn fetch_foreign_keys(driver: &dyn Driver, table: &str) -> Result<Vec<ForeignKey>> {
    let dialect = Dialect::Sqlite;
    let rows = driver
        .query(
            &format!("PRAGMA foreign_key_list({})", dialect.quote(table)),
            &[],
        )
        .await?;

    let mut groups: BTreeMap<i64, Vec<&Row>> = BTreeMap::new();
    for row in &rows {
        groups.entry(row.i64("id").unwrap_or(0)).or_default().push(row);
    }

    let mut keys = Vec::with_capacity(groups.len());
    for mut parts in groups.into_values() {
        parts.sort_by_key(|part| part.i64("seq").unwrap_or(0));
        let columns: Vec<String> = parts.iter().map(|part| part.string("from")).collect();
        let mut fk = ForeignKey::new(
            dialect,
            table,
            ForeignKey::generate_name(table, &columns),
            driver.prefix(),
        );
        fk.columns = columns;
        fk.foreign_table = parts[0].string("table");
        fk.foreign_keys = parts.iter().map(|part| part.string("to")).collect();
        fk.on_delete = ForeignKeyAction::parse(&parts[0].string("on_delete"));
        fk.on_update = ForeignKeyAction::parse(&parts[0].string("on_update"));
        keys.push(fk);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dialect::AbstractType;
    use crate::driver::{RecordingDriver, SqliteDriver, Value};
    use crate::schema::DefaultValue;

    #[test]
    fn test_column_sql() {
        let mut id = Column::new(Dialect::Sqlite, "users", "id");
        id.primary();
        assert_eq!(
            id.sql_statement(),
            "\"id\" integer PRIMARY KEY AUTOINCREMENT NOT NULL"
        );

        let mut status = Column::new(Dialect::Sqlite, "users", "status");
        status
            .enumeration(&["active", "banned"])
            .nullable(false)
            .default_value("active");
        assert_eq!(
            status.sql_statement(),
            "\"status\" text NOT NULL DEFAULT 'active' CHECK (\"status\" IN ('active', 'banned'))"
        );

        let mut price = Column::new(Dialect::Sqlite, "items", "price");
        price.decimal(10, 2);
        assert_eq!(price.sql_statement(), "\"price\" numeric(10, 2)");
    }

    #[test]
    fn test_sqlite_has_no_in_place_alter() {
        assert!(!Dialect::Sqlite.supports(Capability::InPlaceAlter));
        assert!(!Dialect::Sqlite.supports(Capability::AlterPrimaryKey));
    }

    #[tokio::test]
    async fn test_fetch_missing_table() {
        let driver = RecordingDriver::dry_run(Dialect::Sqlite);
        let state = fetch_state(&driver, "users").await.unwrap();
        assert!(!state.exists());
        assert!(state.columns().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_from_canned_pragmas() {
        let driver = RecordingDriver::dry_run(Dialect::Sqlite);
        driver.respond(
            "sqlite_master",
            vec![Row::new().with(
                "sql",
                "CREATE TABLE \"posts\" (\"id\" integer PRIMARY KEY AUTOINCREMENT NOT NULL, \
                 \"state\" text CHECK (\"state\" IN ('draft', 'live')))",
            )],
        );
        let column = |cid: i64, name: &str, ty: &str, notnull: i64, default: Value, pk: i64| {
            Row::new()
                .with("cid", cid)
                .with("name", name)
                .with("type", ty)
                .with("notnull", notnull)
                .with("dflt_value", default)
                .with("pk", pk)
        };
        driver.respond(
            "table_info",
            vec![
                column(0, "id", "integer", 1, Value::Null, 1),
                column(1, "state", "text", 0, Value::from("'draft'"), 0),
                column(2, "author_id", "INTEGER", 0, Value::Null, 0),
            ],
        );
        driver.respond(
            "index_list",
            vec![Row::new()
                .with("seq", 0_i64)
                .with("name", "posts_index_author_id")
                .with("unique", 0_i64)
                .with("origin", "c")],
        );
        driver.respond(
            "index_xinfo",
            vec![
                Row::new()
                    .with("seqno", 0_i64)
                    .with("name", "author_id")
                    .with("desc", 1_i64)
                    .with("key", 1_i64),
                Row::new()
                    .with("seqno", 1_i64)
                    .with("name", Value::Null)
                    .with("desc", 0_i64)
                    .with("key", 0_i64),
            ],
        );
        driver.respond(
            "foreign_key_list",
            vec![Row::new()
                .with("id", 0_i64)
                .with("seq", 0_i64)
                .with("table", "users")
                .with("from", "author_id")
                .with("to", "id")
                .with("on_update", "NO ACTION")
                .with("on_delete", "CASCADE")],
        );

        let state = fetch_state(&driver, "posts").await.unwrap();
        assert!(state.exists());
        assert_eq!(state.primary_keys(), ["id"]);

        let id = state.column("id").unwrap();
        assert_eq!(id.abstract_type(), AbstractType::Primary);
        assert!(!id.is_nullable());

        let status = state.column("state").unwrap();
        assert_eq!(status.abstract_type(), AbstractType::Enum);
        assert_eq!(status.enum_values(), ["draft", "live"]);
        assert_eq!(status.default(), Some(&DefaultValue::String("draft".into())));

        let index = &state.indexes()[0];
        assert_eq!(index.columns(), ["author_id"]);
        assert_eq!(index.sort_order("author_id"), SortOrder::Desc);

        let fk = &state.foreign_keys()[0];
        assert_eq!(fk.name(), "posts_author_id_fk");
        assert_eq!(fk.foreign_table(), "users");
        assert_eq!(fk.delete_rule(), ForeignKeyAction::Cascade);
    }

    #[tokio::test]
    async fn test_fetch_live_table() {
        let driver: Arc<dyn Driver> = Arc::new(SqliteDriver::memory().await.unwrap());
        driver
            .execute(
                "CREATE TABLE \"users\" (\"id\" integer PRIMARY KEY AUTOINCREMENT NOT NULL, \
                 \"email\" varchar(255) NOT NULL, \"active\" tinyint(1) DEFAULT 1, \
                 \"balance\" numeric(10, 2))",
                &[],
            )
            .await
            .unwrap();
        driver
            .execute(
                "CREATE UNIQUE INDEX \"users_index_email\" ON \"users\" (\"email\")",
                &[],
            )
            .await
            .unwrap();

        let state = fetch_state(driver.as_ref(), "users").await.unwrap();
        let types: Vec<AbstractType> = state
            .columns()
            .iter()
            .map(Column::abstract_type)
            .collect();
        assert_eq!(
            types,
            [
                AbstractType::Primary,
                AbstractType::String,
                AbstractType::Boolean,
                AbstractType::Decimal
            ]
        );
        assert_eq!(state.column("email").unwrap().size(), 255);
        assert_eq!(state.column("balance").unwrap().precision(), 10);
        assert_eq!(
            state.column("active").unwrap().default(),
            Some(&DefaultValue::Integer(1))
        );
        assert!(state.indexes()[0].is_unique());
        assert_eq!(state.indexes()[0].name(), "users_index_email");
    }
}
